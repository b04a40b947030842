use tracing::debug;

use crate::{
    BorrowRequest, BorrowRequestField, Component, Direction, Error, LocalStore, Mode,
    Notification, NotificationField, Query, Record, Result, Subscription,
};

use super::FailoverRouter;

impl<L: LocalStore> FailoverRouter<L> {
    /// Pushes the full component list on every remote change.
    ///
    /// Returns `None` when the local store is authoritative: it offers no
    /// push updates.
    pub async fn on_components_change(
        &self,
        callback: impl Fn(Vec<Component>) + Send + Sync + 'static,
    ) -> Result<Option<Subscription>> {
        self.subscribe("on_components_change", Query::all(), callback)
            .await
    }

    pub async fn on_requests_change(
        &self,
        callback: impl Fn(Vec<BorrowRequest>) + Send + Sync + 'static,
    ) -> Result<Option<Subscription>> {
        let query = Query::all().order_by(BorrowRequestField::RequestDate, Direction::Descending);
        self.subscribe("on_requests_change", query, callback).await
    }

    pub async fn on_user_notifications_change(
        &self,
        user_id: &str,
        callback: impl Fn(Vec<Notification>) + Send + Sync + 'static,
    ) -> Result<Option<Subscription>> {
        let query = Query::all()
            .eq(NotificationField::UserId, user_id)
            .order_by(NotificationField::CreatedAt, Direction::Descending);
        self.subscribe("on_user_notifications_change", query, callback)
            .await
    }

    async fn subscribe<R: Record>(
        &self,
        op: &'static str,
        query: Query,
        callback: impl Fn(Vec<R>) + Send + Sync + 'static,
    ) -> Result<Option<Subscription>> {
        self.prepare().await;
        if self.mode() != Mode::RemotePreferred {
            debug!(op, "No push updates while serving from local store");
            return Ok(None);
        }
        match self.remote.subscribe(query, callback).await {
            Ok(subscription) => Ok(Some(subscription)),
            Err(e) => match Error::from_remote(e) {
                Ok(error) => Err(error),
                Err(reason) => {
                    self.enter_fallback(op, &reason);
                    Ok(None)
                }
            },
        }
    }
}
