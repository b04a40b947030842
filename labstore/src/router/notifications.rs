use serde_json::Value;

use crate::{
    Direction, Document, LocalStore, Notification, NotificationField, Query, RecordField, Result,
};

use super::FailoverRouter;

impl<L: LocalStore> FailoverRouter<L> {
    /// Notifications addressed to one user, newest first.
    pub async fn get_user_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let query = Query::all()
            .eq(NotificationField::UserId, user_id)
            .order_by(NotificationField::CreatedAt, Direction::Descending);
        self.route(
            "get_user_notifications",
            self.remote.list::<Notification>(&query),
            |local| local.list::<Notification>(&query),
        )
        .await
    }

    pub async fn add_notification(&self, notification: &Notification) -> Result<()> {
        self.route(
            "add_notification",
            self.remote.add(notification),
            |local| local.put(notification),
        )
        .await
    }

    /// Flags one notification as read. The notification must exist.
    pub async fn mark_notification_as_read(&self, id: &str) -> Result<()> {
        let mut patch = Document::new();
        patch.insert(NotificationField::Read.name().to_string(), Value::Bool(true));
        self.route(
            "mark_notification_as_read",
            self.remote.update::<Notification>(id, patch.clone()),
            |local| local.update::<Notification>(id, &patch).map(|_| ()),
        )
        .await
    }
}
