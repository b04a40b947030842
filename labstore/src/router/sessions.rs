use crate::{
    BorrowRequest, Component, Direction, LocalStore, LoginSession, LoginSessionField, Query,
    RemoteError, Result, SystemStats, User,
};

use super::FailoverRouter;

impl<L: LocalStore> FailoverRouter<L> {
    /// Opens a login session for `user`. See [`crate::SessionPolicy`] for
    /// what happens to sessions the user already has open.
    pub async fn start_session(&self, user: &User, device_info: &str) -> Result<LoginSession> {
        self.sessions.start(self, user, device_info).await
    }

    /// Closes every active session of a user, returning how many were closed.
    pub async fn end_session(&self, user_id: &str) -> Result<usize> {
        self.sessions.end(self, user_id).await
    }

    /// Every recorded login session, most recent login first.
    pub async fn get_login_sessions(&self) -> Result<Vec<LoginSession>> {
        let query = Query::all().order_by(LoginSessionField::LoginTime, Direction::Descending);
        self.route(
            "get_login_sessions",
            self.remote.list::<LoginSession>(&query),
            |local| local.list::<LoginSession>(&query),
        )
        .await
    }

    /// Dashboard figures from the store that is authoritative right now.
    ///
    /// All four collections are read from the same store, so the figures are
    /// consistent with each other, but not with the other store.
    pub async fn get_system_stats(&self) -> Result<SystemStats> {
        let all = Query::all();
        let now = self.now();
        self.route(
            "get_system_stats",
            async {
                let users = self.remote.list::<User>(&all).await?;
                let sessions = self.remote.list::<LoginSession>(&all).await?;
                let requests = self.remote.list::<BorrowRequest>(&all).await?;
                let components = self.remote.list::<Component>(&all).await?;
                Ok::<_, RemoteError>(SystemStats::compute(
                    &users,
                    &sessions,
                    &requests,
                    &components,
                    now,
                ))
            },
            |local| {
                Ok(SystemStats::compute(
                    &local.list::<User>(&all)?,
                    &local.list::<LoginSession>(&all)?,
                    &local.list::<BorrowRequest>(&all)?,
                    &local.list::<Component>(&all)?,
                    now,
                ))
            },
        )
        .await
    }
}
