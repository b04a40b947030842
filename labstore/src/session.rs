use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    Error, LocalAdapter, LocalError, LocalStore, LoginSession, LoginSessionField, Mode, Query, Result, User,
    router::FailoverRouter,
};

/// What `start_session` does about sessions the user already has open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
    /// Open the new session alongside any existing ones; `end_session`
    /// closes them all.
    #[default]
    PreserveDuplicates,
    /// Close the user's active sessions before opening a new one.
    SingleActive,
}

/// Opens and closes [`LoginSession`]s through the router.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionLifecycleManager {
    policy: SessionPolicy,
}

impl SessionLifecycleManager {
    pub fn new(policy: SessionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Records a new active session for `user`, stamped with the router's clock.
    pub async fn start<L: LocalStore>(
        &self,
        router: &FailoverRouter<L>,
        user: &User,
        device_info: &str,
    ) -> Result<LoginSession> {
        if self.policy == SessionPolicy::SingleActive {
            let closed = self.end(router, &user.id).await?;
            if closed > 0 {
                info!(user = %user.id, closed, "Closed previous sessions before login");
            }
        }
        let session = LoginSession::open(user, device_info, router.now());
        router
            .route(
                "start_session",
                router.remote().add(&session),
                |local| local.put(&session),
            )
            .await?;
        Ok(session)
    }

    /// Closes every active session of `user_id` and returns how many were closed.
    ///
    /// All closures are submitted to the remote store as one batch. If the
    /// batch stops partway on a connectivity failure, the records it did not
    /// reach are written to the local store instead, so no session is left
    /// active. While the remote store is authoritative, active sessions known
    /// only to the local store (opened while offline) are closed as well.
    pub async fn end<L: LocalStore>(&self, router: &FailoverRouter<L>, user_id: &str) -> Result<usize> {
        router.prepare().await;
        let now = router.now();
        let query = active_sessions(user_id);

        if router.mode() == Mode::RemotePreferred {
            match router.remote().list::<LoginSession>(&query).await {
                Ok(active) => {
                    let closed: Vec<LoginSession> =
                        active.into_iter().map(|session| session.closed_at(now)).collect();
                    let mut ids: Vec<String> = closed.iter().map(|s| s.id.clone()).collect();

                    let outcome = if closed.is_empty() {
                        Ok(())
                    } else {
                        router.remote().replace_batch(&closed).await
                    };
                    if let Err(batch) = outcome {
                        let reason = match Error::from_remote(batch.error) {
                            Ok(error) => return Err(error),
                            Err(reason) => reason,
                        };
                        router.enter_fallback("end_session", &reason);
                        let remaining = &closed[batch.applied.min(closed.len())..];
                        warn!(
                            user = user_id,
                            applied = batch.applied,
                            remaining = remaining.len(),
                            "Session batch interrupted, closing the rest locally"
                        );
                        router
                            .with_local(|local| local.put_many(remaining))
                            .map_err(|local| Error::BothStoresFailed {
                                remote: reason,
                                local,
                            })?;
                    }

                    let swept = router.with_local(|local| close_local(local, &query, now))?;
                    ids.extend(swept);
                    ids.sort_unstable();
                    ids.dedup();
                    return Ok(ids.len());
                }
                Err(e) => match Error::from_remote(e) {
                    Ok(error) => return Err(error),
                    Err(reason) => {
                        router.enter_fallback("end_session", &reason);
                        return router
                            .with_local(|local| close_local(local, &query, now))
                            .map(|ids| ids.len())
                            .map_err(|local| Error::BothStoresFailed { remote: reason, local });
                    }
                },
            }
        }

        let closed = router.with_local(|local| close_local(local, &query, now))?;
        Ok(closed.len())
    }
}

fn active_sessions(user_id: &str) -> Query {
    Query::all()
        .eq(LoginSessionField::UserId, user_id)
        .eq(LoginSessionField::IsActive, true)
}

/// Closes the local sessions selected by `query`, returning their ids.
fn close_local<L: LocalStore>(
    local: &mut LocalAdapter<L>,
    query: &Query,
    now: DateTime<Utc>,
) -> core::result::Result<Vec<String>, LocalError> {
    let closed: Vec<LoginSession> = local
        .list::<LoginSession>(query)?
        .into_iter()
        .map(|session| session.closed_at(now))
        .collect();
    local.put_many(&closed)?;
    Ok(closed.into_iter().map(|session| session.id).collect())
}
