use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    Document, Error, LocalError, LocalStore, LoginSessionField, RecordField, RecordKind, Rejection,
    RemoteError, router::FailoverRouter,
};

/// Kinds replayed when nothing else is configured.
pub const DEFAULT_REPLICATED_KINDS: [RecordKind; 3] = [
    RecordKind::Component,
    RecordKind::Request,
    RecordKind::Notification,
];

/// A record the last pass could not replicate. It stays pending.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationFailure {
    pub kind: RecordKind,
    pub id: String,
    pub error: Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Records now known to the remote store.
    pub replicated: usize,
    pub failed: Vec<ReplicationFailure>,
    /// The remote store became unreachable before the pass finished.
    pub interrupted: bool,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        !self.interrupted && self.failed.is_empty()
    }
}

/// Replays locally written records to the remote store.
///
/// Each pending record is sent as an `add`; if the remote store already has
/// the id, the local copy overwrites it with a full-document `update`. A
/// record is marked replicated only after the remote store accepted it and
/// only if the local copy did not change meanwhile, so delivery is
/// at-least-once.
///
/// Session closures are always replayed, even when sessions are not among
/// the configured kinds: a closure is sent as an `update` of the remote
/// session, and one the remote store never knew is simply dropped.
#[derive(Debug, Clone)]
pub struct ReplicationMigrator {
    kinds: Vec<RecordKind>,
}

impl Default for ReplicationMigrator {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICATED_KINDS)
    }
}

impl ReplicationMigrator {
    /// Users are never replayed: accounts are created through registration only.
    pub fn new(kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        let mut selected = Vec::new();
        for kind in kinds {
            if kind == RecordKind::User {
                warn!("Refusing to replicate users from the local store");
            } else if !selected.contains(&kind) {
                selected.push(kind);
            }
        }
        Self { kinds: selected }
    }

    pub fn kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    /// Number of records awaiting replication.
    pub fn pending<L: LocalStore>(&self, router: &FailoverRouter<L>) -> Result<usize, Error> {
        let pending = router.with_local(|local| {
            let mut count = 0;
            for (kind, scope) in self.plan() {
                count += match scope {
                    Scope::Everything => local.pending_ids(kind)?.len(),
                    Scope::SessionClosures => local
                        .pending_records(kind)?
                        .iter()
                        .filter(|(_, document)| document.as_ref().is_ok_and(is_closed_session))
                        .count(),
                };
            }
            Ok(count)
        })?;
        Ok(pending)
    }

    fn plan(&self) -> Vec<(RecordKind, Scope)> {
        let mut plan: Vec<_> = self
            .kinds
            .iter()
            .map(|&kind| (kind, Scope::Everything))
            .collect();
        if !self.kinds.contains(&RecordKind::LoginSession) {
            plan.push((RecordKind::LoginSession, Scope::SessionClosures));
        }
        plan
    }

    /// Runs one replication pass.
    ///
    /// A connectivity failure stops the pass and moves the router to local
    /// fallback; any other failure is recorded and the pass moves on.
    pub async fn run<L: LocalStore>(&self, router: &FailoverRouter<L>) -> MigrationReport {
        let mut report = MigrationReport::default();

        for (kind, scope) in self.plan() {
            let pending = match router.with_local(|local| local.pending_records(kind)) {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(%kind, error = %e, "Cannot list records pending replication");
                    report.failed.push(ReplicationFailure {
                        kind,
                        id: String::new(),
                        error: e.into(),
                    });
                    continue;
                }
            };

            for (id, document) in pending {
                let document = match document {
                    Ok(document) => document,
                    Err(e) => {
                        report.failed.push(ReplicationFailure {
                            kind,
                            id,
                            error: e.into(),
                        });
                        continue;
                    }
                };

                let remote = router.remote().store();
                let outcome = match scope {
                    Scope::Everything => {
                        let mut outcome = remote.add(kind, document.clone()).await;
                        if let Err(RemoteError::Rejected(Rejection::DuplicateId(_))) = outcome {
                            debug!(%kind, id, "Already present remotely, overwriting");
                            outcome = remote.update(kind, &id, document.clone()).await;
                        }
                        outcome
                    }
                    Scope::SessionClosures if !is_closed_session(&document) => continue,
                    Scope::SessionClosures => {
                        match remote.update(kind, &id, document.clone()).await {
                            Err(RemoteError::NotFound { .. }) => {
                                debug!(id, "Closed session never reached the remote store");
                                Ok(())
                            }
                            outcome => outcome,
                        }
                    }
                };

                match outcome {
                    Ok(()) => {
                        let marked = router.with_local(|local| {
                            match local.load_document(kind, &id) {
                                Ok(current) if current == document => {
                                    local.mark_replicated(kind, &id).map(|()| true)
                                }
                                // Rewritten or removed since it was read: leave it be.
                                Ok(_) | Err(LocalError::NotFound { .. }) => Ok(false),
                                Err(e) => Err(e),
                            }
                        });
                        match marked {
                            Ok(true) => report.replicated += 1,
                            Ok(false) => debug!(%kind, id, "Changed during replication"),
                            Err(e) => report.failed.push(ReplicationFailure {
                                kind,
                                id,
                                error: e.into(),
                            }),
                        }
                    }
                    Err(RemoteError::Unavailable(reason)) => {
                        router.enter_fallback("replication", &reason);
                        report.interrupted = true;
                        warn!(
                            replicated = report.replicated,
                            "Replication interrupted by connectivity loss"
                        );
                        return report;
                    }
                    Err(e) => {
                        warn!(%kind, id, error = %e, "Remote store refused replicated record");
                        let error = match e {
                            RemoteError::Rejected(rejection) => Error::Rejected(rejection),
                            _ => Error::NotFound {
                                kind,
                                id: id.clone(),
                            },
                        };
                        report.failed.push(ReplicationFailure { kind, id, error });
                    }
                }
            }
        }

        info!(
            replicated = report.replicated,
            failed = report.failed.len(),
            "Replication pass finished"
        );
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Everything,
    SessionClosures,
}

fn is_closed_session(document: &Document) -> bool {
    document.get(LoginSessionField::IsActive.name()) == Some(&Value::Bool(false))
}
