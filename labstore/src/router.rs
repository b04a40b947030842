use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, info, warn};

use crate::{
    Clock, ConnectivityEvent, ConnectivityMonitor, Error, LocalAdapter, LocalError, LocalStore,
    MigrationReport, RecordKind, RemoteAdapter, RemoteError, RemoteStore, ReplicationMigrator,
    Result, SessionLifecycleManager, SessionPolicy, SystemClock,
    migrator::DEFAULT_REPLICATED_KINDS,
};

mod notifications;
mod requests;
mod sessions;
mod subscriptions;
mod users;

/// Which store currently serves operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every operation is tried against the remote store first.
    RemotePreferred,
    /// Every operation goes straight to the local store.
    LocalFallback,
}

impl Mode {
    fn from_u8(value: u8) -> Self {
        if value == 0 {
            Mode::RemotePreferred
        } else {
            Mode::LocalFallback
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Mode::RemotePreferred => 0,
            Mode::LocalFallback => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterOptions {
    /// Go back to the remote store this long after falling back because of a
    /// failed call, provided the platform still reports connectivity.
    pub retry_remote_after: Option<Duration>,
    pub session_policy: SessionPolicy,
    /// Kinds replayed to the remote store after reconnecting.
    pub replicate: Vec<RecordKind>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            retry_remote_after: None,
            session_policy: SessionPolicy::default(),
            replicate: DEFAULT_REPLICATED_KINDS.to_vec(),
        }
    }
}

/// Routes every portal operation to the remote or the local store.
///
/// The router starts remote-preferred when the monitor reports connectivity.
/// A connectivity failure of a remote call, or an offline event, switches it
/// to local fallback; the failed operation is then completed against the
/// local store before returning. Only an online event (or the optional retry
/// delay) brings it back, and each such return runs one replication pass.
///
/// Connectivity events queued since the previous operation are applied at
/// the start of every operation. [`FailoverRouter::listen`] applies them as
/// they arrive instead, when spawned as a background task.
pub struct FailoverRouter<L: LocalStore> {
    remote: RemoteAdapter,
    local: Mutex<LocalAdapter<L>>,
    monitor: Arc<dyn ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    events: tokio::sync::Mutex<broadcast::Receiver<ConnectivityEvent>>,
    mode: AtomicU8,
    reconcile_pending: AtomicBool,
    /// When the last failed remote call caused a fallback.
    failed_at: Mutex<Option<DateTime<Utc>>>,
    reconciling: tokio::sync::Mutex<()>,
    options: RouterOptions,
    sessions: SessionLifecycleManager,
    migrator: ReplicationMigrator,
}

impl<L: LocalStore> FailoverRouter<L> {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: L,
        monitor: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        let events = monitor.subscribe();
        let mode = if monitor.is_online() {
            Mode::RemotePreferred
        } else {
            Mode::LocalFallback
        };
        let options = RouterOptions::default();
        Self {
            remote: RemoteAdapter::new(remote),
            local: Mutex::new(LocalAdapter::new(local)),
            monitor,
            clock: Arc::new(SystemClock),
            events: tokio::sync::Mutex::new(events),
            mode: AtomicU8::new(mode.as_u8()),
            reconcile_pending: AtomicBool::new(false),
            failed_at: Mutex::new(None),
            reconciling: tokio::sync::Mutex::new(()),
            sessions: SessionLifecycleManager::new(options.session_policy),
            migrator: ReplicationMigrator::new(options.replicate.iter().copied()),
            options,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: RouterOptions) -> Self {
        self.sessions = SessionLifecycleManager::new(options.session_policy);
        self.migrator = ReplicationMigrator::new(options.replicate.iter().copied());
        self.options = options;
        self
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Number of local records not yet replicated to the remote store.
    pub fn pending_replication(&self) -> Result<usize> {
        self.migrator.pending(self)
    }

    /// Consumes connectivity events as they arrive, until the monitor goes away.
    ///
    /// Meant to be spawned once per router; operations keep working without it.
    pub async fn listen(self: Arc<Self>) {
        let mut events = self.events.lock().await;
        loop {
            match events.recv().await {
                Ok(event) => self.apply(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Connectivity events lagged, resynchronising");
                    self.resync();
                }
                Err(RecvError::Closed) => break,
            }
            if self.reconcile_pending.swap(false, Ordering::SeqCst) {
                self.reconcile().await;
            }
        }
        debug!("Connectivity monitor closed, listener stopping");
    }

    /// Runs a replication pass now, if the remote store is authoritative.
    pub async fn reconcile(&self) -> MigrationReport {
        let _pass = self.reconciling.lock().await;
        if self.mode() != Mode::RemotePreferred {
            return MigrationReport::default();
        }
        match self.migrator.pending(self) {
            Ok(0) => {
                debug!("Nothing to replicate");
                return MigrationReport::default();
            }
            Ok(pending) => info!(pending, "Replicating local records"),
            Err(e) => warn!(error = %e, "Cannot count pending records, replicating anyway"),
        }
        self.migrator.run(self).await
    }

    /// Applies queued connectivity events and runs any reconciliation they owe.
    pub(crate) async fn prepare(&self) {
        if let Ok(mut events) = self.events.try_lock() {
            loop {
                match events.try_recv() {
                    Ok(event) => self.apply(event),
                    Err(TryRecvError::Lagged(missed)) => {
                        warn!(missed, "Connectivity events lagged, resynchronising");
                        self.resync();
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        self.retry_remote_if_due();
        if self.reconcile_pending.swap(false, Ordering::SeqCst) {
            self.reconcile().await;
        }
    }

    fn apply(&self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::Offline => {
                *self.failed_at() = None;
                if self.set_mode(Mode::LocalFallback) {
                    warn!("Connectivity lost, serving from local store");
                }
            }
            ConnectivityEvent::Online => {
                *self.failed_at() = None;
                self.set_mode(Mode::RemotePreferred);
                info!("Connectivity restored, remote store is authoritative");
                self.reconcile_pending.store(true, Ordering::SeqCst);
            }
        }
    }

    fn resync(&self) {
        let event = if self.monitor.is_online() {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        if event == ConnectivityEvent::Online && self.mode() == Mode::RemotePreferred {
            return;
        }
        self.apply(event);
    }

    fn retry_remote_if_due(&self) {
        let Some(delay) = self.options.retry_remote_after else {
            return;
        };
        if self.mode() != Mode::LocalFallback || !self.monitor.is_online() {
            return;
        }
        let mut failed_at = self.failed_at();
        if let Some(at) = *failed_at
            && self.clock.now() - at >= delay
        {
            *failed_at = None;
            drop(failed_at);
            info!("Retrying remote store after failed call");
            self.set_mode(Mode::RemotePreferred);
            self.reconcile_pending.store(true, Ordering::SeqCst);
        }
    }

    /// Returns whether the mode changed.
    fn set_mode(&self, mode: Mode) -> bool {
        self.mode.swap(mode.as_u8(), Ordering::SeqCst) != mode.as_u8()
    }

    fn failed_at(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.failed_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches to local fallback after a remote call failed for connectivity.
    pub(crate) fn enter_fallback(&self, op: &str, reason: &str) {
        *self.failed_at() = Some(self.clock.now());
        if self.set_mode(Mode::LocalFallback) {
            warn!(op, reason, "Remote store unavailable, falling back to local store");
        }
    }

    pub(crate) fn remote(&self) -> &RemoteAdapter {
        &self.remote
    }

    /// Runs `f` against the local store.
    pub(crate) fn with_local<T>(
        &self,
        f: impl FnOnce(&mut LocalAdapter<L>) -> core::result::Result<T, LocalError>,
    ) -> core::result::Result<T, LocalError> {
        let mut local = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut local)
    }

    /// Runs one logical operation against the authoritative store.
    ///
    /// In remote-preferred mode the remote call is attempted once. A
    /// connectivity failure moves the router to local fallback and the same
    /// operation is completed locally; any other remote failure is returned
    /// as is.
    pub(crate) async fn route<T>(
        &self,
        op: &'static str,
        remote: impl Future<Output = core::result::Result<T, RemoteError>>,
        local: impl FnOnce(&mut LocalAdapter<L>) -> core::result::Result<T, LocalError>,
    ) -> Result<T> {
        self.prepare().await;
        if self.mode() == Mode::RemotePreferred {
            debug!(op, "Routing to remote store");
            let reason = match remote.await {
                Ok(value) => return Ok(value),
                Err(e) => match Error::from_remote(e) {
                    Ok(error) => return Err(error),
                    Err(reason) => reason,
                },
            };
            self.enter_fallback(op, &reason);
            return self
                .with_local(local)
                .map_err(|local| Error::BothStoresFailed {
                    remote: reason,
                    local,
                });
        }
        debug!(op, "Routing to local store");
        Ok(self.with_local(local)?)
    }
}
