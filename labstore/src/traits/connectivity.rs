use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// A reachability transition reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// A trait defining the source of network reachability.
pub trait ConnectivityMonitor: Send + Sync {
    /// Current reachability.
    fn is_online(&self) -> bool;
    /// Receiver of every transition from now on.
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent>;
}

/// Source of timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
