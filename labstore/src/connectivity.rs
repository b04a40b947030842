use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

use crate::{Clock, ConnectivityEvent, ConnectivityMonitor};

const EVENT_CAPACITY: usize = 64;

/// A [`ConnectivityMonitor`] driven by its owner.
///
/// The host platform glue (or a test) calls [`ManualConnectivity::set_online`]
/// whenever reachability changes; an event is broadcast only on an actual
/// transition.
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
    sender: broadcast::Sender<ConnectivityEvent>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: AtomicBool::new(online),
            sender,
        }
    }

    /// Records the new reachability, returning whether it was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }
        let event = if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        // No receivers is fine: nobody is listening yet.
        let _ = self.sender.send(event);
        true
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.sender.subscribe()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcasts_only_transitions() {
        let monitor = ManualConnectivity::new(true);
        let mut events = monitor.subscribe();

        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));

        assert_eq!(events.try_recv(), Ok(ConnectivityEvent::Offline));
        assert_eq!(events.try_recv(), Ok(ConnectivityEvent::Online));
        assert!(events.try_recv().is_err());
        assert!(monitor.is_online());
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now() - start, Duration::minutes(5));
    }
}
