#![allow(dead_code)]

use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use labstore::{
    BorrowRequest, Component, FailoverRouter, LocalStore, ManualClock, ManualConnectivity,
    MemoryRemote, MemoryStore, Notification, NotificationKind, RequestStatus, Role, RouterOptions,
    User,
};

/// A fixed instant with millisecond precision, which is what both stores keep.
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_760_000_000_000).unwrap()
}

/// A router over in-memory stores with every external signal under test control.
pub struct Harness {
    pub remote: MemoryRemote,
    pub monitor: Arc<ManualConnectivity>,
    pub clock: Arc<ManualClock>,
    pub local_calls: Arc<AtomicUsize>,
    pub router: Arc<FailoverRouter<CountingStore>>,
}

impl Harness {
    pub fn online() -> Self {
        Self::build(true, RouterOptions::default())
    }

    pub fn offline() -> Self {
        Self::build(false, RouterOptions::default())
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self::build(true, options)
    }

    fn build(online: bool, options: RouterOptions) -> Self {
        let remote = MemoryRemote::new();
        remote.set_available(online);
        let monitor = Arc::new(ManualConnectivity::new(online));
        let clock = Arc::new(ManualClock::new(t0()));
        let local_calls = Arc::new(AtomicUsize::new(0));
        let local = CountingStore {
            inner: MemoryStore::new(),
            calls: Arc::clone(&local_calls),
        };
        let router = FailoverRouter::new(Arc::new(remote.clone()), local, monitor.clone())
            .with_clock(clock.clone())
            .with_options(options);
        Self {
            remote,
            monitor,
            clock,
            local_calls,
            router: Arc::new(router),
        }
    }

    /// The network drops: the store becomes unreachable and the platform notices.
    pub fn disconnect(&self) {
        self.remote.set_available(false);
        self.monitor.set_online(false);
    }

    pub fn reconnect(&self) {
        self.remote.set_available(true);
        self.monitor.set_online(true);
    }

    pub fn local_calls(&self) -> usize {
        self.local_calls.load(Ordering::SeqCst)
    }
}

/// A [`MemoryStore`] counting every call it receives.
pub struct CountingStore {
    inner: MemoryStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl LocalStore for CountingStore {
    type Error = Infallible;

    fn insert(&mut self, namespace: &str, id: &str, value: Vec<u8>) -> Result<(), Self::Error> {
        self.count();
        LocalStore::insert(&mut self.inner, namespace, id, value)
    }

    fn get(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        self.count();
        LocalStore::get(&self.inner, namespace, id)
    }

    fn remove(&mut self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        self.count();
        LocalStore::remove(&mut self.inner, namespace, id)
    }

    fn scan_ids(&self, namespace: &str) -> Result<Vec<String>, Self::Error> {
        self.count();
        self.inner.scan_ids(namespace)
    }
}

pub fn student(id: &str) -> User {
    User {
        id: id.into(),
        name: format!("Student {id}"),
        email: format!("{id}@students.lab"),
        role: Role::Student,
        roll_no: Some(format!("R-{id}")),
        mobile: None,
        registered_at: t0() - Duration::days(30),
        login_count: 0,
        last_login_at: None,
        is_active: false,
    }
}

pub fn component(id: &str, total: u32, available: u32) -> Component {
    Component {
        id: id.into(),
        name: format!("Component {id}"),
        category: "sensors".into(),
        description: None,
        total_quantity: total,
        available_quantity: available,
    }
}

pub fn request(id: &str, student_id: &str, component_id: &str, quantity: u32) -> BorrowRequest {
    BorrowRequest {
        id: id.into(),
        student_id: student_id.into(),
        student_name: format!("Student {student_id}"),
        component_id: component_id.into(),
        component_name: format!("Component {component_id}"),
        quantity,
        status: RequestStatus::Pending,
        request_date: t0(),
        due_date: t0() + Duration::days(7),
        return_date: None,
        notes: None,
    }
}

pub fn notification(id: &str, user_id: &str, created_at: DateTime<Utc>) -> Notification {
    Notification {
        id: id.into(),
        user_id: user_id.into(),
        title: "Request update".into(),
        message: format!("Notification {id}"),
        kind: NotificationKind::Info,
        read: false,
        created_at,
    }
}
