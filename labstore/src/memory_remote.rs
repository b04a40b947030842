use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use async_trait::async_trait;

use crate::codec;
use crate::{
    BatchError, Document, Query, RecordKind, Rejection, RemoteError, RemoteStore,
    SnapshotCallback, Subscription,
};

struct Subscriber {
    id: u64,
    kind: RecordKind,
    query: Query,
    callback: SnapshotCallback,
}

struct State {
    collections: BTreeMap<RecordKind, BTreeMap<String, Document>>,
    available: bool,
    injected: VecDeque<RemoteError>,
    batch_limit: Option<usize>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    calls: usize,
}

type Delivery = Vec<(SnapshotCallback, Vec<Document>)>;

/// An in-process [`RemoteStore`].
///
/// Cloning yields another handle to the same store. Standing subscriptions
/// receive the full matching set once on registration and again after every
/// change to their collection; callbacks run after the internal lock is
/// released, so they may call back into the store.
///
/// The store can also be made to misbehave, which is what the failover tests
/// rely on: see [`MemoryRemote::set_available`], [`MemoryRemote::fail_next`]
/// and [`MemoryRemote::fail_batch_after`].
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                collections: BTreeMap::new(),
                available: true,
                injected: VecDeque::new(),
                batch_limit: None,
                subscribers: Vec::new(),
                next_subscriber: 0,
                calls: 0,
            })),
        }
    }

    /// While unavailable every call fails with [`RemoteError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Makes the next call fail with `error`, whatever it is.
    pub fn fail_next(&self, error: RemoteError) {
        self.lock().injected.push_back(error);
    }

    /// Makes the next batch update apply only its first `applied` patches and
    /// then fail as unavailable.
    pub fn fail_batch_after(&self, applied: usize) {
        self.lock().batch_limit = Some(applied);
    }

    /// Number of calls received so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Current contents of one collection, in id order.
    pub fn documents(&self, kind: RecordKind) -> Vec<Document> {
        self.lock()
            .collections
            .get(&kind)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call and returns the state if the store can serve it.
    fn begin(&self) -> Result<MutexGuard<'_, State>, RemoteError> {
        let mut state = self.lock();
        state.calls += 1;
        if let Some(error) = state.injected.pop_front() {
            return Err(error);
        }
        if !state.available {
            return Err(RemoteError::Unavailable("remote store unreachable".into()));
        }
        Ok(state)
    }

    fn deliver(delivery: Delivery) {
        for (callback, snapshot) in delivery {
            callback(snapshot);
        }
    }
}

impl State {
    fn collection(&mut self, kind: RecordKind) -> &mut BTreeMap<String, Document> {
        self.collections.entry(kind).or_default()
    }

    fn select(&self, kind: RecordKind, query: &Query) -> Vec<Document> {
        let documents = self
            .collections
            .get(&kind)
            .map(|documents| documents.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        query.apply(documents)
    }

    /// Snapshots owed to the subscribers of `kind` after a change.
    fn changed(&self, kind: RecordKind) -> Delivery {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.kind == kind)
            .map(|subscriber| {
                (
                    Arc::clone(&subscriber.callback),
                    self.select(kind, &subscriber.query),
                )
            })
            .collect()
    }

    fn patch(&mut self, kind: RecordKind, id: &str, patch: &Document) -> Result<(), RemoteError> {
        let Some(document) = self.collection(kind).get_mut(id) else {
            return Err(RemoteError::NotFound {
                kind,
                id: id.to_string(),
            });
        };
        codec::merge(document, patch).map_err(|reason| RemoteError::Rejected(Rejection::Invalid(reason)))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get(&self, kind: RecordKind, id: &str) -> Result<Document, RemoteError> {
        let mut state = self.begin()?;
        state
            .collection(kind)
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    async fn add(&self, kind: RecordKind, document: Document) -> Result<(), RemoteError> {
        let Some(id) = document.get("id").and_then(|id| id.as_str()).map(str::to_string) else {
            return Err(RemoteError::Rejected(Rejection::Invalid(
                "document has no string id".into(),
            )));
        };
        let delivery = {
            let mut state = self.begin()?;
            let collection = state.collection(kind);
            if collection.contains_key(&id) {
                return Err(RemoteError::Rejected(Rejection::DuplicateId(id)));
            }
            collection.insert(id, document);
            state.changed(kind)
        };
        Self::deliver(delivery);
        Ok(())
    }

    async fn update(&self, kind: RecordKind, id: &str, patch: Document) -> Result<(), RemoteError> {
        let delivery = {
            let mut state = self.begin()?;
            state.patch(kind, id, &patch)?;
            state.changed(kind)
        };
        Self::deliver(delivery);
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), RemoteError> {
        let delivery = {
            let mut state = self.begin()?;
            if state.collection(kind).remove(id).is_none() {
                return Err(RemoteError::NotFound {
                    kind,
                    id: id.to_string(),
                });
            }
            state.changed(kind)
        };
        Self::deliver(delivery);
        Ok(())
    }

    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Document>, RemoteError> {
        let state = self.begin()?;
        Ok(state.select(kind, query))
    }

    /// Applies the batch atomically unless a partial failure was injected.
    async fn update_batch(
        &self,
        kind: RecordKind,
        patches: Vec<(String, Document)>,
    ) -> Result<(), BatchError> {
        let (delivery, result) = {
            let mut state = self
                .begin()
                .map_err(|error| BatchError { applied: 0, error })?;
            let result = match state.batch_limit.take() {
                Some(applied) if applied < patches.len() => {
                    for (id, patch) in &patches[..applied] {
                        state
                            .patch(kind, id, patch)
                            .map_err(|error| BatchError { applied: 0, error })?;
                    }
                    Err(BatchError {
                        applied,
                        error: RemoteError::Unavailable("connection lost mid-batch".into()),
                    })
                }
                _ => {
                    // Validate everything first so a bad patch leaves no trace.
                    let mut staged = state.collection(kind).clone();
                    for (id, patch) in &patches {
                        let Some(document) = staged.get_mut(id) else {
                            return Err(BatchError {
                                applied: 0,
                                error: RemoteError::NotFound {
                                    kind,
                                    id: id.clone(),
                                },
                            });
                        };
                        codec::merge(document, patch).map_err(|reason| BatchError {
                            applied: 0,
                            error: RemoteError::Rejected(Rejection::Invalid(reason)),
                        })?;
                    }
                    *state.collection(kind) = staged;
                    Ok(())
                }
            };
            (state.changed(kind), result)
        };
        Self::deliver(delivery);
        result
    }

    async fn subscribe(
        &self,
        kind: RecordKind,
        query: Query,
        callback: SnapshotCallback,
    ) -> Result<Subscription, RemoteError> {
        let (id, snapshot) = {
            let mut state = self.begin()?;
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            let snapshot = state.select(kind, &query);
            state.subscribers.push(Subscriber {
                id,
                kind,
                query,
                callback: Arc::clone(&callback),
            });
            (id, snapshot)
        };
        callback(snapshot);

        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        Ok(Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.subscribers.retain(|subscriber| subscriber.id != id);
            }
        }))
    }
}
