use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{BatchError, Document, Query, RecordKind, RemoteError};

/// Callback of a standing subscription, invoked with the full matching result set.
pub type SnapshotCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// A trait defining the authoritative, hosted document store.
///
/// Every method may fail. Implementations classify failures into
/// [`RemoteError::Unavailable`], [`RemoteError::NotFound`] and
/// [`RemoteError::Rejected`] and never retry on their own.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches one document by id.
    async fn get(&self, kind: RecordKind, id: &str) -> Result<Document, RemoteError>;

    /// Fetches every document whose `field` equals `value`.
    async fn get_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, RemoteError> {
        self.list(kind, &Query::all().eq_raw(field, value.clone()))
            .await
    }

    /// Creates a document; fails with [`Rejection::DuplicateId`](crate::Rejection::DuplicateId)
    /// when the id is taken.
    async fn add(&self, kind: RecordKind, document: Document) -> Result<(), RemoteError>;

    /// Merges `patch` into an existing document.
    async fn update(&self, kind: RecordKind, id: &str, patch: Document) -> Result<(), RemoteError>;

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), RemoteError>;

    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Document>, RemoteError>;

    /// Applies several patches in one request.
    ///
    /// The default implementation applies them one by one and reports how many
    /// succeeded before the first failure.
    async fn update_batch(
        &self,
        kind: RecordKind,
        patches: Vec<(String, Document)>,
    ) -> Result<(), BatchError> {
        for (applied, (id, patch)) in patches.into_iter().enumerate() {
            self.update(kind, &id, patch)
                .await
                .map_err(|error| BatchError { applied, error })?;
        }
        Ok(())
    }

    /// Establishes a standing channel delivering every change of the matching set.
    async fn subscribe(
        &self,
        kind: RecordKind,
        query: Query,
        callback: SnapshotCallback,
    ) -> Result<Subscription, RemoteError>;
}

/// Handle of a standing subscription.
///
/// The subscription ends on [`Subscription::unsubscribe`] or when the handle is dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
