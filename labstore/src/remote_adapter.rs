use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::codec;
use crate::{
    BatchError, Document, Query, Record, RecordField, RemoteError, RemoteStore, Rejection,
    SnapshotCallback, Subscription,
};

/// Typed access to the remote store.
///
/// Converts records to documents on the way out and back on the way in. A
/// document that does not decode into the expected record is reported as
/// [`Rejection::Invalid`]: the store answered, but with something unusable.
pub struct RemoteAdapter {
    store: Arc<dyn RemoteStore>,
}

impl RemoteAdapter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub async fn get<R: Record>(&self, id: &str) -> Result<R, RemoteError> {
        let document = self.store.get(R::KIND, id).await?;
        decode(document)
    }

    /// Like [`Self::get`], with [`RemoteError::NotFound`] turned into `None`.
    pub async fn find<R: Record>(&self, id: &str) -> Result<Option<R>, RemoteError> {
        match self.get(id).await {
            Ok(record) => Ok(Some(record)),
            Err(RemoteError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_by_field<R: Record>(
        &self,
        field: R::Field,
        value: impl Into<Value>,
    ) -> Result<Vec<R>, RemoteError> {
        let documents = self
            .store
            .get_by_field(R::KIND, field.name(), &value.into())
            .await?;
        documents.into_iter().map(decode::<R>).collect()
    }

    pub async fn add<R: Record>(&self, record: &R) -> Result<(), RemoteError> {
        self.store.add(R::KIND, encode(record)?).await
    }

    /// Overwrites every field of an existing record.
    pub async fn replace<R: Record>(&self, record: &R) -> Result<(), RemoteError> {
        self.store
            .update(R::KIND, record.id(), encode(record)?)
            .await
    }

    /// Merges a partial document into an existing record.
    pub async fn update<R: Record>(&self, id: &str, patch: Document) -> Result<(), RemoteError> {
        self.store.update(R::KIND, id, patch).await
    }

    pub async fn delete<R: Record>(&self, id: &str) -> Result<(), RemoteError> {
        self.store.delete(R::KIND, id).await
    }

    pub async fn list<R: Record>(&self, query: &Query) -> Result<Vec<R>, RemoteError> {
        let documents = self.store.list(R::KIND, query).await?;
        documents.into_iter().map(decode::<R>).collect()
    }

    /// Overwrites several records of one kind in a single request.
    pub async fn replace_batch<R: Record>(&self, records: &[R]) -> Result<(), BatchError> {
        let patches = records
            .iter()
            .map(|record| encode(record).map(|document| (record.id().to_string(), document)))
            .collect::<Result<Vec<_>, RemoteError>>()
            .map_err(|error| BatchError { applied: 0, error })?;
        self.store.update_batch(R::KIND, patches).await
    }

    /// Subscribes to the records selected by `query`.
    ///
    /// Snapshots containing a document that fails to decode are dropped with a
    /// warning rather than delivered partially.
    pub async fn subscribe<R: Record>(
        &self,
        query: Query,
        callback: impl Fn(Vec<R>) + Send + Sync + 'static,
    ) -> Result<Subscription, RemoteError> {
        let callback: SnapshotCallback = Arc::new(move |documents: Vec<Document>| {
            match documents.into_iter().map(decode).collect::<Result<Vec<R>, _>>() {
                Ok(records) => callback(records),
                Err(e) => warn!(kind = %R::KIND, error = %e, "Dropping undecodable snapshot"),
            }
        });
        self.store.subscribe(R::KIND, query, callback).await
    }
}

fn encode<R: Record>(record: &R) -> Result<Document, RemoteError> {
    codec::to_document(record).map_err(|reason| RemoteError::Rejected(Rejection::Invalid(reason)))
}

fn decode<R: Record>(document: Document) -> Result<R, RemoteError> {
    codec::from_document(document).map_err(|reason| {
        RemoteError::Rejected(Rejection::Invalid(format!(
            "malformed {} document: {reason}",
            R::KIND
        )))
    })
}
