use tracing::{debug, error};

use crate::codec::{self, Codec};
use crate::{
    BorrowRequest, Component, Document, LocalError, LocalStore, LoginSession, Notification, Query,
    Record, RecordKind, User,
};

const REPLICATED_PREFIX: &str = "_replicated.";

/// A locally written record awaiting replication, by id. Records that fail
/// to decode are reported in place.
pub type PendingRecord = (String, Result<Document, LocalError>);

/// Typed access to the device-local store.
///
/// Records are stored bincode-encoded under their collection name. Alongside
/// them the adapter keeps a replication marker per record: writing a record
/// clears its marker, and [`LocalAdapter::mark_replicated`] sets it once the
/// remote store has accepted the record.
pub struct LocalAdapter<S: LocalStore> {
    store: S,
    codec: Codec,
}

impl<S: LocalStore> LocalAdapter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            codec: Codec::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gives direct access to the underlying store, bypassing the adapter.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Retrieves one record, or `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::StorageCorrupt`] when the stored payload no longer
    /// decodes, or [`LocalError::Backend`] when the medium fails.
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>, LocalError> {
        let Some(bytes) = self
            .store
            .get(R::KIND.collection(), id)
            .map_err(backend)?
        else {
            return Ok(None);
        };
        self.decode::<R>(id, &bytes).map(Some)
    }

    /// Like [`Self::get`], but absence is an error.
    pub fn require<R: Record>(&self, id: &str) -> Result<R, LocalError> {
        self.get(id)?.ok_or_else(|| LocalError::NotFound {
            kind: R::KIND,
            id: id.to_string(),
        })
    }

    /// Returns every record of `R` selected by `query`, in query order.
    ///
    /// A single corrupt record fails the whole listing rather than being
    /// silently skipped.
    pub fn list<R: Record>(&self, query: &Query) -> Result<Vec<R>, LocalError> {
        let documents = self.documents::<R>()?;
        query
            .apply(documents)
            .into_iter()
            .map(|document| {
                let id = document_id(&document);
                codec::from_document(document).map_err(|reason| corrupt(R::KIND, &id, reason))
            })
            .collect()
    }

    /// Inserts or overwrites `record`.
    pub fn put<R: Record>(&mut self, record: &R) -> Result<(), LocalError> {
        let bytes = self.encode(record)?;
        self.store
            .insert(R::KIND.collection(), record.id(), bytes)
            .map_err(backend)?;
        self.clear_marker(R::KIND, record.id())
    }

    /// Inserts or overwrites several records of one kind.
    pub fn put_many<R: Record>(&mut self, records: &[R]) -> Result<(), LocalError> {
        let entries = records
            .iter()
            .map(|record| {
                self.encode(record)
                    .map(|bytes| (record.id().to_string(), bytes))
            })
            .collect::<Result<Vec<_>, LocalError>>()?;
        self.store
            .insert_batch(R::KIND.collection(), entries)
            .map_err(backend)?;
        for record in records {
            self.clear_marker(R::KIND, record.id())?;
        }
        Ok(())
    }

    /// Applies a partial update to an existing record and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::NotFound`] if the record is absent and
    /// [`LocalError::Invalid`] if the merged document no longer forms an `R`.
    pub fn update<R: Record>(&mut self, id: &str, patch: &Document) -> Result<R, LocalError> {
        let current = self.require::<R>(id)?;
        let invalid = |reason: String| LocalError::Invalid {
            kind: R::KIND,
            id: id.to_string(),
            reason,
        };
        let mut document = codec::to_document(&current).map_err(invalid)?;
        codec::merge(&mut document, patch).map_err(invalid)?;
        let updated: R = codec::from_document(document).map_err(invalid)?;
        self.put(&updated)?;
        Ok(updated)
    }

    /// Removes a record. Removing an absent record is not an error.
    pub fn delete<R: Record>(&mut self, id: &str) -> Result<(), LocalError> {
        self.store
            .remove(R::KIND.collection(), id)
            .map_err(backend)?;
        self.store
            .remove(&marker_namespace(R::KIND), id)
            .map_err(backend)?;
        Ok(())
    }

    /// Ids of the records of `kind` written since they were last replicated.
    pub fn pending_ids(&self, kind: RecordKind) -> Result<Vec<String>, LocalError> {
        let replicated = self
            .store
            .scan_ids(&marker_namespace(kind))
            .map_err(backend)?;
        let mut ids = self.store.scan_ids(kind.collection()).map_err(backend)?;
        // Both listings are sorted.
        ids.retain(|id| replicated.binary_search(id).is_err());
        Ok(ids)
    }

    /// Loads the records of `kind` awaiting replication.
    ///
    /// A record that fails to decode is returned as an error next to the good
    /// ones, so one damaged entry does not hold back the rest.
    pub fn pending_records(&self, kind: RecordKind) -> Result<Vec<PendingRecord>, LocalError> {
        let ids = self.pending_ids(kind)?;
        Ok(ids
            .into_iter()
            .map(|id| {
                let document = self.load_document(kind, &id);
                (id, document)
            })
            .collect())
    }

    /// Records that the remote store holds the current version of a record.
    pub fn mark_replicated(&mut self, kind: RecordKind, id: &str) -> Result<(), LocalError> {
        debug!(%kind, id, "Marking record as replicated");
        self.store
            .insert(&marker_namespace(kind), id, Vec::new())
            .map_err(backend)
    }

    fn clear_marker(&mut self, kind: RecordKind, id: &str) -> Result<(), LocalError> {
        self.store
            .remove(&marker_namespace(kind), id)
            .map(|_| ())
            .map_err(backend)
    }

    /// Decodes a record of a kind only known at runtime into its document form.
    pub fn load_document(&self, kind: RecordKind, id: &str) -> Result<Document, LocalError> {
        match kind {
            RecordKind::User => self.require_document::<User>(id),
            RecordKind::Component => self.require_document::<Component>(id),
            RecordKind::Request => self.require_document::<BorrowRequest>(id),
            RecordKind::Notification => self.require_document::<Notification>(id),
            RecordKind::LoginSession => self.require_document::<LoginSession>(id),
        }
    }

    fn require_document<R: Record>(&self, id: &str) -> Result<Document, LocalError> {
        let record = self.require::<R>(id)?;
        codec::to_document(&record).map_err(|reason| corrupt(R::KIND, id, reason))
    }

    fn documents<R: Record>(&self) -> Result<Vec<Document>, LocalError> {
        let ids = self.store.scan_ids(R::KIND.collection()).map_err(backend)?;
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            // An entry removed between scan and read is simply skipped.
            if let Some(record) = self.get::<R>(&id)? {
                let document =
                    codec::to_document(&record).map_err(|reason| corrupt(R::KIND, &id, reason))?;
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn encode<R: Record>(&self, record: &R) -> Result<Vec<u8>, LocalError> {
        self.codec.encode(record).map_err(|reason| LocalError::Invalid {
            kind: R::KIND,
            id: record.id().to_string(),
            reason,
        })
    }

    fn decode<R: Record>(&self, id: &str, bytes: &[u8]) -> Result<R, LocalError> {
        self.codec.decode(bytes).map_err(|reason| {
            error!(kind = %R::KIND, id, %reason, "Stored record failed to decode");
            corrupt(R::KIND, id, reason)
        })
    }
}

fn marker_namespace(kind: RecordKind) -> String {
    format!("{REPLICATED_PREFIX}{}", kind.collection())
}

fn document_id(document: &Document) -> String {
    document
        .get("id")
        .and_then(|id| id.as_str())
        .unwrap_or_default()
        .to_string()
}

fn corrupt(kind: RecordKind, id: &str, reason: String) -> LocalError {
    LocalError::StorageCorrupt {
        kind,
        id: id.to_string(),
        reason,
    }
}

fn backend(e: impl std::error::Error) -> LocalError {
    LocalError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ComponentField, Direction, MemoryStore};

    fn component(id: &str, available: u32) -> Component {
        Component {
            id: id.into(),
            name: format!("Part {id}"),
            category: "sensors".into(),
            description: None,
            total_quantity: 10,
            available_quantity: available,
        }
    }

    fn patch(value: serde_json::Value) -> Document {
        codec::to_document(&value).unwrap()
    }

    #[test]
    fn put_then_get() {
        let mut local = LocalAdapter::new(MemoryStore::new());
        local.put(&component("c1", 3)).unwrap();
        assert_eq!(local.get::<Component>("c1").unwrap(), Some(component("c1", 3)));
        assert_eq!(local.get::<Component>("c2").unwrap(), None);
        assert!(matches!(
            local.require::<Component>("c2"),
            Err(LocalError::NotFound { kind: RecordKind::Component, .. })
        ));
    }

    #[test]
    fn partial_update_merges_fields() {
        let mut local = LocalAdapter::new(MemoryStore::new());
        local.put(&component("c1", 3)).unwrap();

        let updated: Component = local
            .update("c1", &patch(json!({"availableQuantity": 1})))
            .unwrap();
        assert_eq!(updated.available_quantity, 1);
        assert_eq!(updated.name, "Part c1");

        let bad = local.update::<Component>("c1", &patch(json!({"availableQuantity": "many"})));
        assert!(matches!(bad, Err(LocalError::Invalid { .. })));
        assert!(matches!(
            local.update::<Component>("missing", &patch(json!({"name": "x"}))),
            Err(LocalError::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let mut local = LocalAdapter::new(MemoryStore::new());
        local.put(&component("c1", 3)).unwrap();
        LocalStore::insert(local.store_mut(), "components", "c2", vec![0xde, 0xad]).unwrap();

        assert_eq!(local.get::<Component>("c1").unwrap(), Some(component("c1", 3)));
        assert!(matches!(
            local.get::<Component>("c2"),
            Err(LocalError::StorageCorrupt { ref id, .. }) if id == "c2"
        ));
        assert!(local.list::<Component>(&Query::all()).is_err());
    }

    #[test]
    fn list_applies_query() {
        let mut local = LocalAdapter::new(MemoryStore::new());
        local
            .put_many(&[component("a", 5), component("b", 0), component("c", 2)])
            .unwrap();

        let query = Query::all().order_by(ComponentField::AvailableQuantity, Direction::Descending);
        let ids: Vec<_> = local
            .list::<Component>(&query)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["a", "c", "b"]);

        let query = Query::all().eq(ComponentField::AvailableQuantity, 0);
        assert_eq!(local.list::<Component>(&query).unwrap(), [component("b", 0)]);
    }

    #[test]
    fn writes_reset_replication_marker() {
        let mut local = LocalAdapter::new(MemoryStore::new());
        local.put(&component("a", 1)).unwrap();
        local.put(&component("b", 1)).unwrap();
        assert_eq!(local.pending_ids(RecordKind::Component).unwrap(), ["a", "b"]);

        local.mark_replicated(RecordKind::Component, "a").unwrap();
        assert_eq!(local.pending_ids(RecordKind::Component).unwrap(), ["b"]);

        local
            .update::<Component>("a", &patch(json!({"availableQuantity": 0})))
            .unwrap();
        assert_eq!(local.pending_ids(RecordKind::Component).unwrap(), ["a", "b"]);

        local.delete::<Component>("b").unwrap();
        let pending = local.pending_records(RecordKind::Component).unwrap();
        assert_eq!(pending.len(), 1);
        let (id, document) = &pending[0];
        assert_eq!(id, "a");
        assert_eq!(document.as_ref().unwrap()["availableQuantity"], json!(0));
    }
}
