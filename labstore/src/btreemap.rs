use std::{collections::BTreeMap, convert::Infallible};

use crate::LocalStore;

/// A memory-based local store using a [`BTreeMap`].
///
/// Entries are keyed by `(namespace, id)`, which keeps each namespace contiguous
/// for scans. Useful in tests and on devices without a writable filesystem;
/// contents do not survive the process.
pub type MemoryStore = BTreeMap<(String, String), Vec<u8>>;

impl LocalStore for MemoryStore {
    /// [`MemoryStore`] operations don't fail.
    type Error = Infallible;

    fn insert(&mut self, namespace: &str, id: &str, value: Vec<u8>) -> Result<(), Self::Error> {
        BTreeMap::insert(self, (namespace.to_string(), id.to_string()), value);
        Ok(())
    }

    fn get(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(BTreeMap::get(self, &(namespace.to_string(), id.to_string())).cloned())
    }

    fn remove(&mut self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(BTreeMap::remove(
            self,
            &(namespace.to_string(), id.to_string()),
        ))
    }

    fn scan_ids(&self, namespace: &str) -> Result<Vec<String>, Self::Error> {
        let start = (namespace.to_string(), String::new());
        Ok(self
            .range(start..)
            .take_while(|((ns, _), _)| ns == namespace)
            .map(|((_, id), _)| id.clone())
            .collect())
    }
}
