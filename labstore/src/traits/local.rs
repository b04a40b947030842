use std::error::Error;

/// A trait defining the device-local persistent store.
///
/// The store is a plain byte repository keyed by `(namespace, id)`; it knows
/// nothing about records or their encoding. Calls are synchronous and never
/// depend on connectivity.
pub trait LocalStore: Send {
    /// Error type returned by the underlying medium.
    type Error: Error + Send + Sync + 'static;

    /// Should insert or overwrite the value stored under `(namespace, id)`.
    fn insert(&mut self, namespace: &str, id: &str, value: Vec<u8>) -> Result<(), Self::Error>;
    /// Should retrieve the value stored under `(namespace, id)`.
    fn get(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error>;
    /// Should remove and return the value stored under `(namespace, id)`.
    fn remove(&mut self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error>;
    /// Should list the ids present in `namespace`, in ascending order.
    fn scan_ids(&self, namespace: &str) -> Result<Vec<String>, Self::Error>;

    /// Insert several values into one namespace.
    ///
    /// Each entry must be written atomically on its own, so a failure partway
    /// never damages an unrelated entry. Stores able to do better may apply
    /// the whole batch atomically.
    ///
    /// # Errors
    ///
    /// Returns the first error of the underlying medium.
    fn insert_batch(
        &mut self,
        namespace: &str,
        entries: Vec<(String, Vec<u8>)>,
    ) -> Result<(), Self::Error> {
        for (id, value) in entries {
            self.insert(namespace, &id, value)?;
        }
        Ok(())
    }
}
