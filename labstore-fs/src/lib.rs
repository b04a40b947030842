//! File system local store for labstore.
//!
//! Every record lives in its own file, `<data_dir>/<namespace>/<id>.dat`,
//! with namespace and id percent-encoded into safe path components. Writes
//! go to a temporary file that is synced and then renamed over the target,
//! so a crash leaves either the old or the new payload, never a torn one,
//! and a failed write never touches any other record.
//!
//! # Example
//!
//! ```no_run
//! use labstore::{FailoverRouter, ManualConnectivity, MemoryRemote};
//! use labstore_fs::FileStore;
//! use std::sync::Arc;
//!
//! let store = FileStore::new("./labstore-data").expect("Failed to create storage");
//! let router = FailoverRouter::new(
//!     Arc::new(MemoryRemote::new()),
//!     store,
//!     Arc::new(ManualConnectivity::new(true)),
//! );
//! ```

mod error;
mod naming;

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use labstore::LocalStore;

pub use error::FileStoreError;
pub use naming::{decode_from_filename, encode_for_filename};

/// A [`LocalStore`] keeping one file per record.
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// The file extension used for all record files.
    const FILE_EXTENSION: &'static str = ".dat";
    const TEMP_EXTENSION: &'static str = ".tmp";

    /// Opens a store rooted at `data_dir`, creating the directory if needed.
    ///
    /// Temporary files left behind by an interrupted write are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or read.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(FileStoreError::io(&data_dir))?;
        let store = Self { data_dir };
        store.remove_stale_temp_files()?;
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.data_dir.join(encode_for_filename(namespace))
    }

    fn record_path(&self, namespace: &str, id: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}{}", encode_for_filename(id), Self::FILE_EXTENSION))
    }

    /// Temporary files start with a dot, which no encoded id does.
    fn temp_path(&self, namespace: &str, id: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!(".{}{}", encode_for_filename(id), Self::TEMP_EXTENSION))
    }

    /// Extracts a record id from a file name, skipping anything else.
    fn filename_to_id(filename: &str) -> Option<String> {
        filename
            .strip_suffix(Self::FILE_EXTENSION)
            .filter(|name| !name.starts_with('.'))
            .and_then(decode_from_filename)
    }

    /// Writes `value` next to its final location and syncs it.
    fn stage(&self, namespace: &str, id: &str, value: &[u8]) -> Result<PathBuf, FileStoreError> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).map_err(FileStoreError::io(&dir))?;
        let temp = self.temp_path(namespace, id);
        let mut file = File::create(&temp).map_err(FileStoreError::io(&temp))?;
        file.write_all(value)
            .and_then(|()| file.sync_all())
            .map_err(FileStoreError::io(&temp))?;
        Ok(temp)
    }

    fn commit(&self, temp: &Path, namespace: &str, id: &str) -> Result<(), FileStoreError> {
        let target = self.record_path(namespace, id);
        fs::rename(temp, &target).map_err(FileStoreError::io(&target))
    }

    fn remove_stale_temp_files(&self) -> Result<(), FileStoreError> {
        let namespaces = fs::read_dir(&self.data_dir).map_err(FileStoreError::io(&self.data_dir))?;
        for namespace in namespaces.flatten() {
            let dir = namespace.path();
            if !dir.is_dir() {
                continue;
            }
            let entries = fs::read_dir(&dir).map_err(FileStoreError::io(&dir))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(name) = entry.file_name().to_str()
                    && name.starts_with('.')
                    && name.ends_with(Self::TEMP_EXTENSION)
                {
                    fs::remove_file(&path).map_err(FileStoreError::io(&path))?;
                }
            }
        }
        Ok(())
    }
}

impl LocalStore for FileStore {
    type Error = FileStoreError;

    fn insert(&mut self, namespace: &str, id: &str, value: Vec<u8>) -> Result<(), Self::Error> {
        let temp = self.stage(namespace, id, &value)?;
        self.commit(&temp, namespace, id)
    }

    fn get(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let path = self.record_path(namespace, id);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileStoreError::io(path)(e)),
        }
    }

    fn remove(&mut self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let path = self.record_path(namespace, id);
        match fs::read(&path) {
            Ok(data) => {
                fs::remove_file(&path).map_err(FileStoreError::io(&path))?;
                Ok(Some(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileStoreError::io(path)(e)),
        }
    }

    fn scan_ids(&self, namespace: &str) -> Result<Vec<String>, Self::Error> {
        let dir = self.namespace_dir(namespace);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FileStoreError::io(dir)(e)),
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(Self::filename_to_id))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Stages every entry before renaming any of them into place, so a write
    /// failure leaves the namespace untouched. Each rename is atomic on its own.
    fn insert_batch(
        &mut self,
        namespace: &str,
        entries: Vec<(String, Vec<u8>)>,
    ) -> Result<(), Self::Error> {
        let mut staged = Vec::with_capacity(entries.len());
        for (id, value) in &entries {
            match self.stage(namespace, id, value) {
                Ok(temp) => staged.push((temp, id)),
                Err(e) => {
                    for (temp, _) in staged {
                        let _ = fs::remove_file(temp);
                    }
                    return Err(e);
                }
            }
        }
        for (temp, id) in staged {
            self.commit(&temp, namespace, id)?;
        }
        Ok(())
    }
}
