use std::{fmt::Display, path::PathBuf};

/// Errors that can occur during file storage operations.
#[derive(Debug)]
pub enum FileStoreError {
    /// Reading, writing or renaming a file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FileStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl Display for FileStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "IO error at {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for FileStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}
