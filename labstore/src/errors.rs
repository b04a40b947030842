use thiserror::Error;

use crate::RecordKind;

/// Why the remote store refused an otherwise well-delivered request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// A record with this id already exists in the collection.
    #[error("duplicate id {0}")]
    DuplicateId(String),
    /// The payload failed validation.
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Failures reported by a [`RemoteStore`](crate::RemoteStore).
///
/// Only [`RemoteError::Unavailable`] is a connectivity failure; the other two are
/// answers from a reachable store and are never retried elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network failure or timeout.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("{kind} record {id} not found in remote store")]
    NotFound { kind: RecordKind, id: String },
    #[error("remote store rejected the request: {0}")]
    Rejected(Rejection),
}

impl RemoteError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A batch update that stopped partway.
///
/// `applied` counts the leading patches of the batch that were persisted
/// before `error` occurred. Atomic stores always report `applied == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("batch failed after {applied} applied updates: {error}")]
pub struct BatchError {
    pub applied: usize,
    pub error: RemoteError,
}

/// Failures reported by the [`LocalAdapter`](crate::LocalAdapter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalError {
    #[error("{kind} record {id} not found in local store")]
    NotFound { kind: RecordKind, id: String },
    /// The persisted payload of a single record could not be decoded.
    #[error("{kind} record {id} is corrupt in local store: {reason}")]
    StorageCorrupt {
        kind: RecordKind,
        id: String,
        reason: String,
    },
    /// A partial update does not fit the record's shape.
    #[error("invalid update for {kind} record {id}: {reason}")]
    Invalid {
        kind: RecordKind,
        id: String,
        reason: String,
    },
    /// The underlying persistent medium failed.
    #[error("local storage backend failed: {0}")]
    Backend(String),
}

/// Errors surfaced to callers of the [`FailoverRouter`](crate::FailoverRouter).
///
/// Connectivity failures never appear here on their own: they are absorbed by
/// falling back to the local store, and only reach the caller together with
/// the local failure that followed them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{kind} record {id} does not exist")]
    NotFound { kind: RecordKind, id: String },
    #[error(transparent)]
    Rejected(Rejection),
    #[error("{kind} record {id} is corrupt in local store: {reason}")]
    StorageCorrupt {
        kind: RecordKind,
        id: String,
        reason: String,
    },
    #[error("local storage backend failed: {0}")]
    LocalStorage(String),
    /// Neither store completed the operation.
    #[error("remote store unavailable ({remote}) and local fallback failed ({local})")]
    BothStoresFailed { remote: String, local: LocalError },
}

impl From<LocalError> for Error {
    fn from(e: LocalError) -> Self {
        match e {
            LocalError::NotFound { kind, id } => Error::NotFound { kind, id },
            LocalError::StorageCorrupt { kind, id, reason } => {
                Error::StorageCorrupt { kind, id, reason }
            }
            LocalError::Invalid { reason, .. } => Error::Rejected(Rejection::Invalid(reason)),
            LocalError::Backend(reason) => Error::LocalStorage(reason),
        }
    }
}

impl Error {
    /// Converts a remote failure that is not a connectivity failure.
    ///
    /// Returns the original error back when it is [`RemoteError::Unavailable`],
    /// which callers must handle by falling back instead.
    pub(crate) fn from_remote(e: RemoteError) -> Result<Self, String> {
        match e {
            RemoteError::Unavailable(reason) => Err(reason),
            RemoteError::NotFound { kind, id } => Ok(Error::NotFound { kind, id }),
            RemoteError::Rejected(rejection) => Ok(Error::Rejected(rejection)),
        }
    }
}

/// Result alias used throughout the router.
pub type Result<T, E = Error> = core::result::Result<T, E>;
