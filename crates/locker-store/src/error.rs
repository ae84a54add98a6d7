use std::path::PathBuf;

use thiserror::Error;

use crate::LockerId;

/// Errors that can occur when reading or mutating the locker store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The locker already has an active assignment.
    #[error("Locker {0} is already occupied")]
    OccupiedConflict(LockerId),

    /// The locker has no assignment to release.
    #[error("Locker {0} has no assignment")]
    NotFound(LockerId),

    /// Reading or writing the backing file failed.
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted document does not describe a valid set of lockers.
    #[error("Malformed store document: {0}")]
    Malformed(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A backup from an earlier snapshot has not been restored or discarded.
    #[error("A snapshot is already live at {}", .0.display())]
    SnapshotExists(PathBuf),

    /// The snapshot was taken from a different store.
    #[error("Snapshot does not belong to this store")]
    ForeignSnapshot,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
