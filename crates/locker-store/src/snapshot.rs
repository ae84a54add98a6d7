use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::LockerDocument;

/// A point-in-time copy of a store, used as the recovery point while a
/// multi-step operation is in flight.
///
/// A snapshot stays live until [`LockerStore::restore`](crate::LockerStore::restore)
/// consumes it or [`LockerStore::discard`](crate::LockerStore::discard)
/// succeeds; a store holds at most one live snapshot.
#[derive(Debug)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    pub(crate) content: SnapshotContent,
}

#[derive(Debug)]
pub(crate) enum SnapshotContent {
    /// Backup file next to the store file. `source_existed` is false when the
    /// store file was absent, in which case restoring removes it again.
    File {
        backup_path: PathBuf,
        source_existed: bool,
    },
    /// Copy of an in-memory store.
    Memory(LockerDocument),
}

impl Snapshot {
    pub(crate) fn file(backup_path: PathBuf, source_existed: bool) -> Self {
        Self {
            taken_at: Utc::now(),
            content: SnapshotContent::File {
                backup_path,
                source_existed,
            },
        }
    }

    pub(crate) fn memory(document: LockerDocument) -> Self {
        Self {
            taken_at: Utc::now(),
            content: SnapshotContent::Memory(document),
        }
    }

    /// When the snapshot was taken.
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// The backup file holding the snapshot, for file-backed stores.
    pub fn backup_path(&self) -> Option<&Path> {
        match &self.content {
            SnapshotContent::File { backup_path, .. } => Some(backup_path),
            SnapshotContent::Memory(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_snapshot_exposes_backup_path() {
        let snapshot = Snapshot::file(PathBuf::from("/tmp/details.json.bak"), true);
        assert_eq!(
            snapshot.backup_path(),
            Some(Path::new("/tmp/details.json.bak"))
        );
        assert!(snapshot.taken_at() <= Utc::now());
    }

    #[test]
    fn memory_snapshot_has_no_backup_path() {
        let snapshot = Snapshot::memory(LockerDocument::new());
        assert!(snapshot.backup_path().is_none());
    }
}
