//! Single-file JSON store.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::snapshot::SnapshotContent;
use crate::{
    LockerDocument, LockerId, LockerRecord, LockerStore, Occupant, Passcode, Result, Snapshot,
    StoreError,
};

const TEMP_SUFFIX: &str = ".tmp";
const BACKUP_SUFFIX: &str = ".bak";
const COMMITTED_SUFFIX: &str = ".done";

/// Locker store persisted as one JSON document on disk.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// store file, so a crash never leaves a half-written document behind.
/// Clones share the same writer lock; all mutations within one process are
/// serialised through it.
///
/// Discarding a snapshot first renames the backup to a `.done` marker, so a
/// backup that survives a crash always belongs to an unfinished operation.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    backup_path: PathBuf,
    committed_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating the parent directory and an empty
    /// document if the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let backup_path = sibling(&path, BACKUP_SUFFIX);
        let store = Self {
            committed_path: sibling(&backup_path, COMMITTED_SUFFIX),
            backup_path,
            path,
            write_lock: Arc::new(Mutex::new(())),
        };

        if let Some(dir) = store.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(dir, e))?;
        }

        if !exists(&store.path).await? {
            tracing::info!(path = %store.path.display(), "creating empty locker store");
            write_atomic(&store.path, &LockerDocument::new().to_json_bytes()?).await?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Marker left by a discard that stopped before deleting it.
    pub fn committed_path(&self) -> &Path {
        &self.committed_path
    }

    /// Returns the backup left behind by an interrupted operation, if any.
    ///
    /// Restoring it rolls the store back to the state before that operation.
    /// A leftover commit marker is deleted, never offered for restore.
    pub async fn pending_snapshot(&self) -> Result<Option<Snapshot>> {
        if exists(&self.committed_path).await? {
            tracing::info!(
                marker = %self.committed_path.display(),
                "removing backup of a committed operation"
            );
            remove_if_exists(&self.committed_path).await?;
        }

        if exists(&self.backup_path).await? {
            tracing::warn!(
                backup = %self.backup_path.display(),
                "found backup from an interrupted operation"
            );
            return Ok(Some(Snapshot::file(self.backup_path.clone(), true)));
        }
        Ok(None)
    }

    async fn load(&self) -> Result<LockerDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => LockerDocument::parse(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LockerDocument::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    async fn persist(&self, document: &LockerDocument) -> Result<()> {
        write_atomic(&self.path, &document.to_json_bytes()?).await
    }
}

#[async_trait]
impl LockerStore for JsonFileStore {
    async fn records(&self) -> Result<LockerDocument> {
        self.load().await
    }

    #[tracing::instrument(skip(self, occupant, passcode), fields(occupant = %occupant.id))]
    async fn assign(
        &self,
        locker_id: &LockerId,
        occupant: &Occupant,
        passcode: &Passcode,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;

        if document.get(locker_id).is_some_and(LockerRecord::is_occupied) {
            return Err(StoreError::OccupiedConflict(locker_id.clone()));
        }

        document.insert(
            locker_id.clone(),
            LockerRecord::occupied_by(occupant, passcode),
        );
        self.persist(&document).await?;

        tracing::info!(%locker_id, "locker assigned");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn release(&self, locker_id: &LockerId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;

        if document.remove(locker_id).is_none() {
            return Err(StoreError::NotFound(locker_id.clone()));
        }
        self.persist(&document).await?;

        tracing::info!(%locker_id, "locker released");
        Ok(())
    }

    #[tracing::instrument(skip(self, document), fields(lockers = document.len()))]
    async fn replace_all(&self, document: LockerDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(&document).await
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let _guard = self.write_lock.lock().await;

        if exists(&self.backup_path).await? {
            return Err(StoreError::SnapshotExists(self.backup_path.clone()));
        }

        let source_existed = exists(&self.path).await?;
        if source_existed {
            // Copy under a temporary name first so a torn copy is never
            // mistaken for a recovery point.
            let staging = sibling(&self.backup_path, TEMP_SUFFIX);
            tokio::fs::copy(&self.path, &staging)
                .await
                .map_err(|e| StoreError::io(&staging, e))?;
            tokio::fs::rename(&staging, &self.backup_path)
                .await
                .map_err(|e| StoreError::io(&self.backup_path, e))?;
        }

        tracing::debug!(backup = %self.backup_path.display(), "snapshot taken");
        Ok(Snapshot::file(self.backup_path.clone(), source_existed))
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let SnapshotContent::File {
            backup_path,
            source_existed,
        } = snapshot.content
        else {
            return Err(StoreError::ForeignSnapshot);
        };
        if backup_path != self.backup_path {
            return Err(StoreError::ForeignSnapshot);
        }

        let _guard = self.write_lock.lock().await;
        if source_existed {
            tokio::fs::rename(&backup_path, &self.path)
                .await
                .map_err(|e| StoreError::io(&backup_path, e))?;
        } else {
            remove_if_exists(&self.path).await?;
        }

        tracing::info!(path = %self.path.display(), "store restored from snapshot");
        Ok(())
    }

    async fn discard(&self, snapshot: &Snapshot) -> Result<()> {
        match &snapshot.content {
            SnapshotContent::File { backup_path, .. } if *backup_path == self.backup_path => {}
            _ => return Err(StoreError::ForeignSnapshot),
        }

        let _guard = self.write_lock.lock().await;
        // The rename is the commit point; the backup can no longer be
        // mistaken for an interrupted operation once it succeeds.
        match tokio::fs::rename(&self.backup_path, &self.committed_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(&self.backup_path, e)),
        }

        if let Err(e) = remove_if_exists(&self.committed_path).await {
            tracing::warn!(error = %e, "could not delete commit marker, it is removed on next open");
        }
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("lockers.json"));
    name.push(suffix);
    path.with_file_name(name)
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = sibling(path, TEMP_SUFFIX);

    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(StoreError::io(&tmp_path, e));
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
