use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::snapshot::SnapshotContent;
use crate::{
    LockerDocument, LockerId, LockerRecord, LockerStore, Occupant, Passcode, Result, Snapshot,
    StoreError,
};

const MEMORY_PATH: &str = "<memory>";

#[derive(Debug, Default)]
struct InMemoryState {
    document: LockerDocument,
    snapshot_live: bool,
    fail_on_assign: bool,
    fail_on_release: bool,
    fail_on_restore: bool,
    fail_on_discard: bool,
    release_calls: usize,
}

/// In-memory locker store for testing.
///
/// Clones share state, so a test can keep a handle while the orchestrator
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockerStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryLockerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = (LockerId, LockerRecord)>) -> Self {
        let store = Self::new();
        store.write().document = records.into_iter().collect();
        store
    }

    /// Makes subsequent `assign` calls fail with an I/O error.
    pub fn set_fail_on_assign(&self, fail: bool) {
        self.write().fail_on_assign = fail;
    }

    /// Makes subsequent `release` calls fail with an I/O error.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.write().fail_on_release = fail;
    }

    /// Makes subsequent `restore` calls fail with an I/O error.
    pub fn set_fail_on_restore(&self, fail: bool) {
        self.write().fail_on_restore = fail;
    }

    /// Makes subsequent `discard` calls fail with an I/O error. The snapshot
    /// stays live while they do.
    pub fn set_fail_on_discard(&self, fail: bool) {
        self.write().fail_on_discard = fail;
    }

    /// Number of `release` calls seen, including failed ones.
    pub fn release_calls(&self) -> usize {
        self.read().release_calls
    }

    /// Returns true while a snapshot has been taken but not restored or discarded.
    pub fn has_live_snapshot(&self) -> bool {
        self.read().snapshot_live
    }

    /// Returns a copy of the current document.
    pub fn document(&self) -> LockerDocument {
        self.read().document.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected(operation: &str) -> StoreError {
    StoreError::io(
        MEMORY_PATH,
        std::io::Error::other(format!("injected {operation} failure")),
    )
}

#[async_trait]
impl LockerStore for InMemoryLockerStore {
    async fn records(&self) -> Result<LockerDocument> {
        Ok(self.read().document.clone())
    }

    async fn assign(
        &self,
        locker_id: &LockerId,
        occupant: &Occupant,
        passcode: &Passcode,
    ) -> Result<()> {
        let mut state = self.write();
        if state.fail_on_assign {
            return Err(injected("assign"));
        }
        if state
            .document
            .get(locker_id)
            .is_some_and(LockerRecord::is_occupied)
        {
            return Err(StoreError::OccupiedConflict(locker_id.clone()));
        }
        state.document.insert(
            locker_id.clone(),
            LockerRecord::occupied_by(occupant, passcode),
        );
        Ok(())
    }

    async fn release(&self, locker_id: &LockerId) -> Result<()> {
        let mut state = self.write();
        state.release_calls += 1;
        if state.fail_on_release {
            return Err(injected("release"));
        }
        state
            .document
            .remove(locker_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(locker_id.clone()))
    }

    async fn replace_all(&self, document: LockerDocument) -> Result<()> {
        self.write().document = document;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let mut state = self.write();
        if state.snapshot_live {
            return Err(StoreError::SnapshotExists(MEMORY_PATH.into()));
        }
        state.snapshot_live = true;
        Ok(Snapshot::memory(state.document.clone()))
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let SnapshotContent::Memory(document) = snapshot.content else {
            return Err(StoreError::ForeignSnapshot);
        };
        let mut state = self.write();
        if state.fail_on_restore {
            return Err(injected("restore"));
        }
        state.document = document;
        state.snapshot_live = false;
        Ok(())
    }

    async fn discard(&self, snapshot: &Snapshot) -> Result<()> {
        let SnapshotContent::Memory(_) = &snapshot.content else {
            return Err(StoreError::ForeignSnapshot);
        };
        let mut state = self.write();
        if state.fail_on_discard {
            return Err(injected("discard"));
        }
        state.snapshot_live = false;
        Ok(())
    }
}
