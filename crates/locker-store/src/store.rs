use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{LockerDocument, LockerId, LockerRecord, Occupant, Passcode, Result, Snapshot};

/// Occupancy as seen by the operator, plus any problem hit while reading.
///
/// Reading occupancy never fails: an unreadable store is reported as empty
/// and the reason is carried in `diagnostic`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyView {
    pub lockers: BTreeMap<LockerId, bool>,
    pub diagnostic: Option<String>,
}

impl OccupancyView {
    /// Lockers absent from the view are free.
    pub fn is_occupied(&self, locker_id: &LockerId) -> bool {
        self.lockers.get(locker_id).copied().unwrap_or(false)
    }
}

/// The authoritative local record of locker assignments.
///
/// Every mutation is all-or-nothing from the caller's perspective.
#[async_trait]
pub trait LockerStore: Send + Sync {
    /// Returns every assignment currently persisted.
    async fn records(&self) -> Result<LockerDocument>;

    /// Returns the assignment for one locker, if any.
    async fn get(&self, locker_id: &LockerId) -> Result<Option<LockerRecord>> {
        Ok(self.records().await?.get(locker_id).cloned())
    }

    /// Returns the occupancy flag of every known locker.
    async fn get_all(&self) -> OccupancyView {
        match self.records().await {
            Ok(document) => OccupancyView {
                lockers: document.occupancy(),
                diagnostic: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not read locker store, reporting no occupancy");
                OccupancyView {
                    lockers: BTreeMap::new(),
                    diagnostic: Some(e.to_string()),
                }
            }
        }
    }

    /// Assigns a free locker.
    ///
    /// Fails with `OccupiedConflict` without touching the store if the
    /// locker is already occupied.
    async fn assign(
        &self,
        locker_id: &LockerId,
        occupant: &Occupant,
        passcode: &Passcode,
    ) -> Result<()>;

    /// Deletes a locker's assignment. Fails with `NotFound` if it has none.
    async fn release(&self, locker_id: &LockerId) -> Result<()>;

    /// Replaces every assignment with `document`.
    async fn replace_all(&self, document: LockerDocument) -> Result<()>;

    /// Captures the whole store as a recovery point.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Puts the store back exactly as it was when `snapshot` was taken.
    async fn restore(&self, snapshot: Snapshot) -> Result<()>;

    /// Drops a snapshot that is no longer needed, marking the work done
    /// since it as committed.
    ///
    /// On failure the snapshot is still live and the call may be retried.
    async fn discard(&self, snapshot: &Snapshot) -> Result<()>;
}
