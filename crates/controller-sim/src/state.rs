//! In-memory controller state shared by all handlers.

use std::collections::BTreeSet;
use std::time::Duration;

use common::LockerId;
use remote::{ControllerDocument, RawState};
use tokio::sync::RwLock;

use crate::error::SimError;

/// The simulated controller: its document, which lockers exist and how slow
/// it answers.
#[derive(Debug)]
pub struct SimState {
    document: RwLock<RawState>,
    known_lockers: BTreeSet<String>,
    delay: Duration,
}

impl Default for SimState {
    fn default() -> Self {
        Self::new(Vec::<String>::new(), Duration::ZERO)
    }
}

impl SimState {
    /// An empty set of known lockers accepts any locker id.
    pub fn new(known_lockers: impl IntoIterator<Item = String>, delay: Duration) -> Self {
        Self {
            document: RwLock::new(RawState::empty()),
            known_lockers: known_lockers.into_iter().collect(),
            delay,
        }
    }

    /// Starts the simulator holding `state`.
    pub fn with_document(self, state: RawState) -> Self {
        Self {
            document: RwLock::new(state),
            ..self
        }
    }

    pub fn is_known(&self, locker: &str) -> bool {
        self.known_lockers.is_empty() || self.known_lockers.contains(locker)
    }

    /// Sleeps for the configured response latency.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Number of lockers in the document; zero if it has no `lockers` map.
    pub async fn occupied_count(&self) -> usize {
        self.document
            .read()
            .await
            .0
            .get("lockers")
            .and_then(serde_json::Value::as_object)
            .map_or(0, serde_json::Map::len)
    }

    pub fn known_count(&self) -> Option<usize> {
        (!self.known_lockers.is_empty()).then_some(self.known_lockers.len())
    }

    pub async fn document(&self) -> RawState {
        self.document.read().await.clone()
    }

    pub async fn replace(&self, state: RawState) {
        *self.document.write().await = state;
    }

    /// Locks `locker` under `password` for `jobid`.
    pub async fn occupy(&self, locker: &str, password: &str, jobid: &str) -> Result<(), SimError> {
        if !self.is_known(locker) {
            return Err(SimError::UnknownLocker(locker.to_string()));
        }

        let mut guard = self.document.write().await;
        let mut document = editable(&guard)?;
        let locker_id = LockerId::from(locker);
        if document.contains(&locker_id) {
            return Err(SimError::AlreadyOccupied(locker.to_string()));
        }
        document.insert(&locker_id, password, jobid);
        *guard = document.into_raw();
        Ok(())
    }

    /// Unlocks `locker`. Unlocking a free locker succeeds.
    pub async fn unlock(&self, locker: &str) -> Result<(), SimError> {
        if !self.is_known(locker) {
            return Err(SimError::UnknownLocker(locker.to_string()));
        }

        let mut guard = self.document.write().await;
        let mut document = editable(&guard)?;
        document.remove(&LockerId::from(locker));
        *guard = document.into_raw();
        Ok(())
    }
}

fn editable(state: &RawState) -> Result<ControllerDocument, SimError> {
    ControllerDocument::from_raw(state).map_err(|e| SimError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn occupy_and_unlock() {
        let state = SimState::default();

        state.occupy("101", "1231", "2510019").await.unwrap();
        let document = state.document().await;
        assert_eq!(document.0["lockers"]["101"]["password"], "1231");
        assert_eq!(document.0["lockers"]["101"]["jobid"], "2510019");

        state.unlock("101").await.unwrap();
        assert_eq!(state.document().await, RawState::empty());
    }

    #[tokio::test]
    async fn occupied_locker_is_refused() {
        let state = SimState::default();
        state.occupy("101", "1", "a").await.unwrap();

        let err = state.occupy("101", "2", "b").await.unwrap_err();
        assert_eq!(err, SimError::AlreadyOccupied("101".to_string()));
    }

    #[tokio::test]
    async fn unknown_locker_is_refused_when_lockers_are_listed() {
        let state = SimState::new(["101".to_string(), "102".to_string()], Duration::ZERO);

        assert!(state.is_known("102"));
        assert_eq!(
            state.unlock("999").await.unwrap_err(),
            SimError::UnknownLocker("999".to_string())
        );
    }
}
