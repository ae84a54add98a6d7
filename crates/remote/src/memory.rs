use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::{LockerId, Passcode};

use crate::transport::RemoteController;
use crate::wire::{ActionResponse, Approved, ControllerDocument, RawState};
use crate::{RemoteError, Result};

#[derive(Debug)]
struct InMemoryControllerState {
    state: RawState,
    reject_occupy: bool,
    reject_unlock: bool,
    unreachable: bool,
    occupy_calls: usize,
    unlock_calls: usize,
    pushes: usize,
}

impl Default for InMemoryControllerState {
    fn default() -> Self {
        Self {
            state: RawState::empty(),
            reject_occupy: false,
            reject_unlock: false,
            unreachable: false,
            occupy_calls: 0,
            unlock_calls: 0,
            pushes: 0,
        }
    }
}

/// In-memory lock controller for testing and hardware-free runs.
///
/// Behaves like the firmware: occupy stores the password and job id, unlock
/// drops the entry. Occupying a locker it already holds is rejected.
#[derive(Debug, Clone, Default)]
pub struct InMemoryController {
    inner: Arc<RwLock<InMemoryControllerState>>,
}

impl InMemoryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a controller that starts out holding `state`.
    pub fn with_state(state: RawState) -> Self {
        let controller = Self::new();
        controller.write().state = state;
        controller
    }

    /// Configures the controller to reject occupy signals.
    pub fn set_reject_occupy(&self, reject: bool) {
        self.write().reject_occupy = reject;
    }

    /// Configures the controller to reject unlock signals.
    pub fn set_reject_unlock(&self, reject: bool) {
        self.write().reject_unlock = reject;
    }

    /// Makes every call fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.write().unreachable = unreachable;
    }

    /// Number of occupy signals received, approved or not.
    pub fn occupy_calls(&self) -> usize {
        self.read().occupy_calls
    }

    /// Number of unlock signals received, approved or not.
    pub fn unlock_calls(&self) -> usize {
        self.read().unlock_calls
    }

    /// Number of successful full-state pushes.
    pub fn pushes(&self) -> usize {
        self.read().pushes
    }

    /// Returns the controller's current document.
    pub fn state(&self) -> RawState {
        self.read().state.clone()
    }

    /// Returns true if the controller holds `locker_id`.
    pub fn holds(&self, locker_id: &LockerId) -> bool {
        ControllerDocument::from_raw(&self.read().state)
            .map(|document| document.contains(locker_id))
            .unwrap_or(false)
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryControllerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryControllerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rejection(message: &str) -> RemoteError {
    let body = serde_json::to_string(&ActionResponse::error(message)).unwrap_or_default();
    RemoteError::Rejected(body)
}

fn unreachable() -> RemoteError {
    RemoteError::Unreachable("in-memory controller is offline".to_string())
}

#[async_trait]
impl RemoteController for InMemoryController {
    async fn send_occupy(
        &self,
        locker_id: &LockerId,
        passcode: &Passcode,
        occupant_id: &str,
    ) -> Result<Approved> {
        let mut inner = self.write();
        inner.occupy_calls += 1;
        if inner.unreachable {
            return Err(unreachable());
        }
        if inner.reject_occupy {
            return Err(rejection("occupy refused"));
        }

        let mut document = ControllerDocument::from_raw(&inner.state)?;
        if document.contains(locker_id) {
            return Err(rejection("locker already occupied"));
        }
        document.insert(locker_id, passcode.expose(), occupant_id);
        inner.state = document.into_raw();

        Ok(Approved::from_response(&ActionResponse::approved("occupied")))
    }

    async fn send_unlock(&self, locker_id: &LockerId) -> Result<Approved> {
        let mut inner = self.write();
        inner.unlock_calls += 1;
        if inner.unreachable {
            return Err(unreachable());
        }
        if inner.reject_unlock {
            return Err(rejection("unlock refused"));
        }

        let mut document = ControllerDocument::from_raw(&inner.state)?;
        document.remove(locker_id);
        inner.state = document.into_raw();

        Ok(Approved::from_response(&ActionResponse::approved("unlocked")))
    }

    async fn pull_full_state(&self) -> Result<RawState> {
        let inner = self.read();
        if inner.unreachable {
            return Err(unreachable());
        }
        Ok(inner.state.clone())
    }

    async fn push_full_state(&self, state: &RawState) -> Result<()> {
        let mut inner = self.write();
        if inner.unreachable {
            return Err(unreachable());
        }
        inner.state = state.clone();
        inner.pushes += 1;
        Ok(())
    }
}
