//! Saga state machines.
//!
//! Both flows are pure transition tables. The coordinator asks them before
//! every move, so any sequencing bug surfaces as
//! [`SagaError::InvalidTransition`](crate::SagaError::InvalidTransition)
//! instead of a silently inconsistent run.

use serde::{Deserialize, Serialize};

/// Which saga is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    Occupy,
    Unlock,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Occupy => "occupy",
            Flow::Unlock => "unlock",
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common behaviour of the per-flow state enums.
pub trait FlowState: Copy + Eq + std::fmt::Debug + Default + Send + Sync + 'static {
    /// The flow this state machine drives.
    const FLOW: Flow;

    fn can_transition_to(self, next: Self) -> bool;

    fn is_terminal(self) -> bool;

    fn as_str(self) -> &'static str;
}

/// States of the occupy saga.
///
/// ```text
/// Idle ──► Reserved ──► RemoteConfirmed ──┬──► Notified ──► Committed
///  │          │               │           └──────────────► Committed
///  │          └───────────────┴──────┬──────────┘
///  │                                 ▼
///  └──► Aborted              Compensating ──► RolledBack
/// ```
///
/// `RemoteConfirmed ──► Committed` is the no-notification variant. A failure
/// while still `Idle` has nothing to undo and ends in `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OccupyState {
    #[default]
    Idle,
    Reserved,
    RemoteConfirmed,
    Notified,
    Committed,
    Compensating,
    RolledBack,
    Aborted,
}

impl FlowState for OccupyState {
    const FLOW: Flow = Flow::Occupy;

    fn can_transition_to(self, next: Self) -> bool {
        use OccupyState::*;
        matches!(
            (self, next),
            (Idle, Reserved)
                | (Idle, Aborted)
                | (Reserved, RemoteConfirmed)
                | (RemoteConfirmed, Notified)
                | (RemoteConfirmed, Committed)
                | (Notified, Committed)
                | (Reserved | RemoteConfirmed | Notified, Compensating)
                | (Compensating, RolledBack)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            OccupyState::Committed | OccupyState::RolledBack | OccupyState::Aborted
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            OccupyState::Idle => "Idle",
            OccupyState::Reserved => "Reserved",
            OccupyState::RemoteConfirmed => "RemoteConfirmed",
            OccupyState::Notified => "Notified",
            OccupyState::Committed => "Committed",
            OccupyState::Compensating => "Compensating",
            OccupyState::RolledBack => "RolledBack",
            OccupyState::Aborted => "Aborted",
        }
    }
}

/// States of the unlock saga.
///
/// ```text
/// Idle ──► RemoteUnlockRequested ──► LocalReleased ──► Committed
///  │               │
///  └───────────────┴──► Failed
/// ```
///
/// There is no compensation: the local record is only released after the
/// controller has approved the unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UnlockState {
    #[default]
    Idle,
    RemoteUnlockRequested,
    LocalReleased,
    Committed,
    Failed,
}

impl FlowState for UnlockState {
    const FLOW: Flow = Flow::Unlock;

    fn can_transition_to(self, next: Self) -> bool {
        use UnlockState::*;
        matches!(
            (self, next),
            (Idle, RemoteUnlockRequested)
                | (RemoteUnlockRequested, LocalReleased)
                | (LocalReleased, Committed)
                | (Idle | RemoteUnlockRequested, Failed)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(self, UnlockState::Committed | UnlockState::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            UnlockState::Idle => "Idle",
            UnlockState::RemoteUnlockRequested => "RemoteUnlockRequested",
            UnlockState::LocalReleased => "LocalReleased",
            UnlockState::Committed => "Committed",
            UnlockState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OccupyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for UnlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_states_are_idle() {
        assert_eq!(OccupyState::default(), OccupyState::Idle);
        assert_eq!(UnlockState::default(), UnlockState::Idle);
    }

    #[test]
    fn test_occupy_happy_path_is_allowed() {
        use OccupyState::*;
        let path = [Idle, Reserved, RemoteConfirmed, Notified, Committed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(RemoteConfirmed.can_transition_to(Committed));
    }

    #[test]
    fn test_occupy_compensation_edges() {
        use OccupyState::*;
        assert!(!Idle.can_transition_to(Compensating));
        assert!(Reserved.can_transition_to(Compensating));
        assert!(RemoteConfirmed.can_transition_to(Compensating));
        assert!(Notified.can_transition_to(Compensating));
        assert!(!Committed.can_transition_to(Compensating));
        assert!(Compensating.can_transition_to(RolledBack));
        assert!(!Compensating.can_transition_to(Committed));
    }

    #[test]
    fn test_occupy_cannot_skip_steps() {
        use OccupyState::*;
        assert!(!Idle.can_transition_to(RemoteConfirmed));
        assert!(!Reserved.can_transition_to(Notified));
        assert!(!Reserved.can_transition_to(Committed));
        assert!(!Reserved.can_transition_to(Aborted));
    }

    #[test]
    fn test_unlock_transitions() {
        use UnlockState::*;
        assert!(Idle.can_transition_to(RemoteUnlockRequested));
        assert!(RemoteUnlockRequested.can_transition_to(LocalReleased));
        assert!(LocalReleased.can_transition_to(Committed));
        assert!(Idle.can_transition_to(Failed));
        assert!(RemoteUnlockRequested.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(LocalReleased));
        assert!(!LocalReleased.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(OccupyState::Committed.is_terminal());
        assert!(OccupyState::RolledBack.is_terminal());
        assert!(OccupyState::Aborted.is_terminal());
        assert!(!OccupyState::Compensating.is_terminal());
        assert!(UnlockState::Committed.is_terminal());
        assert!(UnlockState::Failed.is_terminal());
        assert!(!UnlockState::LocalReleased.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OccupyState::RemoteConfirmed.to_string(), "RemoteConfirmed");
        assert_eq!(UnlockState::RemoteUnlockRequested.to_string(), "RemoteUnlockRequested");
        assert_eq!(Flow::Occupy.to_string(), "occupy");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&OccupyState::Compensating).unwrap();
        let state: OccupyState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, OccupyState::Compensating);
    }
}
