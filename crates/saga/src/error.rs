//! Saga error types.

use common::LockerId;
use locker_store::StoreError;
use remote::RemoteError;
use thiserror::Error;

/// What became of the local store after a failed saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// The saga failed before changing anything.
    NotNeeded,
    /// Every local change was undone.
    Completed,
    /// Some local change could not be undone. Manual reconciliation needed.
    Incomplete { failures: Vec<String> },
}

impl Rollback {
    pub fn is_complete(&self) -> bool {
        !matches!(self, Rollback::Incomplete { .. })
    }
}

impl std::fmt::Display for Rollback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rollback::NotNeeded => f.write_str("nothing to roll back"),
            Rollback::Completed => f.write_str("rolled back"),
            Rollback::Incomplete { failures } => {
                write!(f, "rollback incomplete: {}", failures.join("; "))
            }
        }
    }
}

/// The controller call a remote failure came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOperation {
    Occupy(LockerId),
    Unlock(LockerId),
    Pull,
    Push,
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteOperation::Occupy(id) => write!(f, "occupy of locker {id}"),
            RemoteOperation::Unlock(id) => write!(f, "unlock of locker {id}"),
            RemoteOperation::Pull => f.write_str("pull of controller state"),
            RemoteOperation::Push => f.write_str("push of controller state"),
        }
    }
}

/// Errors that can end a saga or a sync.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The locker already has an assignment. Nothing was changed.
    #[error("Locker {0} is already occupied")]
    OccupiedConflict(LockerId),

    /// The locker has no assignment to release.
    #[error("Locker {0} has no assignment")]
    NotFound(LockerId),

    /// The local store failed.
    #[error("Local store error: {0}")]
    Store(StoreError),

    /// The controller answered with something other than an approval.
    #[error("Controller rejected {operation} ({rollback}): {response}")]
    RemoteRejected {
        operation: RemoteOperation,
        response: String,
        rollback: Rollback,
    },

    /// The controller could not be reached within the timeout.
    #[error("Controller unreachable during {operation} ({rollback}): {reason}")]
    RemoteUnreachable {
        operation: RemoteOperation,
        reason: String,
        rollback: Rollback,
    },

    /// The passcode could not be delivered to the occupant.
    ///
    /// `remote_withdrawn` is false when the controller refused to give the
    /// locker back during compensation and may still hold it.
    #[error("Notification for locker {locker_id} failed ({rollback}): {reason}")]
    NotificationFailed {
        locker_id: LockerId,
        reason: String,
        rollback: Rollback,
        remote_withdrawn: bool,
    },

    /// A notification was requested for an occupant without an address.
    #[error("Occupant of locker {0} has no email address to notify")]
    MissingRecipient(LockerId),

    /// The caller-supplied or generated passcode was blank.
    #[error("Passcode must not be blank")]
    InvalidPasscode,

    /// The coordinator tried an illegal state change.
    #[error("Invalid saga transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl SagaError {
    pub(crate) fn remote(operation: RemoteOperation, error: RemoteError, rollback: Rollback) -> Self {
        match error {
            RemoteError::Rejected(response) => SagaError::RemoteRejected {
                operation,
                response,
                rollback,
            },
            RemoteError::Unreachable(reason) => SagaError::RemoteUnreachable {
                operation,
                reason,
                rollback,
            },
        }
    }

    /// The rollback outcome, for failures that happen after a local change.
    pub fn rollback(&self) -> Option<&Rollback> {
        match self {
            SagaError::RemoteRejected { rollback, .. }
            | SagaError::RemoteUnreachable { rollback, .. }
            | SagaError::NotificationFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// Short machine-friendly name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            SagaError::OccupiedConflict(_) => "occupied_conflict",
            SagaError::NotFound(_) => "not_found",
            SagaError::Store(_) => "store",
            SagaError::RemoteRejected { .. } => "remote_rejected",
            SagaError::RemoteUnreachable { .. } => "remote_unreachable",
            SagaError::NotificationFailed { .. } => "notification_failed",
            SagaError::MissingRecipient(_) => "missing_recipient",
            SagaError::InvalidPasscode => "invalid_passcode",
            SagaError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

impl From<StoreError> for SagaError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::OccupiedConflict(id) => SagaError::OccupiedConflict(id),
            StoreError::NotFound(id) => SagaError::NotFound(id),
            other => SagaError::Store(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
