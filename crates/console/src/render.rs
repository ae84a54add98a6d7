//! Operator-facing text for views and saga outcomes.

use std::fmt::Write;

use common::{LockerId, LockerRecord};
use locker_store::OccupancyView;
use saga::{OccupyReport, Rollback, SagaError, SyncReport, UnlockReport};

pub fn status(view: &OccupancyView) -> String {
    let mut out = String::new();
    if let Some(diagnostic) = &view.diagnostic {
        let _ = writeln!(out, "warning: could not read the store ({diagnostic})");
    }

    let occupied: Vec<&str> = view
        .lockers
        .iter()
        .filter(|(_, occupied)| **occupied)
        .map(|(id, _)| id.as_str())
        .collect();

    if occupied.is_empty() {
        out.push_str("No lockers occupied.");
    } else {
        let _ = write!(
            out,
            "{} occupied: {}",
            occupied.len(),
            occupied.join(", ")
        );
    }
    out
}

/// One locker's assignment. Passcodes stay hidden.
pub fn record(locker_id: &LockerId, record: Option<&LockerRecord>) -> String {
    match record.filter(|r| r.is_occupied()) {
        None => format!("Locker {locker_id} is free."),
        Some(record) => {
            let occupant = record.occupant_id.as_deref().unwrap_or("unknown");
            match record.occupant_email.as_deref() {
                Some(email) => format!("Locker {locker_id} is occupied by {occupant} <{email}>."),
                None => format!("Locker {locker_id} is occupied by {occupant}."),
            }
        }
    }
}

const SNAPSHOT_RETAINED: &str = "warning: the store backup could not be removed. \
It is retried before the next change and on quit; restarting before it is gone undoes this change.";

pub fn occupied(report: &OccupyReport) -> String {
    let locker_id = report.run.locker_id();
    let text = if report.notified {
        format!("Locker {locker_id} occupied. Passcode sent to the occupant.")
    } else {
        format!(
            "Locker {locker_id} occupied. Passcode: {}",
            report.passcode.expose()
        )
    };
    with_snapshot_warning(text, report.snapshot_retained)
}

pub fn unlocked(report: &UnlockReport) -> String {
    format!("Locker {} unlocked and released.", report.run.locker_id())
}

pub fn synced(report: &SyncReport) -> String {
    let text = format!(
        "Local records replaced from the controller ({} occupied).",
        report.lockers
    );
    with_snapshot_warning(text, report.snapshot_retained)
}

pub fn pushed(report: &SyncReport) -> String {
    format!(
        "Controller state replaced from local records ({} occupied).",
        report.lockers
    )
}

/// Explains a failed command, including what happened to local state.
pub fn describe_error(error: &SagaError) -> String {
    let summary = match error {
        SagaError::OccupiedConflict(id) => {
            format!("Locker {id} is already occupied. Nothing was changed.")
        }
        SagaError::NotFound(id) => format!("Locker {id} has no assignment."),
        SagaError::RemoteRejected {
            operation,
            response,
            ..
        } => format!("The controller refused the {operation}: {response}"),
        SagaError::RemoteUnreachable {
            operation, reason, ..
        } => format!("The controller could not be reached for the {operation}: {reason}"),
        SagaError::NotificationFailed {
            locker_id,
            reason,
            remote_withdrawn,
            ..
        } => {
            let mut text =
                format!("The passcode for locker {locker_id} could not be delivered: {reason}");
            if !remote_withdrawn {
                text.push_str("\nThe controller may still hold the locker; unlock it there.");
            }
            text
        }
        SagaError::MissingRecipient(id) => format!(
            "No email address given for locker {id}. Add one or use --no-notify."
        ),
        SagaError::InvalidPasscode => "The passcode must not be blank.".to_string(),
        SagaError::Store(e) => format!("The local store failed: {e}"),
        SagaError::InvalidTransition { .. } => format!("Internal error: {error}"),
    };

    match error.rollback() {
        None => summary,
        Some(rollback) => format!("{summary}\n{}", rollback_note(rollback)),
    }
}

/// Shown when a snapshot outlives the operation it guarded.
pub fn snapshot_retained() -> &'static str {
    SNAPSHOT_RETAINED
}

fn with_snapshot_warning(text: String, retained: bool) -> String {
    if retained {
        format!("{text}\n{SNAPSHOT_RETAINED}")
    } else {
        text
    }
}

fn rollback_note(rollback: &Rollback) -> String {
    match rollback {
        Rollback::NotNeeded => "No changes were made.".to_string(),
        Rollback::Completed => "The assignment was rolled back.".to_string(),
        Rollback::Incomplete { failures } => format!(
            "Rollback incomplete, the local store needs manual reconciliation: {}",
            failures.join("; ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Occupant, Passcode};
    use saga::RemoteOperation;

    #[test]
    fn test_status_lists_occupied_only() {
        let mut view = OccupancyView::default();
        view.lockers.insert("101".into(), true);
        view.lockers.insert("102".into(), false);
        view.lockers.insert("103".into(), true);

        assert_eq!(status(&view), "2 occupied: 101, 103");
        assert_eq!(status(&OccupancyView::default()), "No lockers occupied.");
    }

    #[test]
    fn test_status_shows_diagnostic() {
        let view = OccupancyView {
            lockers: Default::default(),
            diagnostic: Some("bad json".to_string()),
        };

        let text = status(&view);
        assert!(text.starts_with("warning: could not read the store (bad json)"));
        assert!(text.ends_with("No lockers occupied."));
    }

    #[test]
    fn test_record_hides_passcode() {
        let occupant = Occupant::new("J1").with_email("j1@example.com");
        let rec = LockerRecord::occupied_by(&occupant, &Passcode::new("999111").unwrap());

        let text = record(&"4".into(), Some(&rec));
        assert_eq!(text, "Locker 4 is occupied by J1 <j1@example.com>.");
        assert!(!text.contains("999111"));
        assert_eq!(record(&"5".into(), None), "Locker 5 is free.");
    }

    #[test]
    fn test_remote_rejection_with_completed_rollback() {
        let err = SagaError::RemoteRejected {
            operation: RemoteOperation::Occupy("7".into()),
            response: "Unknown locker 7".to_string(),
            rollback: Rollback::Completed,
        };

        assert_eq!(
            describe_error(&err),
            "The controller refused the occupy of locker 7: Unknown locker 7\n\
             The assignment was rolled back."
        );
    }

    #[test]
    fn test_incomplete_rollback_asks_for_reconciliation() {
        let err = SagaError::NotificationFailed {
            locker_id: "7".into(),
            reason: "timed out".to_string(),
            rollback: Rollback::Incomplete {
                failures: vec!["release: io".to_string()],
            },
            remote_withdrawn: true,
        };

        let text = describe_error(&err);
        assert!(text.contains("could not be delivered: timed out"));
        assert!(text.contains("manual reconciliation: release: io"));
        assert!(!text.contains("may still hold"));
    }

    #[test]
    fn test_failed_withdrawal_is_pointed_out() {
        let err = SagaError::NotificationFailed {
            locker_id: "7".into(),
            reason: "mailbox full".to_string(),
            rollback: Rollback::Completed,
            remote_withdrawn: false,
        };

        assert_eq!(
            describe_error(&err),
            "The passcode for locker 7 could not be delivered: mailbox full\n\
             The controller may still hold the locker; unlock it there.\n\
             The assignment was rolled back."
        );
    }

    #[test]
    fn test_retained_snapshot_is_warned_about() {
        let synced_ok = SyncReport {
            lockers: 3,
            snapshot_retained: false,
        };
        let synced_stuck = SyncReport {
            snapshot_retained: true,
            ..synced_ok
        };

        assert!(!synced(&synced_ok).contains("warning"));
        assert_eq!(
            synced(&synced_stuck),
            format!(
                "Local records replaced from the controller (3 occupied).\n{}",
                snapshot_retained()
            )
        );
    }

    #[test]
    fn test_conflict_has_no_rollback_note() {
        let text = describe_error(&SagaError::OccupiedConflict("3".into()));
        assert_eq!(text, "Locker 3 is already occupied. Nothing was changed.");
    }
}
