//! Integration tests for the occupy and unlock sagas.

use std::time::Duration;

use async_trait::async_trait;
use common::{LockerId, LockerRecord, Occupant, Passcode};
use locker_store::{InMemoryLockerStore, JsonFileStore, LockerStore};
use remote::{InMemoryController, RawState, RemoteController};
use saga::{
    AssignmentOrchestrator, InMemoryNotifier, NotificationChannel, NotificationError,
    OccupyRequest, OccupyState, PasscodeGenerator, PasscodeNotice, RemoteOperation, Rollback,
    SagaError, UnlockState,
};
use serde_json::json;

/// Always hands out the same passcode so assertions can name it.
struct FixedPasscode(&'static str);

impl PasscodeGenerator for FixedPasscode {
    fn generate(&self, _locker_id: &LockerId, _occupant: &Occupant) -> String {
        self.0.to_string()
    }
}

type TestOrchestrator =
    AssignmentOrchestrator<InMemoryLockerStore, InMemoryController, InMemoryNotifier, FixedPasscode>;

struct TestHarness {
    orchestrator: TestOrchestrator,
    store: InMemoryLockerStore,
    controller: InMemoryController,
    notifier: InMemoryNotifier,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_store(InMemoryLockerStore::new())
    }

    fn with_store(store: InMemoryLockerStore) -> Self {
        let controller = InMemoryController::new();
        let notifier = InMemoryNotifier::new();
        let orchestrator = AssignmentOrchestrator::new(
            store.clone(),
            controller.clone(),
            notifier.clone(),
            FixedPasscode("246810"),
        );

        Self {
            orchestrator,
            store,
            controller,
            notifier,
        }
    }
}

fn j1() -> Occupant {
    Occupant::new("J1").with_email("j1@example.com")
}

fn j2() -> Occupant {
    Occupant::new("J2").with_email("j2@example.com")
}

fn id(value: &str) -> LockerId {
    LockerId::from(value)
}

#[tokio::test]
async fn test_occupy_happy_path() {
    let h = TestHarness::new();

    let report = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();

    assert_eq!(report.run.state(), OccupyState::Committed);
    assert_eq!(
        report.run.completed_steps(),
        ["reserve_local", "confirm_remote", "notify_occupant"]
    );
    assert_eq!(report.passcode.expose(), "246810");
    assert!(report.notified);

    let record = h.store.document().get(&id("101")).cloned().unwrap();
    assert!(record.occupied);
    assert_eq!(record.occupant_id.as_deref(), Some("J1"));
    assert_eq!(record.passcode.as_deref(), Some("246810"));
    assert!(h.controller.holds(&id("101")));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "j1@example.com");
    assert_eq!(sent[0].1.passcode.expose(), "246810");
    assert!(!h.store.has_live_snapshot());
}

#[tokio::test]
async fn test_occupy_without_notification_skips_step_three() {
    let h = TestHarness::new();

    let report = h
        .orchestrator
        .occupy(OccupyRequest::new("101", Occupant::new("J1")))
        .await
        .unwrap();

    assert!(!report.notified);
    assert_eq!(report.run.state(), OccupyState::Committed);
    assert_eq!(report.run.completed_steps(), ["reserve_local", "confirm_remote"]);
    assert_eq!(h.notifier.send_calls(), 0);
}

#[tokio::test]
async fn test_failed_discard_after_commit_is_reported_and_retried() {
    let h = TestHarness::new();
    h.store.set_fail_on_discard(true);

    let report = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();

    assert_eq!(report.run.state(), OccupyState::Committed);
    assert!(report.snapshot_retained);
    assert!(h.orchestrator.has_retained_snapshot().await);
    assert!(h.store.has_live_snapshot());

    h.store.set_fail_on_discard(false);
    let next = h
        .orchestrator
        .occupy(OccupyRequest::new("102", j2()))
        .await
        .unwrap();

    assert!(!next.snapshot_retained);
    assert!(!h.orchestrator.has_retained_snapshot().await);
    assert!(!h.store.has_live_snapshot());
    let view = h.orchestrator.occupancy().await;
    assert!(view.is_occupied(&id("101")));
    assert!(view.is_occupied(&id("102")));
}

#[tokio::test]
async fn test_stuck_snapshot_blocks_next_occupy_without_undoing_the_first() {
    let h = TestHarness::new();
    h.store.set_fail_on_discard(true);
    h.orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("102", j2()))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::Store(_)));
    assert_eq!(h.controller.occupy_calls(), 1);
    assert!(h.orchestrator.occupancy().await.is_occupied(&id("101")));
    assert!(h.store.document().get(&id("102")).is_none());

    h.store.set_fail_on_discard(false);
    h.orchestrator.settle_snapshots().await.unwrap();
    assert!(!h.store.has_live_snapshot());
    assert!(h.orchestrator.occupancy().await.is_occupied(&id("101")));
}

#[tokio::test]
async fn test_occupy_conflict_touches_nothing() {
    let store = InMemoryLockerStore::with_records([(
        id("101"),
        LockerRecord::occupied_by(&j1(), &Passcode::new("111111").unwrap()),
    )]);
    let h = TestHarness::with_store(store);
    let before = h.store.document();

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j2()))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::OccupiedConflict(ref locker) if locker.as_str() == "101"));
    assert_eq!(h.store.document(), before);
    assert_eq!(h.controller.occupy_calls(), 0);
    assert_eq!(h.notifier.send_calls(), 0);
    assert!(!h.store.has_live_snapshot());
}

#[tokio::test]
async fn test_reassignment_after_unlock_keeps_only_new_occupant() {
    let h = TestHarness::new();

    h.orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();
    let unlock = h.orchestrator.unlock(&id("101")).await.unwrap();
    assert_eq!(unlock.run.state(), UnlockState::Committed);

    h.orchestrator
        .occupy(OccupyRequest::new("101", j2()).with_passcode("999"))
        .await
        .unwrap();

    let document = h.store.document();
    assert_eq!(document.len(), 1);
    let record = document.get(&id("101")).unwrap();
    assert_eq!(record.occupant_id.as_deref(), Some("J2"));
    assert_eq!(record.occupant_email.as_deref(), Some("j2@example.com"));
    assert_eq!(record.passcode.as_deref(), Some("999"));
}

#[tokio::test]
async fn test_remote_rejection_rolls_back_local_record() {
    let h = TestHarness::new();
    h.controller.set_reject_occupy(true);

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    match err {
        SagaError::RemoteRejected {
            operation,
            response,
            rollback,
        } => {
            assert_eq!(operation, RemoteOperation::Occupy(id("101")));
            assert!(response.contains("\"status\":\"error\""));
            assert_eq!(rollback, Rollback::Completed);
        }
        other => panic!("expected RemoteRejected, got {other:?}"),
    }
    assert!(!h.orchestrator.occupancy().await.is_occupied(&id("101")));
    assert!(h.store.document().is_empty());
    assert_eq!(h.notifier.send_calls(), 0);
    assert!(!h.store.has_live_snapshot());
}

#[tokio::test]
async fn test_unreachable_controller_rolls_back_local_record() {
    let h = TestHarness::new();
    h.controller.set_unreachable(true);

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SagaError::RemoteUnreachable {
            rollback: Rollback::Completed,
            ..
        }
    ));
    assert!(h.store.document().is_empty());
}

#[tokio::test]
async fn test_notification_failure_withdraws_remote_and_local() {
    let h = TestHarness::new();
    h.notifier.set_fail_on_send(true);

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SagaError::NotificationFailed {
            rollback: Rollback::Completed,
            remote_withdrawn: true,
            ..
        }
    ));
    assert_eq!(h.controller.occupy_calls(), 1);
    assert_eq!(h.controller.unlock_calls(), 1);
    assert!(!h.controller.holds(&id("101")));
    assert!(h.store.document().is_empty());
}

#[tokio::test]
async fn test_failed_remote_withdrawal_is_not_escalated() {
    let h = TestHarness::new();
    h.notifier.set_fail_on_send(true);
    h.controller.set_reject_unlock(true);

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    assert_eq!(err.rollback(), Some(&Rollback::Completed));
    assert!(matches!(
        err,
        SagaError::NotificationFailed {
            remote_withdrawn: false,
            ..
        }
    ));
    assert!(h.controller.holds(&id("101")));
    assert!(h.store.document().is_empty());
}

#[tokio::test]
async fn test_failed_release_falls_back_to_snapshot() {
    let h = TestHarness::new();
    h.controller.set_reject_occupy(true);
    h.store.set_fail_on_release(true);

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    assert_eq!(err.rollback(), Some(&Rollback::Completed));
    assert_eq!(h.store.release_calls(), 1);
    assert!(h.store.document().is_empty());
    assert!(!h.store.has_live_snapshot());
}

#[tokio::test]
async fn test_failed_release_and_restore_is_incomplete() {
    let h = TestHarness::new();
    h.controller.set_reject_occupy(true);
    h.store.set_fail_on_release(true);
    h.store.set_fail_on_restore(true);

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    match err.rollback() {
        Some(Rollback::Incomplete { failures }) => {
            assert_eq!(failures.len(), 2);
            assert!(failures[0].starts_with("release:"));
            assert!(failures[1].starts_with("restore:"));
        }
        other => panic!("expected incomplete rollback, got {other:?}"),
    }
    assert!(h.store.document().get(&id("101")).is_some());
}

#[tokio::test]
async fn test_notify_without_email_fails_before_any_step() {
    let h = TestHarness::new();

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", Occupant::new("J1")).with_notification(true))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::MissingRecipient(_)));
    assert!(h.store.document().is_empty());
    assert_eq!(h.controller.occupy_calls(), 0);
    assert!(!h.store.has_live_snapshot());
}

#[tokio::test]
async fn test_supplied_passcode_wins() {
    let h = TestHarness::new();

    let report = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()).with_passcode("4321"))
        .await
        .unwrap();

    assert_eq!(report.passcode.expose(), "4321");
    assert_eq!(h.controller.state().0["lockers"]["101"]["password"], "4321");
    assert_eq!(h.controller.state().0["lockers"]["101"]["jobid"], "J1");
}

#[tokio::test]
async fn test_blank_passcode_is_refused() {
    let h = TestHarness::new();

    let err = h
        .orchestrator
        .occupy(OccupyRequest::new("101", j1()).with_passcode("  "))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::InvalidPasscode));
    assert!(h.store.document().is_empty());
}

struct SlowNotifier;

#[async_trait]
impl NotificationChannel for SlowNotifier {
    async fn send(
        &self,
        _recipient: &str,
        _notice: &PasscodeNotice,
    ) -> Result<(), NotificationError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_notification_times_out_and_rolls_back() {
    let store = InMemoryLockerStore::new();
    let controller = InMemoryController::new();
    let orchestrator = AssignmentOrchestrator::new(
        store.clone(),
        controller.clone(),
        SlowNotifier,
        FixedPasscode("1"),
    )
    .with_notify_timeout(Duration::from_millis(50));

    let err = orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap_err();

    match err {
        SagaError::NotificationFailed {
            reason, rollback, ..
        } => {
            assert!(reason.contains("timed out"));
            assert_eq!(rollback, Rollback::Completed);
        }
        other => panic!("expected NotificationFailed, got {other:?}"),
    }
    assert!(store.document().is_empty());
    assert!(!controller.holds(&id("101")));
}

#[tokio::test]
async fn test_rejected_unlock_keeps_locker_occupied() {
    let h = TestHarness::new();
    h.orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();
    h.controller.set_reject_unlock(true);

    let err = h.orchestrator.unlock(&id("101")).await.unwrap_err();

    assert!(matches!(
        err,
        SagaError::RemoteRejected {
            rollback: Rollback::NotNeeded,
            ..
        }
    ));
    assert_eq!(h.store.release_calls(), 0);
    assert!(h.orchestrator.occupancy().await.is_occupied(&id("101")));
}

#[tokio::test]
async fn test_unreachable_unlock_keeps_locker_occupied() {
    let h = TestHarness::new();
    h.orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();
    h.controller.set_unreachable(true);

    let err = h.orchestrator.unlock(&id("101")).await.unwrap_err();

    assert!(matches!(err, SagaError::RemoteUnreachable { .. }));
    assert_eq!(h.store.release_calls(), 0);
    assert!(h.orchestrator.occupancy().await.is_occupied(&id("101")));
}

#[tokio::test]
async fn test_unlock_of_unrecorded_locker_reports_not_found() {
    let h = TestHarness::new();

    let err = h.orchestrator.unlock(&id("404")).await.unwrap_err();

    assert!(matches!(err, SagaError::NotFound(ref locker) if locker.as_str() == "404"));
    assert_eq!(h.controller.unlock_calls(), 1);
}

#[tokio::test]
async fn test_sync_from_remote_replaces_local_records() {
    let h = TestHarness::new();
    h.orchestrator
        .occupy(OccupyRequest::new("999", Occupant::new("stale")))
        .await
        .unwrap();
    h.controller
        .push_full_state(&RawState(json!({
            "lockers": {
                "101": {"password": "1231", "jobid": "2510019"},
                "102": {"password": "7777", "jobid": "2510020"}
            }
        })))
        .await
        .unwrap();

    let report = h.orchestrator.sync_from_remote().await.unwrap();

    assert_eq!(report.lockers, 2);
    let document = h.store.document();
    assert!(document.get(&id("999")).is_none());
    let record = document.get(&id("101")).unwrap();
    assert!(record.occupied);
    assert_eq!(record.occupant_id.as_deref(), Some("2510019"));
    assert_eq!(record.passcode.as_deref(), Some("1231"));
    assert!(!h.store.has_live_snapshot());
}

#[tokio::test]
async fn test_sync_from_unreachable_controller_keeps_local_records() {
    let h = TestHarness::new();
    h.orchestrator
        .occupy(OccupyRequest::new("101", Occupant::new("J1")))
        .await
        .unwrap();
    let before = h.store.document();
    h.controller.set_unreachable(true);

    let err = h.orchestrator.sync_from_remote().await.unwrap_err();

    assert!(matches!(
        err,
        SagaError::RemoteUnreachable {
            operation: RemoteOperation::Pull,
            ..
        }
    ));
    assert_eq!(h.store.document(), before);
}

#[tokio::test]
async fn test_controller_document_with_firmware_keys_round_trips() {
    let h = TestHarness::new();
    h.controller
        .push_full_state(&RawState(json!({
            "lockers": {"101": {"password": "1231", "jobid": "2510019"}},
            "fw": "1.2"
        })))
        .await
        .unwrap();
    h.controller
        .send_occupy(&id("102"), &Passcode::new("7777").unwrap(), "2510020")
        .await
        .unwrap();

    let synced = h.orchestrator.sync_from_remote().await.unwrap();

    assert_eq!(synced.lockers, 2);
    let document = h.store.document();
    assert_eq!(document.get(&id("102")).unwrap().passcode.as_deref(), Some("7777"));
    assert!(document.get(&id("fw")).is_none());

    h.orchestrator.unlock(&id("101")).await.unwrap();
    let pushed = h.orchestrator.push_to_remote().await.unwrap();

    assert_eq!(pushed.lockers, 1);
    assert_eq!(
        h.controller.state().0,
        json!({
            "lockers": {"102": {"password": "7777", "jobid": "2510020"}},
            "fw": "1.2"
        })
    );
}

#[tokio::test]
async fn test_push_to_remote_overwrites_controller() {
    let store = InMemoryLockerStore::with_records([(
        id("101"),
        LockerRecord::occupied_by(&j1(), &Passcode::new("5555").unwrap()),
    )]);
    let h = TestHarness::with_store(store);
    h.controller
        .push_full_state(&RawState(json!({"lockers": {"300": {"password": "x", "jobid": "y"}}})))
        .await
        .unwrap();

    let report = h.orchestrator.push_to_remote().await.unwrap();

    assert_eq!(report.lockers, 1);
    assert_eq!(
        h.controller.state().0,
        json!({"lockers": {"101": {"password": "5555", "jobid": "J1"}}})
    );
}

#[tokio::test]
async fn test_file_store_survives_full_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("details.json"))
        .await
        .unwrap();
    let controller = InMemoryController::new();
    let orchestrator = AssignmentOrchestrator::new(
        store.clone(),
        controller.clone(),
        InMemoryNotifier::new(),
        FixedPasscode("808080"),
    );

    orchestrator
        .occupy(OccupyRequest::new("101", j1()))
        .await
        .unwrap();
    controller.set_reject_occupy(true);
    let err = orchestrator
        .occupy(OccupyRequest::new("102", j2()))
        .await
        .unwrap_err();
    assert_eq!(err.rollback(), Some(&Rollback::Completed));

    let reopened = JsonFileStore::open(dir.path().join("details.json"))
        .await
        .unwrap();
    let view = reopened.get_all().await;
    assert!(view.is_occupied(&id("101")));
    assert!(!view.is_occupied(&id("102")));
    assert!(reopened.pending_snapshot().await.unwrap().is_none());
}
