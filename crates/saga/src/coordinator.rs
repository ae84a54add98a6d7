//! Orchestrates the occupy and unlock sagas.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use common::{LockerId, Occupant, Passcode};
use locker_store::{LockerDocument, LockerStore, OccupancyView, Snapshot};
use remote::{RawState, RemoteController};

use crate::error::{RemoteOperation, Result, Rollback, SagaError};
use crate::passcode::PasscodeGenerator;
use crate::run::SagaRun;
use crate::services::notification::{NotificationChannel, NotificationError, PasscodeNotice};
use crate::state::{FlowState, OccupyState, UnlockState};
use crate::steps::{
    STEP_CONFIRM_REMOTE, STEP_NOTIFY, STEP_PREPARE, STEP_RELEASE_LOCAL, STEP_REQUEST_UNLOCK,
    STEP_RESERVE_LOCAL, STEP_RESTORE_SNAPSHOT,
};

/// Upper bound on one notification attempt unless configured otherwise.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(120);

/// A request to assign a locker.
#[derive(Debug, Clone)]
pub struct OccupyRequest {
    pub locker_id: LockerId,
    pub occupant: Occupant,
    /// Used verbatim when set; otherwise the generator picks one.
    pub passcode: Option<String>,
    /// Whether to send the passcode notice. Requires an occupant email.
    pub notify: bool,
}

impl OccupyRequest {
    /// Notification defaults to on exactly when the occupant has an email.
    pub fn new(locker_id: impl Into<LockerId>, occupant: Occupant) -> Self {
        let notify = occupant.email.is_some();
        Self {
            locker_id: locker_id.into(),
            occupant,
            passcode: None,
            notify,
        }
    }

    pub fn with_passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(passcode.into());
        self
    }

    pub fn with_notification(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }
}

/// Outcome of a committed occupy saga.
#[derive(Debug, Clone)]
pub struct OccupyReport {
    pub run: SagaRun<OccupyState>,
    pub passcode: Passcode,
    pub notified: bool,
    /// The recovery snapshot outlived the commit. Until it is discarded no
    /// new saga can start, and a restart would restore it over this
    /// assignment.
    pub snapshot_retained: bool,
}

/// Outcome of a committed unlock saga.
#[derive(Debug, Clone)]
pub struct UnlockReport {
    pub run: SagaRun<UnlockState>,
}

/// Outcome of a sync in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of occupied lockers transferred.
    pub lockers: usize,
    /// See [`OccupyReport::snapshot_retained`].
    pub snapshot_retained: bool,
}

struct Committed {
    passcode: Passcode,
    notified: bool,
    snapshot_retained: bool,
}

/// Drives locker assignments across the local store, the lock controller
/// and the occupant notification channel.
///
/// Sagas run strictly one step at a time. A failed occupy compensates every
/// completed step in reverse order; an unlock only touches the local store
/// once the controller has approved.
pub struct AssignmentOrchestrator<S, R, N, G>
where
    S: LockerStore,
    R: RemoteController,
    N: NotificationChannel,
    G: PasscodeGenerator,
{
    store: S,
    remote: R,
    notifier: N,
    passcodes: G,
    notify_timeout: Duration,
    /// Snapshot whose discard failed; retried before the next snapshot.
    retained: Mutex<Option<Snapshot>>,
}

impl<S, R, N, G> AssignmentOrchestrator<S, R, N, G>
where
    S: LockerStore,
    R: RemoteController,
    N: NotificationChannel,
    G: PasscodeGenerator,
{
    pub fn new(store: S, remote: R, notifier: N, passcodes: G) -> Self {
        Self {
            store,
            remote,
            notifier,
            passcodes,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            retained: Mutex::new(None),
        }
    }

    /// Bounds how long one notification attempt may take.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Current occupancy as recorded locally. Never fails.
    pub async fn occupancy(&self) -> OccupancyView {
        self.store.get_all().await
    }

    /// Every local assignment with its details.
    pub async fn records(&self) -> Result<LockerDocument> {
        self.store.records().await.map_err(SagaError::Store)
    }

    /// Assigns a locker: local record, then controller, then notification.
    #[tracing::instrument(skip(self, request), fields(locker = %request.locker_id))]
    pub async fn occupy(&self, request: OccupyRequest) -> Result<OccupyReport> {
        let started = Instant::now();
        metrics::counter!("locker_saga_started_total", "flow" => "occupy").increment(1);

        let mut run = SagaRun::start(request.locker_id.clone());
        let outcome = self.drive_occupy(&mut run, request).await;
        record_outcome(&run, started, outcome.as_ref().err());

        outcome.map(|committed| OccupyReport {
            run,
            passcode: committed.passcode,
            notified: committed.notified,
            snapshot_retained: committed.snapshot_retained,
        })
    }

    async fn drive_occupy(
        &self,
        run: &mut SagaRun<OccupyState>,
        request: OccupyRequest,
    ) -> Result<Committed> {
        let OccupyRequest {
            locker_id,
            occupant,
            passcode,
            notify,
        } = request;

        let recipient = if notify {
            match occupant.email.as_deref().map(str::trim) {
                Some(address) if !address.is_empty() => Some(address.to_string()),
                _ => return abort(run, STEP_PREPARE, SagaError::MissingRecipient(locker_id)),
            }
        } else {
            None
        };

        let code = passcode.unwrap_or_else(|| self.passcodes.generate(&locker_id, &occupant));
        let Ok(passcode) = Passcode::new(code) else {
            return abort(run, STEP_PREPARE, SagaError::InvalidPasscode);
        };

        if let Err(e) = self.settle_snapshots().await {
            return abort(run, STEP_PREPARE, e);
        }

        // Recovery point for a compensation that cannot release cleanly.
        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return abort(run, STEP_PREPARE, SagaError::Store(e)),
        };

        // Step 1: local record
        if let Err(e) = self.store.assign(&locker_id, &occupant, &passcode).await {
            self.discard(snapshot).await;
            return abort(run, STEP_RESERVE_LOCAL, e.into());
        }
        run.advance(STEP_RESERVE_LOCAL, OccupyState::Reserved)?;

        // Step 2: controller
        if let Err(e) = self
            .remote
            .send_occupy(&locker_id, &passcode, &occupant.id)
            .await
        {
            run.fail(STEP_CONFIRM_REMOTE, &e);
            let (rollback, _) = self
                .compensate_occupy(run, STEP_CONFIRM_REMOTE, &locker_id, snapshot, false)
                .await?;
            return Err(SagaError::remote(
                RemoteOperation::Occupy(locker_id),
                e,
                rollback,
            ));
        }
        run.advance(STEP_CONFIRM_REMOTE, OccupyState::RemoteConfirmed)?;

        // Step 3: notification
        let notified = match recipient {
            Some(recipient) => {
                let notice = PasscodeNotice {
                    occupant_id: occupant.id.clone(),
                    locker_id: locker_id.clone(),
                    passcode: passcode.clone(),
                };
                let delivery = tokio::time::timeout(
                    self.notify_timeout,
                    self.notifier.send(&recipient, &notice),
                )
                .await
                .unwrap_or_else(|_| Err(NotificationError::Timeout(self.notify_timeout)));

                if let Err(e) = delivery {
                    run.fail(STEP_NOTIFY, &e);
                    let (rollback, remote_withdrawn) = self
                        .compensate_occupy(run, STEP_NOTIFY, &locker_id, snapshot, true)
                        .await?;
                    return Err(SagaError::NotificationFailed {
                        locker_id,
                        reason: e.to_string(),
                        rollback,
                        remote_withdrawn,
                    });
                }
                run.advance(STEP_NOTIFY, OccupyState::Notified)?;
                true
            }
            None => false,
        };

        let snapshot_retained = !self.discard(snapshot).await;
        run.finish(OccupyState::Committed)?;
        if snapshot_retained {
            tracing::error!(
                saga_id = %run.id(),
                %locker_id,
                "occupy committed but its snapshot could not be discarded"
            );
        }
        Ok(Committed {
            passcode,
            notified,
            snapshot_retained,
        })
    }

    /// Undoes a partially applied occupy in reverse step order.
    ///
    /// A failed controller withdrawal is logged and reported alongside the
    /// rollback, never escalated. A failed local release falls back to the
    /// snapshot; the rollback is incomplete only if that fails too.
    ///
    /// Returns the rollback and whether the controller no longer holds the
    /// locker.
    async fn compensate_occupy(
        &self,
        run: &mut SagaRun<OccupyState>,
        failed_step: &str,
        locker_id: &LockerId,
        snapshot: Snapshot,
        remote_confirmed: bool,
    ) -> Result<(Rollback, bool)> {
        run.begin_compensation(failed_step, OccupyState::Compensating)?;
        tracing::warn!(saga_id = %run.id(), %locker_id, failed_step, "compensating occupy saga");

        let mut remote_withdrawn = true;
        if remote_confirmed {
            match self.remote.send_unlock(locker_id).await {
                Ok(_) => run.compensated(STEP_CONFIRM_REMOTE),
                Err(e) => {
                    remote_withdrawn = false;
                    tracing::warn!(
                        %locker_id,
                        error = %e,
                        "could not withdraw controller assignment, controller may still hold the locker"
                    );
                    run.compensation_failed(STEP_CONFIRM_REMOTE, &e);
                }
            }
        }

        let mut failures = Vec::new();
        match self.store.release(locker_id).await {
            Ok(()) => {
                run.compensated(STEP_RESERVE_LOCAL);
                self.discard(snapshot).await;
            }
            Err(release_err) => {
                tracing::error!(%locker_id, error = %release_err, "local release failed, restoring snapshot");
                run.compensation_failed(STEP_RESERVE_LOCAL, &release_err);

                match self.store.restore(snapshot).await {
                    Ok(()) => run.compensated(STEP_RESTORE_SNAPSHOT),
                    Err(restore_err) => {
                        tracing::error!(
                            %locker_id,
                            error = %restore_err,
                            "snapshot restore failed, local store needs manual reconciliation"
                        );
                        run.compensation_failed(STEP_RESTORE_SNAPSHOT, &restore_err);
                        failures.push(format!("release: {release_err}"));
                        failures.push(format!("restore: {restore_err}"));
                    }
                }
            }
        }

        run.finish(OccupyState::RolledBack)?;
        let rollback = if failures.is_empty() {
            Rollback::Completed
        } else {
            Rollback::Incomplete { failures }
        };
        Ok((rollback, remote_withdrawn))
    }

    /// Releases a locker once the controller has opened it.
    #[tracing::instrument(skip(self))]
    pub async fn unlock(&self, locker_id: &LockerId) -> Result<UnlockReport> {
        let started = Instant::now();
        metrics::counter!("locker_saga_started_total", "flow" => "unlock").increment(1);

        let mut run = SagaRun::start(locker_id.clone());
        let outcome = self.drive_unlock(&mut run, locker_id).await;
        record_outcome(&run, started, outcome.as_ref().err());

        outcome.map(|()| UnlockReport { run })
    }

    async fn drive_unlock(
        &self,
        run: &mut SagaRun<UnlockState>,
        locker_id: &LockerId,
    ) -> Result<()> {
        if let Err(e) = self.remote.send_unlock(locker_id).await {
            run.fail(STEP_REQUEST_UNLOCK, &e);
            run.finish(UnlockState::Failed)?;
            return Err(SagaError::remote(
                RemoteOperation::Unlock(locker_id.clone()),
                e,
                Rollback::NotNeeded,
            ));
        }
        run.advance(STEP_REQUEST_UNLOCK, UnlockState::RemoteUnlockRequested)?;

        if let Err(e) = self.store.release(locker_id).await {
            tracing::error!(
                %locker_id,
                error = %e,
                "controller opened the locker but the local record was not released"
            );
            run.fail(STEP_RELEASE_LOCAL, &e);
            run.finish(UnlockState::Failed)?;
            return Err(e.into());
        }
        run.advance(STEP_RELEASE_LOCAL, UnlockState::LocalReleased)?;

        run.finish(UnlockState::Committed)
    }

    /// Replaces the local store with the controller's state.
    ///
    /// The local store is left untouched if the controller cannot be read,
    /// and restored if the write fails part-way.
    #[tracing::instrument(skip(self))]
    pub async fn sync_from_remote(&self) -> Result<SyncReport> {
        let state = self
            .remote
            .pull_full_state()
            .await
            .map_err(|e| SagaError::remote(RemoteOperation::Pull, e, Rollback::NotNeeded))?;
        let document = LockerDocument::from_value(state.0).map_err(SagaError::Store)?;
        let lockers = document.len();

        self.settle_snapshots().await?;
        let snapshot = self.store.snapshot().await.map_err(SagaError::Store)?;
        if let Err(e) = self.store.replace_all(document).await {
            if let Err(restore_err) = self.store.restore(snapshot).await {
                tracing::error!(error = %restore_err, "could not restore local store after failed sync");
            }
            return Err(SagaError::Store(e));
        }
        let snapshot_retained = !self.discard(snapshot).await;

        tracing::info!(lockers, "local store synced from controller");
        Ok(SyncReport {
            lockers,
            snapshot_retained,
        })
    }

    /// Overwrites the controller's lockers with the local records.
    ///
    /// Controller keys outside the locker map are carried over from its
    /// current document when it can be read.
    #[tracing::instrument(skip(self))]
    pub async fn push_to_remote(&self) -> Result<SyncReport> {
        let document = self.store.records().await.map_err(SagaError::Store)?;
        let current = match self.remote.pull_full_state().await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "could not read controller state before push");
                RawState::empty()
            }
        };
        let state = current.with_records(document.iter());

        self.remote
            .push_full_state(&state)
            .await
            .map_err(|e| SagaError::remote(RemoteOperation::Push, e, Rollback::NotNeeded))?;

        let lockers = document.len();
        tracing::info!(lockers, "controller state replaced from local store");
        Ok(SyncReport {
            lockers,
            snapshot_retained: false,
        })
    }

    /// Retries discarding a snapshot left over from an earlier commit.
    ///
    /// Runs before every new snapshot. Call it before shutting down so a
    /// restart does not restore that snapshot over committed work.
    pub async fn settle_snapshots(&self) -> Result<()> {
        let mut retained = self.retained.lock().await;
        if let Some(snapshot) = retained.as_ref() {
            self.store.discard(snapshot).await.map_err(SagaError::Store)?;
            tracing::info!("discarded retained snapshot");
            *retained = None;
        }
        Ok(())
    }

    /// Returns true if a snapshot is still waiting to be discarded.
    pub async fn has_retained_snapshot(&self) -> bool {
        self.retained.lock().await.is_some()
    }

    /// Returns false, keeping the snapshot for a later retry, if the store
    /// could not discard it.
    async fn discard(&self, snapshot: Snapshot) -> bool {
        match self.store.discard(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "could not discard snapshot, keeping it for a retry");
                *self.retained.lock().await = Some(snapshot);
                false
            }
        }
    }
}

fn abort<T>(run: &mut SagaRun<OccupyState>, step: &str, error: SagaError) -> Result<T> {
    run.fail(step, &error);
    run.finish(OccupyState::Aborted)?;
    Err(error)
}

fn record_outcome<St: FlowState>(run: &SagaRun<St>, started: Instant, error: Option<&SagaError>) {
    let flow = run.flow().as_str();
    metrics::histogram!("locker_saga_duration_seconds", "flow" => flow)
        .record(started.elapsed().as_secs_f64());

    match error {
        None => {
            metrics::counter!("locker_saga_committed_total", "flow" => flow).increment(1);
            tracing::info!(
                saga_id = %run.id(),
                locker = %run.locker_id(),
                steps = ?run.completed_steps(),
                "saga committed"
            );
        }
        Some(e) => {
            if matches!(
                e.rollback(),
                Some(Rollback::Completed | Rollback::Incomplete { .. })
            ) {
                metrics::counter!("locker_saga_rolled_back_total", "flow" => flow).increment(1);
            }
            metrics::counter!("locker_saga_failed_total", "flow" => flow, "kind" => e.kind())
                .increment(1);
            tracing::warn!(
                saga_id = %run.id(),
                locker = %run.locker_id(),
                state = run.state().as_str(),
                steps = ?run.completed_steps(),
                events = run.events().len(),
                error = %e,
                "saga failed"
            );
        }
    }
}
