//! Saga run log.

use common::{LockerId, SagaId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::events::SagaEvent;
use crate::state::{Flow, FlowState};

/// The record of one saga invocation.
///
/// Tracks the current state, the forward steps that completed and every
/// event in order. All state changes go through the flow's transition table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaRun<S> {
    id: SagaId,
    locker_id: LockerId,
    state: S,
    completed_steps: Vec<String>,
    events: Vec<SagaEvent>,
}

impl<S: FlowState> SagaRun<S> {
    /// Starts a new run in the flow's initial state.
    pub fn start(locker_id: LockerId) -> Self {
        let id = SagaId::new();
        Self {
            id,
            locker_id: locker_id.clone(),
            state: S::default(),
            completed_steps: Vec::new(),
            events: vec![SagaEvent::saga_started(id, S::FLOW, locker_id)],
        }
    }

    pub fn id(&self) -> SagaId {
        self.id
    }

    pub fn flow(&self) -> Flow {
        S::FLOW
    }

    pub fn locker_id(&self) -> &LockerId {
        &self.locker_id
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn events(&self) -> &[SagaEvent] {
        &self.events
    }

    /// Returns true if the run has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Records a successful forward step and moves to `next`.
    pub(crate) fn advance(&mut self, step: &str, next: S) -> Result<()> {
        self.move_to(next)?;
        self.completed_steps.push(step.to_string());
        self.events.push(SagaEvent::step_completed(step, next.as_str()));
        tracing::debug!(saga_id = %self.id, step, state = next.as_str(), "saga step completed");
        Ok(())
    }

    /// Records a failed forward step. The state is left unchanged.
    pub(crate) fn fail(&mut self, step: &str, error: impl ToString) {
        let error = error.to_string();
        tracing::warn!(saga_id = %self.id, step, %error, "saga step failed");
        self.events.push(SagaEvent::step_failed(step, error));
    }

    /// Moves to the compensating state.
    pub(crate) fn begin_compensation(&mut self, from_step: &str, compensating: S) -> Result<()> {
        self.move_to(compensating)?;
        self.events.push(SagaEvent::compensation_started(from_step));
        Ok(())
    }

    pub(crate) fn compensated(&mut self, step: &str) {
        self.events.push(SagaEvent::compensation_step_completed(step));
    }

    pub(crate) fn compensation_failed(&mut self, step: &str, error: impl ToString) {
        self.events
            .push(SagaEvent::compensation_step_failed(step, error.to_string()));
    }

    /// Moves to a terminal state.
    pub(crate) fn finish(&mut self, terminal: S) -> Result<()> {
        self.move_to(terminal)?;
        self.events.push(SagaEvent::saga_finished(terminal.as_str()));
        Ok(())
    }

    fn move_to(&mut self, next: S) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SagaError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{OccupyState, UnlockState};

    #[test]
    fn test_start_records_flow_and_locker() {
        let run: SagaRun<OccupyState> = SagaRun::start("101".into());

        assert_eq!(run.state(), OccupyState::Idle);
        assert_eq!(run.flow(), Flow::Occupy);
        assert_eq!(run.locker_id().as_str(), "101");
        assert_eq!(run.events().len(), 1);
        assert!(matches!(
            &run.events()[0],
            SagaEvent::SagaStarted(data) if data.saga_id == run.id() && data.flow == Flow::Occupy
        ));
    }

    #[test]
    fn test_advance_tracks_steps() {
        let mut run: SagaRun<OccupyState> = SagaRun::start("101".into());
        run.advance("reserve_local", OccupyState::Reserved).unwrap();
        run.advance("confirm_remote", OccupyState::RemoteConfirmed).unwrap();
        run.finish(OccupyState::Committed).unwrap();

        assert_eq!(run.completed_steps(), ["reserve_local", "confirm_remote"]);
        assert!(run.is_finished());
        assert_eq!(run.events().last().unwrap().event_type(), "SagaFinished");
    }

    #[test]
    fn test_illegal_move_is_refused() {
        let mut run: SagaRun<UnlockState> = SagaRun::start("101".into());

        let err = run.finish(UnlockState::Committed).unwrap_err();

        assert!(matches!(
            err,
            SagaError::InvalidTransition { from: "Idle", to: "Committed" }
        ));
        assert_eq!(run.state(), UnlockState::Idle);
    }

    #[test]
    fn test_failure_keeps_state() {
        let mut run: SagaRun<OccupyState> = SagaRun::start("101".into());
        run.advance("reserve_local", OccupyState::Reserved).unwrap();
        run.fail("confirm_remote", "rejected");

        assert_eq!(run.state(), OccupyState::Reserved);
        run.begin_compensation("confirm_remote", OccupyState::Compensating)
            .unwrap();
        run.compensated("reserve_local");
        run.finish(OccupyState::RolledBack).unwrap();

        let types: Vec<_> = run.events().iter().map(SagaEvent::event_type).collect();
        assert_eq!(
            types,
            [
                "SagaStarted",
                "StepCompleted",
                "StepFailed",
                "CompensationStarted",
                "CompensationStepCompleted",
                "SagaFinished"
            ]
        );
    }
}
