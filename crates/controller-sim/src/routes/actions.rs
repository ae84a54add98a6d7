//! Signal endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use remote::ActionResponse;
use serde_json::Value;

use crate::error::SimError;
use crate::state::SimState;

/// POST /actions: applies one `occupy` or `unlock` signal.
///
/// Checks run in the firmware's order: JSON, `signal`/`locker`, the signal
/// name, then the signal's own keys.
#[tracing::instrument(skip(state, body))]
pub async fn post(
    State(state): State<Arc<SimState>>,
    body: Bytes,
) -> Result<Json<ActionResponse>, SimError> {
    state.pause().await;

    let outcome = apply(&state, &body).await;
    let label = match &outcome {
        Ok(_) => "approved",
        Err(_) => "error",
    };
    metrics::counter!("controller_sim_actions_total", "outcome" => label).increment(1);
    if let Err(e) = &outcome {
        tracing::warn!(error = %e, "signal refused");
    }

    outcome.map(Json)
}

async fn apply(state: &SimState, body: &[u8]) -> Result<ActionResponse, SimError> {
    let request: Value = serde_json::from_slice(body).map_err(|_| SimError::InvalidJson)?;

    let (Some(signal), Some(locker)) = (text(&request, "signal"), text(&request, "locker")) else {
        return Err(SimError::MissingSignalOrLocker);
    };

    match signal.as_str() {
        "unlock" => {
            state.unlock(&locker).await?;
            tracing::info!(%locker, "locker unlocked");
            Ok(ActionResponse::approved("unlocked"))
        }
        "occupy" => {
            let password = text(&request, "password").ok_or(SimError::MissingPassword)?;
            let jobid = text(&request, "jobid").ok_or(SimError::MissingJobId)?;
            state.occupy(&locker, &password, &jobid).await?;
            tracing::info!(%locker, %jobid, "locker occupied");
            Ok(ActionResponse::approved("occupied"))
        }
        _ => Err(SimError::UnknownSignal),
    }
}

/// Reads a key as text. The firmware accepts numbers here too.
fn text(request: &Value, key: &str) -> Option<String> {
    match request.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
