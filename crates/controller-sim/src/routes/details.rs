//! Whole-document endpoints used by bulk sync.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use remote::{ActionResponse, RawState};
use serde_json::Value;

use crate::error::SimError;
use crate::state::SimState;

/// GET /details: the controller document.
#[tracing::instrument(skip(state))]
pub async fn get(State(state): State<Arc<SimState>>) -> Json<RawState> {
    state.pause().await;
    Json(state.document().await)
}

/// PUT /details: replaces the controller document.
///
/// The body must be a JSON object; it is stored as sent.
#[tracing::instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn put(
    State(state): State<Arc<SimState>>,
    body: Bytes,
) -> Result<Json<ActionResponse>, SimError> {
    state.pause().await;

    let value: Value = serde_json::from_slice(&body).map_err(|_| SimError::InvalidJson)?;
    if !value.is_object() {
        return Err(SimError::InvalidJson);
    }

    state.replace(RawState(value)).await;
    tracing::info!("controller document replaced");
    Ok(Json(ActionResponse::approved("replaced")))
}
