//! Liveness check.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::SimState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Lockers currently held.
    pub occupied: usize,
    /// Size of the locker whitelist; absent when any id is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_lockers: Option<usize>,
}

/// GET /health: reports the simulator is up and how many lockers it holds.
pub async fn check(State(state): State<Arc<SimState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        occupied: state.occupied_count().await,
        known_lockers: state.known_count(),
    })
}
