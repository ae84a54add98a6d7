//! HTTP simulator of the embedded locker controller.
//!
//! Serves the same surface as the firmware (`GET /details`, `POST /actions`)
//! plus `PUT /details` for bulk pushes, backed by an in-memory document.
//! Used for development without hardware and by the transport tests.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::SimError;
pub use state::SimState;

/// Creates the simulator router around `state`.
pub fn create_app(state: Arc<SimState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/details",
            get(routes::details::get).put(routes::details::put),
        )
        .route("/actions", post(routes::actions::post))
        .with_state(state)
        .merge(metrics_router)
        .fallback(not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": "Not Found" })),
    )
}
