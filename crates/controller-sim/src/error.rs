//! Firmware-style error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use remote::ActionResponse;
use thiserror::Error;

/// Why the simulated controller refused a request.
///
/// Messages match what the firmware sends back, so clients see the same
/// `{"status": "error", "message": ...}` bodies as in the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("'signal' or 'locker' key missing")]
    MissingSignalOrLocker,

    #[error("'password' key missing")]
    MissingPassword,

    #[error("'jobid' key missing")]
    MissingJobId,

    #[error("Unknown signal")]
    UnknownSignal,

    #[error("Unknown locker {0}")]
    UnknownLocker(String),

    #[error("Locker {0} already occupied")]
    AlreadyOccupied(String),

    /// The held document no longer has the controller shape.
    #[error("Stored document is corrupt: {0}")]
    Corrupt(String),
}

impl IntoResponse for SimError {
    fn into_response(self) -> Response {
        let status = match self {
            SimError::Corrupt(_) => {
                tracing::error!(error = %self, "simulator state is corrupt");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };

        (status, Json(ActionResponse::error(self.to_string()))).into_response()
    }
}
