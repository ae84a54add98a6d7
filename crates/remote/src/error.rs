use thiserror::Error;

/// Errors returned by controller transports.
///
/// Transports never retry; each variant describes the outcome of a single
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The controller answered, but not with an approval. Carries the raw
    /// response for diagnostics.
    #[error("Controller rejected the request: {0}")]
    Rejected(String),

    /// The controller could not be reached or did not answer in time.
    #[error("Controller unreachable: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Unreachable(format!("request timed out: {e}"))
        } else {
            RemoteError::Unreachable(e.to_string())
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
