//! HTTP client for the controller's REST surface.

use std::time::Duration;

use crate::wire::{ActionResponse, Approved, RawState, RemoteSignal};
use crate::{RemoteError, Result};

/// Thin HTTP client for `GET/PUT /details` and `POST /actions`.
///
/// Every request is bounded by the timeout given at construction; nothing is
/// retried.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControllerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unreachable(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn details_url(&self) -> String {
        format!("{}/details", self.base_url)
    }

    fn actions_url(&self) -> String {
        format!("{}/actions", self.base_url)
    }

    /// Downloads the full controller document.
    #[tracing::instrument(skip(self), fields(url = %self.details_url()))]
    pub async fn get_details(&self) -> Result<RawState> {
        let response = self.http.get(self.details_url()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::Unreachable(format!(
                "GET /details returned {status}: {body}"
            )));
        }

        let value = serde_json::from_str(&body).map_err(|e| {
            RemoteError::Unreachable(format!("GET /details returned invalid JSON ({e}): {body}"))
        })?;
        tracing::debug!("controller document downloaded");
        Ok(RawState(value))
    }

    /// Replaces the full controller document.
    #[tracing::instrument(skip(self, state), fields(url = %self.details_url()))]
    pub async fn put_details(&self, state: &RawState) -> Result<()> {
        let response = self.http.put(self.details_url()).json(state).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Unreachable(format!(
                "PUT /details returned {status}: {body}"
            )));
        }

        tracing::debug!("controller document uploaded");
        Ok(())
    }

    /// Sends one signal and interprets the controller's verdict.
    ///
    /// Any response whose `status` is not exactly `"approved"` is a
    /// rejection, whatever its HTTP status code; a body that is not a
    /// status object is a rejection carrying the raw text.
    #[tracing::instrument(
        skip(self, signal),
        fields(signal = %signal.signal, locker = %signal.locker)
    )]
    pub async fn post_action(&self, signal: &RemoteSignal) -> Result<Approved> {
        let response = self.http.post(self.actions_url()).json(signal).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let verdict = match serde_json::from_str::<ActionResponse>(&body) {
            Ok(parsed) if parsed.is_approved() => Ok(Approved::from_response(&parsed)),
            Ok(_) => Err(RemoteError::Rejected(body)),
            Err(_) => Err(RemoteError::Rejected(format!("HTTP {status}: {body}"))),
        };

        let outcome = if verdict.is_ok() { "approved" } else { "rejected" };
        metrics::counter!(
            "controller_actions_total",
            "signal" => signal.signal.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        tracing::info!(%status, outcome, "controller answered");

        verdict
    }
}
