//! Passcode delivery through the Microsoft Graph `sendMail` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use super::notification::{NotificationChannel, NotificationError, PasscodeNotice};

/// Default Graph endpoint for sending mail as the signed-in user.
pub const GRAPH_SEND_MAIL_URL: &str = "https://graph.microsoft.com/v1.0/me/sendMail";

/// Sends passcode notices as HTML mail through Microsoft Graph.
///
/// Token acquisition happens outside this type; it is handed a bearer token
/// that already carries the `Mail.Send` scope.
#[derive(Debug, Clone)]
pub struct GraphMailNotifier {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    timeout: Duration,
}

impl GraphMailNotifier {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Delivery(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the `sendMail` request body.
    pub fn payload(recipient: &str, notice: &PasscodeNotice) -> Value {
        let content = format!(
            "Your parts are ready to be collected at the locker bank at any time!<br><br>\
             Your locker number is: {}<br>\
             Your locker password is: {}",
            notice.locker_id,
            notice.passcode.expose()
        );

        json!({
            "message": {
                "subject": format!("Collection of {}", notice.occupant_id),
                "body": {
                    "contentType": "HTML",
                    "content": content,
                },
                "toRecipients": [
                    { "emailAddress": { "address": recipient } }
                ],
            },
            "saveToSentItems": "true",
        })
    }
}

#[async_trait]
impl NotificationChannel for GraphMailNotifier {
    #[tracing::instrument(skip(self, notice), fields(locker = %notice.locker_id))]
    async fn send(
        &self,
        recipient: &str,
        notice: &PasscodeNotice,
    ) -> Result<(), NotificationError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&Self::payload(recipient, notice))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout(self.timeout)
                } else {
                    NotificationError::Delivery(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            tracing::info!("passcode notice accepted for delivery");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%status, %body, "mail endpoint refused passcode notice");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(NotificationError::Authentication(format!("{status}: {body}")))
            }
            _ => Err(NotificationError::Delivery(format!("{status}: {body}"))),
        }
    }
}
