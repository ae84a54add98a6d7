//! Notification channel trait and local implementations.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{LockerId, Passcode};
use thiserror::Error;

/// What the occupant needs to open their locker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasscodeNotice {
    pub occupant_id: String,
    pub locker_id: LockerId,
    pub passcode: Passcode,
}

/// Errors from a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// The channel refused our credentials.
    #[error("Notification authentication failed: {0}")]
    Authentication(String),

    /// The message could not be delivered.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// No answer within the allowed time.
    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends a passcode notice to an occupant.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, recipient: &str, notice: &PasscodeNotice)
    -> Result<(), NotificationError>;
}

#[async_trait]
impl<T: NotificationChannel + ?Sized> NotificationChannel for Box<T> {
    async fn send(
        &self,
        recipient: &str,
        notice: &PasscodeNotice,
    ) -> Result<(), NotificationError> {
        (**self).send(recipient, notice).await
    }
}

/// Development channel: logs the notice, passcode included, for the
/// operator to pass on. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl NotificationChannel for ConsoleNotifier {
    async fn send(
        &self,
        recipient: &str,
        notice: &PasscodeNotice,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            recipient,
            occupant = %notice.occupant_id,
            locker = %notice.locker_id,
            passcode = notice.passcode.expose(),
            "passcode notice for the occupant"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<(String, PasscodeNotice)>,
    fail_on_send: bool,
    send_calls: usize,
}

/// In-memory notification channel for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the channel to fail every send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    /// Number of send attempts, failed or not.
    pub fn send_calls(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .send_calls
    }

    /// Notices delivered so far, with their recipients.
    pub fn sent(&self) -> Vec<(String, PasscodeNotice)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl NotificationChannel for InMemoryNotifier {
    async fn send(
        &self,
        recipient: &str,
        notice: &PasscodeNotice,
    ) -> Result<(), NotificationError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.send_calls += 1;

        if state.fail_on_send {
            return Err(NotificationError::Delivery("mailbox unavailable".to_string()));
        }

        state.sent.push((recipient.to_string(), notice.clone()));
        Ok(())
    }
}
