use async_trait::async_trait;
use common::{LockerId, Passcode};
use serde_json::json;

use crate::client::ControllerClient;
use crate::transport::RemoteController;
use crate::wire::{Approved, ControllerDocument, RawState};
use crate::{RemoteError, Result};

/// Bulk strategy: every step downloads the controller document, edits it,
/// and uploads it whole.
///
/// Occupying a locker the controller already holds is rejected. Unlocking a
/// locker the controller does not know is approved without an upload, since
/// the controller already considers it free.
#[derive(Debug, Clone)]
pub struct BulkTransport {
    client: ControllerClient,
}

impl BulkTransport {
    pub fn new(client: ControllerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteController for BulkTransport {
    #[tracing::instrument(skip(self, passcode, occupant_id))]
    async fn send_occupy(
        &self,
        locker_id: &LockerId,
        passcode: &Passcode,
        occupant_id: &str,
    ) -> Result<Approved> {
        let mut document = ControllerDocument::from_raw(&self.client.get_details().await?)?;
        if document.contains(locker_id) {
            return Err(RemoteError::Rejected(format!(
                "controller already holds locker {locker_id}"
            )));
        }

        document.insert(locker_id, passcode.expose(), occupant_id);
        self.client.put_details(&document.into_raw()).await?;

        Ok(Approved {
            detail: json!({ "status": "approved", "action": "occupied" }),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn send_unlock(&self, locker_id: &LockerId) -> Result<Approved> {
        let mut document = ControllerDocument::from_raw(&self.client.get_details().await?)?;
        if !document.remove(locker_id) {
            tracing::warn!(%locker_id, "controller does not hold locker, nothing to upload");
            return Ok(Approved {
                detail: json!({ "status": "approved", "action": "none" }),
            });
        }

        self.client.put_details(&document.into_raw()).await?;
        Ok(Approved {
            detail: json!({ "status": "approved", "action": "unlocked" }),
        })
    }

    async fn pull_full_state(&self) -> Result<RawState> {
        self.client.get_details().await
    }

    async fn push_full_state(&self, state: &RawState) -> Result<()> {
        self.client.put_details(state).await
    }
}
