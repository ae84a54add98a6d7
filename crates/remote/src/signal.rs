use async_trait::async_trait;
use common::{LockerId, Passcode};

use crate::client::ControllerClient;
use crate::transport::RemoteController;
use crate::wire::{Approved, RawState, RemoteSignal};
use crate::Result;

/// Signal/response strategy: one `POST /actions` per saga step.
#[derive(Debug, Clone)]
pub struct SignalTransport {
    client: ControllerClient,
}

impl SignalTransport {
    pub fn new(client: ControllerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteController for SignalTransport {
    async fn send_occupy(
        &self,
        locker_id: &LockerId,
        passcode: &Passcode,
        occupant_id: &str,
    ) -> Result<Approved> {
        self.client
            .post_action(&RemoteSignal::occupy(locker_id, passcode, occupant_id))
            .await
    }

    async fn send_unlock(&self, locker_id: &LockerId) -> Result<Approved> {
        self.client.post_action(&RemoteSignal::unlock(locker_id)).await
    }

    async fn pull_full_state(&self) -> Result<RawState> {
        self.client.get_details().await
    }

    async fn push_full_state(&self, state: &RawState) -> Result<()> {
        self.client.put_details(state).await
    }
}
