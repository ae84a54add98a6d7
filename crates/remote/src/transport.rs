use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use common::{LockerId, Passcode};
use thiserror::Error;

use crate::bulk::BulkTransport;
use crate::client::ControllerClient;
use crate::memory::InMemoryController;
use crate::signal::SignalTransport;
use crate::wire::{Approved, RawState};
use crate::Result;

/// Capability to drive the physical lock controller.
///
/// Every call is a single bounded attempt. Timeouts and transport failures
/// are `Unreachable`; any answer other than an explicit approval is
/// `Rejected`.
#[async_trait]
pub trait RemoteController: Send + Sync {
    /// Asks the controller to hold `locker_id` under `passcode`.
    async fn send_occupy(
        &self,
        locker_id: &LockerId,
        passcode: &Passcode,
        occupant_id: &str,
    ) -> Result<Approved>;

    /// Asks the controller to physically release `locker_id`.
    async fn send_unlock(&self, locker_id: &LockerId) -> Result<Approved>;

    /// Downloads the controller's full state.
    async fn pull_full_state(&self) -> Result<RawState>;

    /// Replaces the controller's full state.
    async fn push_full_state(&self, state: &RawState) -> Result<()>;
}

/// Which transport the launcher should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStrategy {
    #[default]
    Signal,
    Bulk,
    /// No hardware; an in-process controller.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transport strategy '{0}', expected signal, bulk or memory")]
pub struct UnknownStrategy(pub String);

impl FromStr for TransportStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signal" => Ok(TransportStrategy::Signal),
            "bulk" => Ok(TransportStrategy::Bulk),
            "memory" => Ok(TransportStrategy::Memory),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

impl TransportStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportStrategy::Signal => "signal",
            TransportStrategy::Bulk => "bulk",
            TransportStrategy::Memory => "memory",
        }
    }
}

impl std::fmt::Display for TransportStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport selected at runtime by [`TransportStrategy`].
#[derive(Debug, Clone)]
pub enum Transport {
    Signal(SignalTransport),
    Bulk(BulkTransport),
    Memory(InMemoryController),
}

impl Transport {
    /// Builds the transport for `strategy` against `base_url`.
    pub fn connect(
        strategy: TransportStrategy,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        tracing::info!(%strategy, base_url, ?timeout, "building controller transport");
        Ok(match strategy {
            TransportStrategy::Signal => {
                Transport::Signal(SignalTransport::new(ControllerClient::new(base_url, timeout)?))
            }
            TransportStrategy::Bulk => {
                Transport::Bulk(BulkTransport::new(ControllerClient::new(base_url, timeout)?))
            }
            TransportStrategy::Memory => Transport::Memory(InMemoryController::new()),
        })
    }

    pub fn strategy(&self) -> TransportStrategy {
        match self {
            Transport::Signal(_) => TransportStrategy::Signal,
            Transport::Bulk(_) => TransportStrategy::Bulk,
            Transport::Memory(_) => TransportStrategy::Memory,
        }
    }

    fn inner(&self) -> &dyn RemoteController {
        match self {
            Transport::Signal(t) => t,
            Transport::Bulk(t) => t,
            Transport::Memory(t) => t,
        }
    }
}

#[async_trait]
impl RemoteController for Transport {
    async fn send_occupy(
        &self,
        locker_id: &LockerId,
        passcode: &Passcode,
        occupant_id: &str,
    ) -> Result<Approved> {
        self.inner()
            .send_occupy(locker_id, passcode, occupant_id)
            .await
    }

    async fn send_unlock(&self, locker_id: &LockerId) -> Result<Approved> {
        self.inner().send_unlock(locker_id).await
    }

    async fn pull_full_state(&self) -> Result<RawState> {
        self.inner().pull_full_state().await
    }

    async fn push_full_state(&self, state: &RawState) -> Result<()> {
        self.inner().push_full_state(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parsing() {
        assert_eq!("signal".parse::<TransportStrategy>(), Ok(TransportStrategy::Signal));
        assert_eq!(" Bulk ".parse::<TransportStrategy>(), Ok(TransportStrategy::Bulk));
        assert_eq!("memory".parse::<TransportStrategy>(), Ok(TransportStrategy::Memory));
        assert_eq!(
            "bluetooth".parse::<TransportStrategy>(),
            Err(UnknownStrategy("bluetooth".to_string()))
        );
    }

    #[test]
    fn connect_builds_requested_strategy() {
        for strategy in [
            TransportStrategy::Signal,
            TransportStrategy::Bulk,
            TransportStrategy::Memory,
        ] {
            let transport =
                Transport::connect(strategy, "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
            assert_eq!(transport.strategy(), strategy);
        }
    }

    #[tokio::test]
    async fn memory_transport_dispatches() {
        let transport =
            Transport::connect(TransportStrategy::Memory, "", Duration::from_secs(1)).unwrap();
        let passcode = Passcode::new("1234").unwrap();

        transport
            .send_occupy(&"101".into(), &passcode, "J1")
            .await
            .unwrap();

        let state = transport.pull_full_state().await.unwrap();
        assert_eq!(state.0["lockers"]["101"]["password"], "1234");
    }
}
