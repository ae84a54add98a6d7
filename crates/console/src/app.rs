//! Wires configuration into a ready orchestrator.

use locker_store::{JsonFileStore, LockerStore, StoreError};
use remote::{RemoteError, Transport, TransportStrategy};
use saga::{
    AssignmentOrchestrator, ConsoleNotifier, GraphMailNotifier, NotificationChannel,
    NotificationError, PasscodeGenerator, SagaError,
};
use thiserror::Error;

use crate::config::Config;

/// The orchestrator as the launcher builds it: strategies are chosen at
/// runtime from configuration.
pub type ConsoleOrchestrator = AssignmentOrchestrator<
    JsonFileStore,
    Transport,
    Box<dyn NotificationChannel>,
    Box<dyn PasscodeGenerator>,
>;

/// Failures that keep the console from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not open the locker store: {0}")]
    Store(#[from] StoreError),

    #[error("could not build the controller transport: {0}")]
    Transport(#[from] RemoteError),

    #[error("could not build the mail notifier: {0}")]
    Notifier(#[from] NotificationError),

    #[error("initial sync with the controller failed: {0}")]
    Sync(#[from] SagaError),
}

/// Opens the store, recovers from any interrupted run, builds the
/// orchestrator and brings store and controller in line.
pub async fn launch(config: &Config) -> Result<ConsoleOrchestrator, StartupError> {
    let store = JsonFileStore::open(&config.store_path).await?;
    recover_pending_snapshot(&store).await?;

    let orchestrator = build_orchestrator(config, store)?;
    startup_sync(&orchestrator, config).await?;
    Ok(orchestrator)
}

/// Restores the backup left by a run that stopped mid-saga.
///
/// Backups of committed runs are dropped instead. Returns whether a backup
/// was found and restored.
pub async fn recover_pending_snapshot(store: &JsonFileStore) -> Result<bool, StoreError> {
    let Some(snapshot) = store.pending_snapshot().await? else {
        return Ok(false);
    };

    tracing::warn!(
        store = %store.path().display(),
        taken_at = %snapshot.taken_at(),
        "restoring locker store from interrupted operation"
    );
    store.restore(snapshot).await?;
    Ok(true)
}

pub fn build_orchestrator(
    config: &Config,
    store: JsonFileStore,
) -> Result<ConsoleOrchestrator, StartupError> {
    let transport = Transport::connect(config.transport, &config.controller_url, config.timeout)?;

    let notifier: Box<dyn NotificationChannel> = match &config.mail_token {
        Some(token) => {
            tracing::info!(endpoint = %config.mail_endpoint, "sending passcode notices by mail");
            Box::new(GraphMailNotifier::new(
                config.mail_endpoint.clone(),
                token.clone(),
                config.notify_timeout,
            )?)
        }
        None => {
            tracing::info!("no mail token configured, logging passcode notices");
            Box::new(ConsoleNotifier)
        }
    };

    let passcodes = config.passcode_policy.generator(config.passcode_length);
    tracing::info!(
        policy = %config.passcode_policy,
        length = config.passcode_length,
        "passcode policy selected"
    );

    Ok(
        AssignmentOrchestrator::new(store, transport, notifier, passcodes)
            .with_notify_timeout(config.notify_timeout),
    )
}

/// Aligns store and controller before the operator takes over.
///
/// A real controller is the source of truth and is pulled into the store.
/// The in-process controller starts empty, so it is seeded from the store
/// instead.
pub async fn startup_sync(
    orchestrator: &ConsoleOrchestrator,
    config: &Config,
) -> Result<(), StartupError> {
    if orchestrator.remote().strategy() == TransportStrategy::Memory {
        let report = orchestrator.push_to_remote().await?;
        tracing::info!(lockers = report.lockers, "seeded in-process controller");
        return Ok(());
    }

    if !config.sync_on_start {
        tracing::info!("skipping start-up sync");
        return Ok(());
    }

    let report = orchestrator.sync_from_remote().await?;
    tracing::info!(lockers = report.lockers, "start-up sync complete");
    Ok(())
}
