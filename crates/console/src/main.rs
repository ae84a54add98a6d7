//! Locker console entry point.

use anyhow::{Context, Result};
use console::{Config, Session};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logs go to stderr so they do not interleave with the prompt.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level);

    tracing::info!(
        store = %config.store_path.display(),
        controller = %config.controller_url,
        transport = %config.transport,
        "starting locker console"
    );

    let orchestrator = console::launch(&config)
        .await
        .context("console start-up failed")?;

    Session::new(orchestrator)
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("console I/O failed")?;

    tracing::info!("console closed");
    Ok(())
}
