//! Launcher configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use remote::{TransportStrategy, UnknownStrategy};
use saga::{
    DEFAULT_NOTIFY_TIMEOUT, DEFAULT_PASSCODE_LENGTH, GRAPH_SEND_MAIL_URL, PasscodePolicy,
    UnknownPolicy,
};
use thiserror::Error;

/// Errors that stop the launcher before it starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LOCKER_TRANSPORT: {0}")]
    Transport(#[from] UnknownStrategy),

    #[error("LOCKER_PASSCODE_POLICY: {0}")]
    PasscodePolicy(#[from] UnknownPolicy),
}

/// Launcher configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `LOCKER_STORE_PATH`: persisted store file (default: `./data/details.json`)
/// - `LOCKER_CONTROLLER_URL`: controller base URL (default: `http://192.168.68.184`)
/// - `LOCKER_TRANSPORT`: `signal`, `bulk` or `memory` (default: `signal`)
/// - `LOCKER_TIMEOUT_SECS`: per-request controller timeout (default: `5`)
/// - `LOCKER_NOTIFY_TIMEOUT_SECS`: bound on one notification (default: `120`)
/// - `LOCKER_PASSCODE_POLICY`: `random` or `derived` (default: `random`)
/// - `LOCKER_PASSCODE_LENGTH`: digits of random passcodes (default: `6`)
/// - `LOCKER_MAIL_TOKEN`: mail API bearer token; unset prints notices instead
/// - `LOCKER_MAIL_ENDPOINT`: mail API endpoint (default: Graph `me/sendMail`)
/// - `LOCKER_SYNC_ON_START`: pull controller state on launch (default: `true`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store_path: PathBuf,
    pub controller_url: String,
    pub transport: TransportStrategy,
    pub timeout: Duration,
    pub notify_timeout: Duration,
    pub passcode_policy: PasscodePolicy,
    pub passcode_length: usize,
    pub mail_token: Option<String>,
    pub mail_endpoint: String,
    pub sync_on_start: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./data/details.json"),
            controller_url: "http://192.168.68.184".to_string(),
            transport: TransportStrategy::default(),
            timeout: Duration::from_secs(5),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            passcode_policy: PasscodePolicy::default(),
            passcode_length: DEFAULT_PASSCODE_LENGTH,
            mail_token: None,
            mail_endpoint: GRAPH_SEND_MAIL_URL.to_string(),
            sync_on_start: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup, falling back to defaults.
    ///
    /// Malformed numbers and booleans are ignored with a warning; unknown
    /// transport or policy names are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            store_path: value("LOCKER_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            controller_url: value("LOCKER_CONTROLLER_URL").unwrap_or(defaults.controller_url),
            transport: match value("LOCKER_TRANSPORT") {
                Some(name) => name.parse()?,
                None => defaults.transport,
            },
            timeout: parsed(&value, "LOCKER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            notify_timeout: parsed(&value, "LOCKER_NOTIFY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.notify_timeout),
            passcode_policy: match value("LOCKER_PASSCODE_POLICY") {
                Some(name) => name.parse()?,
                None => defaults.passcode_policy,
            },
            passcode_length: parsed(&value, "LOCKER_PASSCODE_LENGTH")
                .unwrap_or(defaults.passcode_length),
            mail_token: value("LOCKER_MAIL_TOKEN"),
            mail_endpoint: value("LOCKER_MAIL_ENDPOINT").unwrap_or(defaults.mail_endpoint),
            sync_on_start: parsed(&value, "LOCKER_SYNC_ON_START")
                .unwrap_or(defaults.sync_on_start),
            log_level: value("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }
}

fn parsed<T: std::str::FromStr>(value: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = value(key)?;
    match raw.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid value, using default");
            None
        }
    }
}
