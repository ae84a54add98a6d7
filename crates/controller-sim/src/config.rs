//! Simulator configuration loaded from environment variables.

use std::time::Duration;

/// Simulator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `SIM_LOCKERS`: comma-separated locker ids that exist (default: any)
/// - `SIM_DELAY_MS`: latency added to every controller response (default: `0`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub lockers: Vec<String>,
    pub delay: Duration,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            lockers: std::env::var("SIM_LOCKERS")
                .map(|list| parse_lockers(&list))
                .unwrap_or_default(),
            delay: parsed("SIM_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            lockers: Vec::new(),
            delay: Duration::ZERO,
            log_level: "info".to_string(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid value, using default");
            None
        }
    }
}

fn parse_lockers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.lockers.is_empty());
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_locker_list_parsing() {
        assert_eq!(parse_lockers("101, 102,,103 "), ["101", "102", "103"]);
        assert!(parse_lockers(" , ").is_empty());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: serialised with every other env-mutating test.
        unsafe {
            std::env::set_var("PORT", "9191");
            std::env::set_var("SIM_LOCKERS", "1,2");
            std::env::set_var("SIM_DELAY_MS", "not-a-number");
        }

        let config = Config::from_env();

        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("SIM_LOCKERS");
            std::env::remove_var("SIM_DELAY_MS");
        }

        assert_eq!(config.port, 9191);
        assert_eq!(config.lockers, ["1", "2"]);
        assert_eq!(config.delay, Duration::ZERO);
    }
}
