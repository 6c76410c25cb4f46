//! Configuration Module
//!
//! Loads the workload driver's settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Workload configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of concurrent worker tasks
    pub workers: usize,
    /// Number of distinct keys the workers spread over
    pub key_space: u64,
    /// TTL in milliseconds given to every stored entry
    pub entry_ttl_ms: u64,
    /// How long the workload runs, in seconds
    pub run_secs: u64,
    /// Stats reporting interval in seconds
    pub report_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `WORKERS` - Concurrent workers (default: 4)
    /// - `KEY_SPACE` - Distinct keys (default: 1000)
    /// - `ENTRY_TTL_MS` - Entry TTL in milliseconds (default: 500)
    /// - `RUN_SECS` - Workload duration in seconds (default: 10)
    /// - `REPORT_INTERVAL` - Stats report frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_or("WORKERS", defaults.workers),
            key_space: env_or("KEY_SPACE", defaults.key_space),
            entry_ttl_ms: env_or("ENTRY_TTL_MS", defaults.entry_ttl_ms),
            run_secs: env_or("RUN_SECS", defaults.run_secs),
            report_interval: env_or("REPORT_INTERVAL", defaults.report_interval),
        }
    }

    /// TTL applied to each stored entry.
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_millis(self.entry_ttl_ms)
    }

    /// Total workload duration.
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            key_space: 1000,
            entry_ttl_ms: 500,
            run_secs: 10,
            report_interval: 1,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.key_space, 1000);
        assert_eq!(config.entry_ttl_ms, 500);
        assert_eq!(config.run_secs, 10);
        assert_eq!(config.report_interval, 1);
    }

    #[test]
    fn test_config_durations() {
        let config = Config::default();
        assert_eq!(config.entry_ttl(), Duration::from_millis(500));
        assert_eq!(config.run_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_from_env() {
        env::remove_var("WORKERS");
        env::set_var("KEY_SPACE", "42");
        env::set_var("ENTRY_TTL_MS", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.workers, 4);
        assert_eq!(config.key_space, 42);
        assert_eq!(config.entry_ttl_ms, 500);

        env::remove_var("KEY_SPACE");
        env::remove_var("ENTRY_TTL_MS");
    }
}
