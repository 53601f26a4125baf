//! Process configuration, read once at startup and passed around via
//! [`crate::context::AppContext`] rather than re-read from the environment
//! by individual components.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// DSN for the persistent store. Default `./flightless.db` with
    /// shared-cache, rwc.
    pub db_dsn: String,
    /// Supervisor reconciler cadence (~1 Hz).
    pub reconcile_interval: Duration,
    /// Timeout applied to relay-info (NIP-11) and LNURL-pay HTTP hops.
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_dsn: "./flightless.db?cache=shared&mode=rwc".to_string(),
            reconcile_interval: Duration::from_secs(1),
            http_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_dsn: std::env::var("DB").unwrap_or(defaults.db_dsn),
            reconcile_interval: std::env::var("FLIGHTLESS_RECONCILE_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconcile_interval),
            http_timeout: std::env::var("FLIGHTLESS_HTTP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.http_timeout),
        }
    }
}
