//! Knobs for the store and the service driving it.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound for any wait inside the store: a row lock held by another
    /// unit, or a free slot to open a new unit.
    pub lock_timeout: Duration,
    /// How many atomic units may be open at the same time.
    pub connection_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            connection_limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of threads executing transfers concurrently.
    pub workers: usize,
    /// How many times a transfer that hit a concurrency conflict is executed again
    /// from scratch. Zero means conflicts are reported straight away.
    pub conflict_retries: u32,
    pub store: StoreConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            conflict_retries: 0,
            store: StoreConfig::default(),
        }
    }
}
