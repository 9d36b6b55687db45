use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the periodic health-check scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Time between probe cycles (default: 300s).
    pub check_interval: Duration,
    /// Per-request timeout, shared by every endpoint probe (default: 10s).
    pub probe_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl CheckerConfig {
    pub fn with_check_interval(mut self, secs: u64) -> Self {
        self.check_interval = Duration::from_secs(secs);
        self
    }

    pub fn with_probe_timeout(mut self, secs: u64) -> Self {
        self.probe_timeout = Duration::from_secs(secs);
        self
    }
}
