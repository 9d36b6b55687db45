use std::sync::Arc;

use uptime_core::{HealthMonitor, TelegramClient};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<HealthMonitor>,
    pub notifier: Arc<TelegramClient>,
    pub monitored_branches: Vec<String>,
}

impl AppState {
    pub fn new(monitor: Arc<HealthMonitor>, notifier: Arc<TelegramClient>) -> Self {
        Self {
            monitor,
            notifier,
            monitored_branches: vec!["main".to_string()],
        }
    }

    pub fn with_monitored_branches(mut self, branches: Vec<String>) -> Self {
        self.monitored_branches = branches;
        self
    }
}
