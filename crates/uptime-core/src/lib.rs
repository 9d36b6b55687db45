#![forbid(unsafe_code)]

pub mod config;
pub mod monitor;
pub mod notifier;
pub mod prober;
pub mod registry;
pub mod report;
pub mod tracker;

pub use config::CheckerConfig;
pub use monitor::{HealthMonitor, MonitorState};
pub use notifier::{
    notification_channel, Notification, NotificationDispatcher, SinkConfig, SinkError,
    TelegramClient,
};
pub use prober::{EndpointProber, EndpointStatus, HttpProber, ProbeResult};
pub use registry::{ConfigError, EndpointSpec, RegistrySource};
pub use report::{format_alert, format_summary};
pub use tracker::{StatusTracker, TransitionEvent};
