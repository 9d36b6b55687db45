//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:5000"
//! log_format = "pretty"
//!
//! [telegram]
//! bot_token = "123456:ABC-DEF"
//! chat_id = "-1001234567890"
//!
//! [health]
//! check_interval_secs = 300
//! probe_timeout_secs = 10
//! monitors_file = "monitors.toml"
//! monitor_urls = "https://dev.example.com,https://prod.example.com"
//!
//! [gitlab]
//! monitored_branches = ["main", "develop"]
//! ```
//!
//! Credentials and the most common tunables can also come from the
//! environment: TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID, MONITOR_CONFIG_PATH,
//! MONITOR_URLS, HEALTH_CHECK_INTERVAL, HEALTH_CHECK_TIMEOUT. Environment
//! values win over file values.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use uptime_core::registry::{parse_url_list, RegistrySource};
use uptime_core::{CheckerConfig, SinkConfig};

const DEFAULT_MONITORS_FILE: &str = "monitors.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub gitlab: GitlabConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

fn default_listen() -> SocketAddr {
    "0.0.0.0:5000".parse().unwrap()
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Explicit monitors file. When unset, `monitors.toml` in the working
    /// directory is used if it exists.
    pub monitors_file: Option<PathBuf>,

    /// Comma-separated fallback URL list.
    pub monitor_urls: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            probe_timeout_secs: default_probe_timeout(),
            monitors_file: None,
            monitor_urls: None,
        }
    }
}

fn default_check_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabConfig {
    #[serde(default = "default_monitored_branches")]
    pub monitored_branches: Vec<String>,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            monitored_branches: default_monitored_branches(),
        }
    }
}

fn default_monitored_branches() -> Vec<String> {
    vec!["main".to_string()]
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }

    /// Overlay environment variables onto the file-sourced config. The
    /// lookup is injectable so tests never touch the real environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(v);
        }
        if let Some(v) = lookup("MONITOR_CONFIG_PATH") {
            self.health.monitors_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MONITOR_URLS") {
            self.health.monitor_urls = Some(v);
        }
        if let Some(v) = lookup("HEALTH_CHECK_INTERVAL") {
            match v.parse() {
                Ok(secs) => self.health.check_interval_secs = secs,
                Err(_) => warn!(value = %v, "Ignoring unparsable HEALTH_CHECK_INTERVAL"),
            }
        }
        if let Some(v) = lookup("HEALTH_CHECK_TIMEOUT") {
            match v.parse() {
                Ok(secs) => self.health.probe_timeout_secs = secs,
                Err(_) => warn!(value = %v, "Ignoring unparsable HEALTH_CHECK_TIMEOUT"),
            }
        }
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig::default()
            .with_check_interval(self.health.check_interval_secs)
            .with_probe_timeout(self.health.probe_timeout_secs)
    }

    pub fn registry_source(&self) -> RegistrySource {
        let (path, explicit) = match &self.health.monitors_file {
            Some(p) => (p.clone(), true),
            None => (PathBuf::from(DEFAULT_MONITORS_FILE), false),
        };

        let fallback_urls = self
            .health
            .monitor_urls
            .as_deref()
            .map(parse_url_list)
            .unwrap_or_default();

        RegistrySource {
            path,
            explicit,
            fallback_urls,
        }
    }

    /// Sink credentials; an error here aborts startup.
    pub fn sink_config(&self) -> Result<SinkConfig, String> {
        let bot_token = self
            .telegram
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or("TELEGRAM_BOT_TOKEN is required")?;
        let chat_id = self
            .telegram
            .chat_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or("TELEGRAM_CHAT_ID is required")?;

        let mut config = SinkConfig::new(bot_token, chat_id);
        if let Some(base) = &self.telegram.api_base {
            config = config.with_api_base(base);
        }
        Ok(config)
    }
}
