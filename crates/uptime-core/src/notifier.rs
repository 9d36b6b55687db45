//! Telegram notification sink.
//!
//! Reports and alerts produced by the scheduler travel through an mpsc
//! channel. The [`NotificationDispatcher`] reads from that channel and
//! delivers each message with a single sendMessage call; delivery failures
//! are logged and dropped so they never feed back into the probe cycle.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Telegram API returned HTTP {status}")]
    Api { status: u16 },
    #[error("failed to reach Telegram: {reason}")]
    Network { reason: String },
}

/// Credentials and tuning for the Telegram sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub bot_token: String,
    /// Destination chat (group or channel id).
    pub chat_id: String,
    /// API host override, used by tests.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_send_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

impl SinkConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: default_api_base(),
            timeout_ms: default_send_timeout_ms(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

/// Messages travelling from the scheduler to the dispatcher.
#[derive(Debug, Clone)]
pub enum Notification {
    Report(String),
    Alert(String),
}

#[derive(Debug, Deserialize)]
struct GetMeResponse {
    #[serde(default)]
    result: Option<BotInfo>,
}

#[derive(Debug, Deserialize)]
struct BotInfo {
    #[serde(default)]
    username: Option<String>,
}

/// Thin client for the two sink operations the service depends on.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    config: SinkConfig,
    client: Client,
}

impl TelegramClient {
    pub fn new(config: SinkConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .expect("Failed to build HTTP client");
        Self { config, client }
    }

    pub fn with_client(config: SinkConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn chat_id(&self) -> &str {
        &self.config.chat_id
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.config.bot_token, method)
    }

    /// Send a message to the configured chat. One attempt; retrying is the
    /// caller's decision, and no caller makes it.
    pub async fn send_message(&self, text: &str, parse_mode: &str) -> Result<(), SinkError> {
        let payload = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": parse_mode,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SinkError::Network {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SinkError::Api {
                status: response.status().as_u16(),
            });
        }

        debug!(chat_id = %self.config.chat_id, "Message delivered");
        Ok(())
    }

    pub async fn send_report(&self, report: &str) -> Result<(), SinkError> {
        self.send_message(report, "Markdown").await
    }

    pub async fn send_alert(&self, alert: &str) -> Result<(), SinkError> {
        self.send_message(&format!("🚨 **ALERT**\n\n{}", alert), "Markdown")
            .await
    }

    /// Check credentials and chat permissions: getMe, then a test message.
    pub async fn test_connection(&self) -> Result<String, SinkError> {
        let response = self
            .client
            .get(self.endpoint("getMe"))
            .send()
            .await
            .map_err(|e| SinkError::Network {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SinkError::Api {
                status: response.status().as_u16(),
            });
        }

        let body: GetMeResponse = response.json().await.map_err(|e| SinkError::Network {
            reason: e.to_string(),
        })?;
        let username = body
            .result
            .and_then(|b| b.username)
            .unwrap_or_else(|| "Unknown".to_string());

        info!(bot = %username, "Bot connected");
        self.send_message("✅ Bot connection test successful!", "Markdown")
            .await?;
        Ok(username)
    }
}

pub fn notification_channel() -> (
    mpsc::UnboundedSender<Notification>,
    mpsc::UnboundedReceiver<Notification>,
) {
    mpsc::unbounded_channel()
}

/// Asynchronous notification dispatcher.
///
/// Spawned as a background tokio task, it reads from the notification
/// channel and delivers one message at a time. Returns when all senders are
/// dropped.
pub struct NotificationDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    client: TelegramClient,
}

impl NotificationDispatcher {
    pub fn new(rx: mpsc::UnboundedReceiver<Notification>, client: TelegramClient) -> Self {
        Self { rx, client }
    }

    pub async fn run(mut self) {
        debug!("Notification dispatcher started");

        while let Some(notification) = self.rx.recv().await {
            let outcome = match &notification {
                Notification::Report(text) => self.client.send_report(text).await,
                Notification::Alert(text) => self.client.send_alert(text).await,
            };

            if let Err(e) = outcome {
                warn!(error = %e, "Notification delivery failed");
            }
        }

        debug!("Notification dispatcher shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(SinkConfig::new("test-token", "42").with_api_base(server.uri()))
    }

    #[tokio::test]
    async fn send_message_posts_expected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.send_message("hello", "Markdown").await.unwrap();
    }

    #[tokio::test]
    async fn send_message_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.send_message("hello", "Markdown").await.unwrap_err();
        assert!(matches!(err, SinkError::Api { status: 401 }));
    }

    #[tokio::test]
    async fn send_alert_prefixes_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_string_contains("ALERT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.send_alert("service down").await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_returns_bot_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bottest-token/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "username": "uptime_bot" },
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let username = client.test_connection().await.unwrap();
        assert_eq!(username, "uptime_bot");
    }

    #[tokio::test]
    async fn test_connection_fails_on_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bottest-token/getMe"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.test_connection().await.is_err());
    }

    #[tokio::test]
    async fn dispatcher_processes_and_shuts_down() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, rx) = notification_channel();
        let dispatcher = NotificationDispatcher::new(rx, client_for(&server));

        tx.send(Notification::Report("report body".to_string())).unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), dispatcher.run())
            .await
            .expect("Dispatcher should exit after sender is dropped");
    }

    #[tokio::test]
    async fn dispatcher_swallows_delivery_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (tx, rx) = notification_channel();
        let dispatcher = NotificationDispatcher::new(rx, client_for(&server));

        tx.send(Notification::Alert("first".to_string())).unwrap();
        tx.send(Notification::Report("second".to_string())).unwrap();
        drop(tx);

        // Both failures are logged, neither panics nor aborts the loop.
        tokio::time::timeout(Duration::from_secs(2), dispatcher.run())
            .await
            .expect("Dispatcher should drain the channel despite failures");
    }
}
