use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use uptime_core::report::format_summary;
use uptime_core::ProbeResult;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// GET /health
///
/// Liveness of the monitor process itself, not of the monitored endpoints.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "uptime-monitor",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct CheckHealthResponse {
    pub status: &'static str,
    pub results: Vec<ProbeResult>,
}

/// GET /check-health
///
/// Probes every endpoint once and returns the raw results. Status memory is
/// owned by the scheduled cycle and stays untouched. The report is forwarded
/// to the sink; delivery failure does not fail the request.
pub async fn check_health(State(state): State<AppState>) -> Json<CheckHealthResponse> {
    let results = state.monitor.probe_all().await;
    let report = format_summary(&results, true);

    if let Err(e) = state.notifier.send_report(&report).await {
        warn!(error = %e, "Failed to forward manual health report");
    }

    Json(CheckHealthResponse {
        status: "success",
        results,
    })
}

#[derive(Debug, Deserialize)]
pub struct DeploymentPayload {
    pub project: Option<String>,
    pub branch: Option<String>,
    pub environment: Option<String>,
    pub status: Option<String>,
    pub user: Option<String>,
    pub pipeline_url: Option<String>,
    pub commit_sha: Option<String>,
    pub commit_message: Option<String>,
}

#[derive(Serialize)]
pub struct MessageSentResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// POST /notify/deployment
pub async fn deployment(
    State(state): State<AppState>,
    Json(payload): Json<DeploymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let message = format_deployment(&payload);

    state
        .notifier
        .send_message(&message, "Markdown")
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        project = payload.project.as_deref().unwrap_or("Unknown Project"),
        environment = payload.environment.as_deref().unwrap_or("Unknown"),
        "Deployment notification sent"
    );
    Ok(Json(MessageSentResponse {
        status: "success",
        message: "Deployment notification sent",
    }))
}

fn format_deployment(payload: &DeploymentPayload) -> String {
    let project = payload.project.as_deref().unwrap_or("Unknown Project");
    let branch = payload.branch.as_deref().unwrap_or("unknown");
    let environment = payload.environment.as_deref().unwrap_or("Unknown");
    let status = payload.status.as_deref().unwrap_or("unknown").to_lowercase();
    let user = payload.user.as_deref().unwrap_or("Unknown");

    let (status_emoji, status_text) = match status.as_str() {
        "success" => ("✅", "SUCCESSFUL".to_string()),
        "failed" => ("❌", "FAILED".to_string()),
        "running" => ("🔄", "IN PROGRESS".to_string()),
        other => ("⚠️", other.to_uppercase()),
    };

    let mut message = format!("{} **Deployment {}**\n\n", status_emoji, status_text);
    message.push_str(&format!("📦 Project: **{}**\n", project));
    message.push_str(&format!("🎯 Environment: **{}**\n", environment));
    message.push_str(&format!("🌿 Branch: `{}`\n", branch));
    message.push_str(&format!("👤 By: {}\n", user));

    if let Some(sha) = payload.commit_sha.as_deref().filter(|s| !s.is_empty()) {
        let short: String = sha.chars().take(8).collect();
        message.push_str(&format!("📌 Commit: `{}`\n", short));
    }

    if let Some(commit_message) = payload.commit_message.as_deref().filter(|s| !s.is_empty()) {
        let first_line: String = commit_message
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(100)
            .collect();
        message.push_str(&format!("💬 {}\n", first_line));
    }

    if let Some(url) = payload.pipeline_url.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!("\n🔗 [View Pipeline]({})", url));
    }

    message
}

#[derive(Debug, Deserialize)]
pub struct CustomMessagePayload {
    pub message: Option<String>,
    pub parse_mode: Option<String>,
}

/// POST /notify/message
pub async fn custom_message(
    State(state): State<AppState>,
    Json(payload): Json<CustomMessagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let message = payload
        .message
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("message field is required".to_string()))?;
    let parse_mode = payload.parse_mode.as_deref().unwrap_or("Markdown");

    state
        .notifier
        .send_message(message, parse_mode)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Custom message sent");
    Ok(Json(MessageSentResponse {
        status: "success",
        message: "Message sent",
    }))
}

#[derive(Debug, Deserialize)]
pub struct TestWebhookPayload {
    pub message: Option<String>,
}

/// POST /webhook/test
pub async fn test_webhook(
    State(state): State<AppState>,
    Json(payload): Json<TestWebhookPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let text = payload
        .message
        .unwrap_or_else(|| "Test webhook received!".to_string());

    state
        .notifier
        .send_message(&format!("🧪 **Test Webhook**\n\n{}", text), "Markdown")
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(MessageSentResponse {
        status: "success",
        message: "Test notification sent",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> DeploymentPayload {
        DeploymentPayload {
            project: Some("Billing".to_string()),
            branch: Some("main".to_string()),
            environment: Some("Production".to_string()),
            status: Some("success".to_string()),
            user: Some("Kim".to_string()),
            pipeline_url: Some("https://gitlab.example.com/p/1".to_string()),
            commit_sha: Some("abcdef0123456789".to_string()),
            commit_message: Some("Fix rounding\n\nLong body".to_string()),
        }
    }

    #[test]
    fn deployment_message_for_success() {
        let message = format_deployment(&payload());
        assert!(message.starts_with("✅ **Deployment SUCCESSFUL**"));
        assert!(message.contains("📦 Project: **Billing**"));
        assert!(message.contains("🌿 Branch: `main`"));
        assert!(message.contains("📌 Commit: `abcdef01`"));
        assert!(message.contains("💬 Fix rounding"));
        assert!(!message.contains("Long body"));
        assert!(message.contains("[View Pipeline](https://gitlab.example.com/p/1)"));
    }

    #[test]
    fn deployment_message_for_failure() {
        let mut p = payload();
        p.status = Some("failed".to_string());
        let message = format_deployment(&p);
        assert!(message.starts_with("❌ **Deployment FAILED**"));
    }

    #[test]
    fn deployment_message_for_unknown_status() {
        let mut p = payload();
        p.status = Some("canceled".to_string());
        let message = format_deployment(&p);
        assert!(message.starts_with("⚠️ **Deployment CANCELED**"));
    }

    #[test]
    fn deployment_message_defaults() {
        let p = DeploymentPayload {
            project: None,
            branch: None,
            environment: None,
            status: None,
            user: None,
            pipeline_url: None,
            commit_sha: None,
            commit_message: None,
        };
        let message = format_deployment(&p);
        assert!(message.contains("**Deployment UNKNOWN**"));
        assert!(message.contains("📦 Project: **Unknown Project**"));
        assert!(!message.contains("📌 Commit:"));
        assert!(!message.contains("View Pipeline"));
    }
}
