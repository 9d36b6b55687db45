//! GitLab webhook handling: parse merge-request and push events, filter to
//! monitored branches, and forward a formatted notification.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use uptime_core::report::message_header;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MergeRequestPayload {
    #[serde(default)]
    pub object_attributes: ObjectAttributes,
    #[serde(default)]
    pub user: GitlabUser,
    #[serde(default)]
    pub project: GitlabProject,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectAttributes {
    pub action: Option<String>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub merge_commit_sha: Option<String>,
    pub url: Option<String>,
    pub iid: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GitlabUser {
    pub name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GitlabProject {
    pub name: Option<String>,
    pub web_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
    pub user_name: Option<String>,
    pub user_username: Option<String>,
    #[serde(default)]
    pub project: GitlabProject,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    #[serde(default)]
    pub total_commits_count: u64,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PushCommit {
    pub id: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub author: CommitAuthor,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CommitAuthor {
    pub name: Option<String>,
}

/// A merged merge request on a monitored branch.
#[derive(Debug, Clone)]
pub struct MergeEvent {
    pub title: String,
    pub description: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub author: String,
    pub author_username: String,
    pub merge_commit_sha: Option<String>,
    pub url: String,
    pub project_name: String,
    pub iid: u64,
}

/// A direct push to a monitored branch.
#[derive(Debug, Clone)]
pub struct PushEvent {
    pub branch: String,
    pub user: String,
    pub user_username: String,
    pub project_name: String,
    pub commits: Vec<PushCommit>,
    pub commit_count: usize,
    pub compare_url: Option<String>,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// POST /webhook/gitlab
///
/// Dispatches on the `X-Gitlab-Event` header. Events we do not track, and
/// events for unmonitored branches, are acknowledged and dropped.
pub async fn gitlab_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let event_type = headers
        .get("x-gitlab-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let notification = match event_type {
        "Merge Request Hook" => {
            let payload: MergeRequestPayload = serde_json::from_str(&body)
                .map_err(|e| ApiError::BadRequest(format!("invalid merge request payload: {}", e)))?;
            parse_merge_request(&payload, &state.monitored_branches)
                .map(|event| format_merge_notification(&event))
        }
        "Push Hook" => {
            let payload: PushPayload = serde_json::from_str(&body)
                .map_err(|e| ApiError::BadRequest(format!("invalid push payload: {}", e)))?;
            parse_push(&payload, &state.monitored_branches)
                .map(|event| format_push_notification(&event))
        }
        _ => None,
    };

    match notification {
        Some(text) => {
            state
                .notifier
                .send_message(&text, "Markdown")
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(Json(WebhookResponse { status: "success" }))
        }
        None => Ok(Json(WebhookResponse { status: "ignored" })),
    }
}

pub fn parse_merge_request(
    payload: &MergeRequestPayload,
    monitored: &[String],
) -> Option<MergeEvent> {
    let attrs = &payload.object_attributes;

    // Only completed merges are interesting.
    if attrs.action.as_deref() != Some("merge") && attrs.state.as_deref() != Some("merged") {
        return None;
    }

    let target_branch = attrs.target_branch.clone()?;
    if !monitored.iter().any(|b| b == &target_branch) {
        info!(branch = %target_branch, "Ignoring merge to unmonitored branch");
        return None;
    }

    Some(MergeEvent {
        title: attrs.title.clone().unwrap_or_default(),
        description: attrs.description.clone().filter(|d| !d.is_empty()),
        source_branch: attrs.source_branch.clone().unwrap_or_default(),
        target_branch,
        author: payload.user.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        author_username: payload.user.username.clone().unwrap_or_default(),
        merge_commit_sha: attrs.merge_commit_sha.clone().filter(|s| !s.is_empty()),
        url: attrs.url.clone().unwrap_or_default(),
        project_name: payload.project.name.clone().unwrap_or_default(),
        iid: attrs.iid.unwrap_or(0),
    })
}

pub fn parse_push(payload: &PushPayload, monitored: &[String]) -> Option<PushEvent> {
    let git_ref = payload.git_ref.as_deref()?;
    let branch = git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref).to_string();

    if !monitored.iter().any(|b| b == &branch) {
        info!(branch = %branch, "Ignoring push to unmonitored branch");
        return None;
    }

    // Zero commits means a branch deletion, nothing to report.
    if payload.total_commits_count == 0 {
        return None;
    }

    let compare_url = match (
        payload.project.web_url.as_deref(),
        payload.before.as_deref(),
        payload.after.as_deref(),
    ) {
        (Some(web_url), Some(before), Some(after)) => {
            Some(format!("{}/compare/{}...{}", web_url, before, after))
        }
        _ => None,
    };

    Some(PushEvent {
        branch,
        user: payload.user_name.clone().unwrap_or_else(|| "Unknown".to_string()),
        user_username: payload.user_username.clone().unwrap_or_default(),
        project_name: payload.project.name.clone().unwrap_or_default(),
        commit_count: payload.commits.len(),
        commits: payload.commits.iter().take(5).cloned().collect(),
        compare_url,
    })
}

pub fn format_merge_notification(event: &MergeEvent) -> String {
    let mut message = message_header("🔀 **Merge Request Completed**");

    message.push_str(&format!("📋 **{}**\n", event.title));
    message.push_str(&format!("🔗 [MR !{}]({})\n\n", event.iid, event.url));

    message.push_str(&format!("📦 Project: **{}**\n", event.project_name));
    message.push_str(&format!(
        "🌿 `{}` → `{}`\n",
        event.source_branch, event.target_branch
    ));
    message.push_str(&format!(
        "👤 Merged by: {} (@{})\n",
        event.author, event.author_username
    ));

    if let Some(sha) = &event.merge_commit_sha {
        let short: String = sha.chars().take(8).collect();
        message.push_str(&format!("📌 Commit: `{}`\n", short));
    }

    if let Some(description) = &event.description {
        let mut desc: String = description.chars().take(200).collect();
        if description.chars().count() > 200 {
            desc.push_str("...");
        }
        message.push_str(&format!("\n💬 {}\n", desc));
    }

    let branch = event.target_branch.to_lowercase();
    if event.target_branch == "main" {
        message.push_str("\n🚀 **Production deployment may be triggered**");
    } else if branch.contains("prod") {
        message.push_str("\n🔶 **Pre-production deployment may be triggered**");
    } else if branch.contains("dev") {
        message.push_str("\n🧪 **Development deployment may be triggered**");
    }

    message
}

pub fn format_push_notification(event: &PushEvent) -> String {
    let mut message = message_header("📤 **Direct Push to Protected Branch**");

    message.push_str(&format!("📦 Project: **{}**\n", event.project_name));
    message.push_str(&format!("🌿 Branch: `{}`\n", event.branch));
    message.push_str(&format!(
        "👤 Pushed by: {} (@{})\n",
        event.user, event.user_username
    ));
    message.push_str(&format!("📊 Commits: {}\n\n", event.commit_count));

    if !event.commits.is_empty() {
        message.push_str("**Recent commits:**\n");
        for commit in &event.commits {
            let short: String = commit.id.as_deref().unwrap_or("").chars().take(8).collect();
            let first_line: String = commit
                .message
                .as_deref()
                .unwrap_or("")
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(60)
                .collect();
            let author = commit.author.name.as_deref().unwrap_or("Unknown");
            message.push_str(&format!("• `{}` {} - {}\n", short, first_line, author));
        }
    }

    if let Some(compare_url) = &event.compare_url {
        message.push_str(&format!("\n🔗 [View changes]({})\n", compare_url));
    }

    message
}
