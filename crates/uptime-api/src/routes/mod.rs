pub mod gitlab;
pub mod notify;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(notify::health))
        .route("/check-health", get(notify::check_health))
        .route("/notify/deployment", post(notify::deployment))
        .route("/notify/message", post(notify::custom_message))
        .route("/webhook/test", post(notify::test_webhook))
        .route("/webhook/gitlab", post(gitlab::gitlab_webhook))
}
