//! HTTP API for the trigger service
//!
//! Two endpoints: POST /trigger forwards a repository-dispatch request to
//! the CI API; GET /health reports process status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared service state: the CI credentials and target repository
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    token: String,
    repo: String,
    client: reqwest::Client,
}

impl AppState {
    pub fn new(token: String, repo: String) -> Self {
        Self {
            inner: Arc::new(StateInner {
                token,
                repo,
                client: reqwest::Client::new(),
            }),
        }
    }
}

/// Builds the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/trigger", post(trigger_run))
        .route("/health", get(health_check))
        .with_state(state)
}

/// POST /trigger
/// Forwards one repository-dispatch request. Upstream failure becomes a
/// 502 with the upstream error text; no retry.
async fn trigger_run(State(state): State<AppState>) -> impl IntoResponse {
    let url = format!(
        "https://api.github.com/repos/{}/dispatches",
        state.inner.repo
    );

    let response = state
        .inner
        .client
        .post(&url)
        .header("Accept", "application/vnd.github.v3+json")
        .header("Authorization", format!("token {}", state.inner.token))
        .header("User-Agent", "giftrun-trigger")
        .json(&json!({ "event_type": "workflow_dispatch" }))
        .send()
        .await;

    match response {
        Ok(response) if response.status().is_success() => {
            info!("Dispatched run for {}", state.inner.repo);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Run dispatched",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
        }
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Dispatch rejected ({}): {}", status, body);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "error": format!("CI API error: {status} - {body}"),
                })),
            )
        }
        Err(e) => {
            error!("Dispatch request failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

/// GET /health
/// Liveness check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "repo": state.inner.repo,
        })),
    )
}
