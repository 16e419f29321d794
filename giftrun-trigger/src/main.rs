//! Giftrun Trigger
//!
//! Tiny HTTP service that forwards a button press to the CI system's
//! repository-dispatch endpoint, so a run can be started from anywhere
//! without credentials on the client. Stateless, synchronous, single
//! attempt, no retry.

pub mod api;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "giftrun_trigger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting giftrun trigger service");

    // Missing token is a fatal precondition: without it every dispatch
    // would fail, so refuse to start at all.
    let token = std::env::var("DISPATCH_TOKEN")
        .map_err(|_| anyhow::anyhow!("DISPATCH_TOKEN environment variable is required"))?;
    let repo =
        std::env::var("DISPATCH_REPO").unwrap_or_else(|_| "example/giftrun".to_string());

    let state = api::AppState::new(token, repo.clone());
    let app = api::create_router(state);

    let addr = std::env::var("TRIGGER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    tracing::info!("Listening on {} (repository: {})", addr, repo);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;
    Ok(())
}
