//! HTTP listener hosting the Slack ingress routes and the webhooks.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::http::webhooks;
use crate::slack::{commands, events, interactions};
use crate::state::AppState;
use crate::{AppError, Result};

/// Body returned by `GET /`.
pub const ALIVE_TEXT: &str = "Computron is alive!";

async fn alive() -> &'static str {
    ALIVE_TEXT
}

/// Handler for `GET /health`.
async fn health() -> &'static str {
    "ok"
}

/// Build the application router.
///
/// `POST /` is an alias of `/slack/events` so an app whose request URL
/// points at the root keeps working.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(alive).post(events::handle_event))
        .route("/health", get(health))
        .route(
            "/slack/events",
            get(events::events_probe).post(events::handle_event),
        )
        .route("/slack/commands", post(commands::handle_command))
        .route("/slack/interactions", post(interactions::handle_interaction))
        .route("/trigger-mc-form", post(webhooks::trigger_mc_form))
        .route("/send-closeout-message", post(webhooks::send_closeout_message))
        .route("/deal-created-task", post(webhooks::deal_created_task))
        .with_state(state)
}

/// Serve the router on `0.0.0.0:<http_port>` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Http` if the listener cannot bind or the server
/// fails.
pub async fn serve_http(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Http(format!("failed to bind {bind}: {err}")))?;

    info!(%bind, "computron listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Http(format!("server error: {err}")))?;

    info!("http listener shut down");
    Ok(())
}
