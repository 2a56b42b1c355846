//! Slack Events API ingress.
//!
//! Answers the `url_verification` handshake and dispatches
//! `member_joined_channel` callbacks. Slack expects an acknowledgement
//! within three seconds, so the work runs in a spawned task and the
//! request is acknowledged immediately.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::slack::handlers::start::{handle_member_joined, StartResult};
use crate::state::AppState;

/// Outer Events API envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Endpoint verification handshake.
    UrlVerification {
        /// Value to echo back.
        challenge: String,
    },
    /// A subscribed event.
    EventCallback {
        /// The event body.
        event: CallbackEvent,
        /// Delivery ID, repeated on retries.
        #[serde(default)]
        event_id: Option<String>,
    },
    /// Anything else (rate-limit notices, app lifecycle).
    #[serde(other)]
    Other,
}

/// Event bodies the bot reacts to.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackEvent {
    /// A user joined a channel.
    MemberJoinedChannel {
        /// User who joined.
        user: String,
        /// Channel joined.
        channel: String,
    },
    /// Events the bot subscribes to but ignores.
    #[serde(other)]
    Other,
}

/// `POST /slack/events`.
pub async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<EventEnvelope>,
) -> Response {
    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("answering url verification");
            Json(json!({ "challenge": challenge })).into_response()
        }
        EventEnvelope::EventCallback {
            event: CallbackEvent::MemberJoinedChannel { user, channel },
            event_id,
        } => {
            debug!(?event_id, channel, user, "member_joined_channel received");
            tokio::spawn(async move {
                match handle_member_joined(&state, &channel, &user).await {
                    Ok(StartResult::Ran(_)) => {}
                    Ok(result) => debug!(channel, ?result, "join did not start intake"),
                    Err(err) => error!(channel, %err, "member_joined_channel handler failed"),
                }
            });
            StatusCode::OK.into_response()
        }
        EventEnvelope::EventCallback { .. } | EventEnvelope::Other => {
            debug!("event ignored");
            StatusCode::OK.into_response()
        }
    }
}

/// `GET /slack/events`; lets uptime checks probe the ingress path.
pub async fn events_probe() -> &'static str {
    "ok"
}
