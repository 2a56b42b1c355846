//! Slack slash command ingress.

use std::sync::Arc;

use axum::extract::State;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::slack::handlers::start::{handle_start_command, StartResult};
use crate::state::AppState;

/// Slash command form fields the bot reads.
#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    /// Command name including the slash, e.g. `/start`.
    pub command: String,
    /// Channel the command was issued in.
    pub channel_id: String,
    /// Invoking user.
    #[serde(default)]
    pub user_id: String,
}

fn ephemeral(text: &str) -> Json<Value> {
    Json(json!({ "response_type": "ephemeral", "text": text }))
}

/// `POST /slack/commands`.
///
/// Acknowledges at once; the workflow runs in a spawned task.
pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> Json<Value> {
    info!(command = %command.command, user = %command.user_id, channel = %command.channel_id, "received slash command");

    match command.command.as_str() {
        "/start" => {
            let channel = command.channel_id;
            tokio::spawn(async move {
                match handle_start_command(&state, &channel).await {
                    Ok(StartResult::Suppressed(admission)) => {
                        info!(channel, ?admission, "/start suppressed");
                    }
                    Ok(_) => {}
                    Err(err) => error!(channel, %err, "/start failed"),
                }
            });
            ephemeral("\u{23f3} Starting the intake workflow\u{2026}")
        }
        other => ephemeral(&format!("Unknown command `{other}`")),
    }
}
