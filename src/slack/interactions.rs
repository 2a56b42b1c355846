//! Slack interactive payload ingress.
//!
//! Interactive components post a form with a single `payload` field
//! holding JSON. Only the crew-chief picker is handled.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Form;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::slack::blocks::CREW_CHIEF_ACTION_ID;
use crate::slack::handlers::crew_chief::assign_crew_chief;
use crate::state::AppState;

/// Raw interactive request body.
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    /// JSON-encoded interaction payload.
    pub payload: String,
}

/// `{ "id": ... }` reference used for channels and users.
#[derive(Debug, Deserialize)]
pub struct IdRef {
    /// Slack ID.
    pub id: String,
}

/// One action inside a `block_actions` payload.
#[derive(Debug, Deserialize)]
pub struct BlockAction {
    /// Action ID of the element.
    pub action_id: String,
    /// User chosen in a `users_select`.
    #[serde(default)]
    pub selected_user: Option<String>,
}

/// Interaction payload fields the bot reads.
#[derive(Debug, Deserialize)]
pub struct InteractionPayload {
    /// Payload type, e.g. `block_actions`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Channel the interaction happened in.
    #[serde(default)]
    pub channel: Option<IdRef>,
    /// Acting user.
    #[serde(default)]
    pub user: Option<IdRef>,
    /// Triggered actions.
    #[serde(default)]
    pub actions: Vec<BlockAction>,
}

impl InteractionPayload {
    /// `(channel, selected user)` when this is a crew-chief selection.
    #[must_use]
    pub fn crew_chief_selection(&self) -> Option<(&str, &str)> {
        if self.kind != "block_actions" {
            return None;
        }
        let channel = self.channel.as_ref()?.id.as_str();
        self.actions
            .iter()
            .find(|a| a.action_id == CREW_CHIEF_ACTION_ID)
            .and_then(|a| a.selected_user.as_deref())
            .map(|user| (channel, user))
    }
}

/// `POST /slack/interactions`.
pub async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InteractionForm>,
) -> StatusCode {
    let payload: InteractionPayload = match serde_json::from_str(&form.payload) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%err, "unreadable interaction payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some((channel, selected)) = payload.crew_chief_selection() else {
        info!(kind = %payload.kind, "unhandled interaction");
        return StatusCode::OK;
    };

    let channel = channel.to_owned();
    let selected = selected.to_owned();
    let actor = payload.user.map(|u| u.id).unwrap_or_default();
    info!(channel, selected, actor, "crew chief selected");

    tokio::spawn(async move {
        if let Err(err) = assign_crew_chief(&state, &channel, &selected).await {
            error!(channel, %err, "crew chief assignment failed");
        }
    });
    StatusCode::OK
}
