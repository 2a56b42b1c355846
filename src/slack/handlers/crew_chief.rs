//! Crew-chief assignment from the user picker.
//!
//! The channel confirmation is the primary signal; the CRM note is
//! recorded on a best-effort basis.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::channel::extract_deal_id;
use crate::slack::api::OutboundMessage;
use crate::slack::blocks;
use crate::state::AppState;
use crate::Result;

/// What the assignment did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentOutcome {
    /// Display name of the crew chief.
    pub crew_chief: String,
    /// The crew chief is in the channel (invited now or already present).
    pub member: bool,
    /// A permission notice was posted instead of inviting.
    pub denied_notice: bool,
    /// Deal the CRM note was recorded on.
    pub noted_deal: Option<String>,
}

/// Assign `user_id` as crew chief of `channel_id`.
///
/// # Errors
///
/// Returns an error only when the confirmation message cannot be posted.
pub async fn assign_crew_chief(
    state: &Arc<AppState>,
    channel_id: &str,
    user_id: &str,
) -> Result<AssignmentOutcome> {
    let chat = &state.chat;
    let mut outcome = AssignmentOutcome::default();

    if let Err(err) = chat.join_channel(channel_id).await {
        if err.is_already_member() {
            debug!(channel_id, "bot already in channel");
        } else {
            warn!(channel_id, %err, "bot could not join channel");
        }
    }

    match chat.invite_user(channel_id, user_id).await {
        Ok(()) => outcome.member = true,
        Err(err) if err.is_already_member() => outcome.member = true,
        Err(err) if err.is_permission_denied() => {
            warn!(channel_id, user_id, %err, "not permitted to invite crew chief");
            let code = err.slack_code().unwrap_or("permission_denied");
            let notice = blocks::invite_denied_message(user_id, code);
            match chat.post_message(OutboundMessage::plain(channel_id, notice)).await {
                Ok(_) => outcome.denied_notice = true,
                Err(err) => warn!(channel_id, %err, "failed to post invite notice"),
            }
        }
        Err(err) => warn!(channel_id, user_id, %err, "crew chief invite failed"),
    }

    outcome.crew_chief = match chat.user_display_name(user_id).await {
        Ok(name) => name,
        Err(err) => {
            debug!(user_id, %err, "users.info failed; using mention");
            format!("<@{user_id}>")
        }
    };

    chat.post_message(OutboundMessage::plain(
        channel_id,
        blocks::crew_chief_assigned_message(&outcome.crew_chief),
    ))
    .await?;
    info!(channel_id, user_id, crew_chief = %outcome.crew_chief, "crew chief assigned");

    outcome.noted_deal = record_note(state, channel_id, &outcome.crew_chief).await;
    Ok(outcome)
}

async fn record_note(state: &Arc<AppState>, channel_id: &str, crew_chief: &str) -> Option<String> {
    let name = match state.chat.channel_name(channel_id).await {
        Ok(name) => name,
        Err(err) => {
            warn!(channel_id, %err, "cannot resolve channel for crm note");
            return None;
        }
    };
    let deal_id = extract_deal_id(&name)?;

    match state
        .crm
        .create_note(&deal_id, &blocks::crew_chief_note(crew_chief))
        .await
    {
        Ok(()) => {
            info!(deal_id, "crew chief logged to deal");
            Some(deal_id)
        }
        Err(err) => {
            warn!(deal_id, %err, "failed to log crew chief to crm");
            None
        }
    }
}
