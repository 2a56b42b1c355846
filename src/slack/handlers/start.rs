//! Intake triggers: channel joins and the `/start` command.
//!
//! Both paths consult the [`IdempotencyGuard`](crate::orchestrator::guard::IdempotencyGuard)
//! before running the workflow. Joins additionally wait for the configured
//! settle delay so Slack's own channel setup finishes first.

use std::sync::Arc;

use tracing::{debug, info};

use crate::models::channel::has_job_token;
use crate::orchestrator::guard::Admission;
use crate::orchestrator::intake::IntakeOutcome;
use crate::state::AppState;
use crate::Result;

/// Slack's built-in bot user; its joins never start the workflow.
pub const SLACKBOT_USER_ID: &str = "USLACKBOT";

/// What a trigger led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResult {
    /// The trigger does not concern a job channel.
    Ignored,
    /// The guard suppressed the run.
    Suppressed(Admission),
    /// The workflow ran.
    Ran(IntakeOutcome),
}

/// Handle a `member_joined_channel` event.
///
/// # Errors
///
/// Returns an error if the channel cannot be resolved or the workflow
/// aborts.
pub async fn handle_member_joined(
    state: &Arc<AppState>,
    channel_id: &str,
    user_id: &str,
) -> Result<StartResult> {
    if user_id == SLACKBOT_USER_ID {
        debug!(channel_id, "slackbot joined; ignored");
        return Ok(StartResult::Ignored);
    }

    let name = state.chat.channel_name(channel_id).await?;
    if !has_job_token(&name) {
        debug!(channel_id, channel_name = %name, "not a job channel; ignored");
        return Ok(StartResult::Ignored);
    }

    let admission = state.guard.admit(channel_id).await;
    if !admission.is_proceed() {
        return Ok(StartResult::Suppressed(admission));
    }

    let delay = state.config.intake.join_delay();
    info!(channel_id, user_id, delay_secs = delay.as_secs(), "member joined; intake scheduled");
    tokio::time::sleep(delay).await;

    state.intake.run(channel_id).await.map(StartResult::Ran)
}

/// Handle the `/start` slash command for a channel.
///
/// # Errors
///
/// Returns an error if the workflow aborts.
pub async fn handle_start_command(state: &Arc<AppState>, channel_id: &str) -> Result<StartResult> {
    let admission = state.guard.admit(channel_id).await;
    if !admission.is_proceed() {
        return Ok(StartResult::Suppressed(admission));
    }

    info!(channel_id, "intake started by command");
    state.intake.run(channel_id).await.map(StartResult::Ran)
}
