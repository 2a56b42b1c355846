//! Slack message and Block Kit builders.
//!
//! Provides the pre-filled form links posted into job channels, the
//! message texts that carry them, and the crew-chief user picker.

use serde_json::json;
use slack_morphism::prelude::SlackBlock;

use crate::config::FormsConfig;
use crate::{AppError, Result};

/// `action_id` of the crew-chief user picker.
pub const CREW_CHIEF_ACTION_ID: &str = "select_crew_chief";

/// Append `&key=value` to a pre-filled form URL, percent-encoding the value.
fn push_entry(url: &mut String, key: &str, value: &str) {
    url.push('&');
    url.push_str(key);
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}

/// Pre-filled Initial Loss Note form link.
#[must_use]
pub fn initial_loss_form_link(
    forms: &FormsConfig,
    job_number: &str,
    customer: &str,
    estimator: Option<&str>,
) -> String {
    let mut url = forms.initial_loss_url.clone();
    push_entry(&mut url, &forms.job_entry, job_number);
    push_entry(&mut url, &forms.customer_entry, customer);
    if let (Some(key), Some(name)) = (forms.estimator_entry.as_deref(), estimator) {
        push_entry(&mut url, key, name);
    }
    url
}

/// Pre-filled Moisture Check form link.
#[must_use]
pub fn moisture_form_link(forms: &FormsConfig, job_number: &str) -> String {
    let mut url = forms.moisture_check_url.clone();
    push_entry(&mut url, &forms.moisture_job_entry, job_number);
    url
}

/// Text of the Initial Loss Note message, optionally prefixed by the marker.
#[must_use]
pub fn initial_loss_message(marker: Option<&str>, job_number: &str, form_link: &str) -> String {
    let body = format!(
        "\u{1f4cb} Please fill out the *Initial Loss Note* form for *{job_number}*:\n<{form_link}|Initial Loss Note Form>"
    );
    match marker {
        Some(marker) => format!("{marker} {body}"),
        None => body,
    }
}

/// Text of the moisture-check request.
#[must_use]
pub fn moisture_check_message(
    job_number: &str,
    mc_count: u32,
    form_date: &str,
    form_link: &str,
) -> String {
    format!(
        "\u{1f9a2} Please fill out the *Moisture Check {mc_count} \u{2013} {form_date}* for *{job_number}*:\n<{form_link}|Moisture Check Form>"
    )
}

/// Text of the job closeout notice.
#[must_use]
pub fn closeout_message(job_number: &str) -> String {
    format!(
        "\u{2705} Job completed for *{job_number}*\nPlease ensure all closeout forms are sent for file packaging."
    )
}

/// Fallback text of the crew-chief prompt.
pub const CREW_CHIEF_PROMPT_TEXT: &str = "Who is the assigned \u{1f477} *Crew Chief*?";

/// Text confirming the crew-chief assignment.
#[must_use]
pub fn crew_chief_assigned_message(name: &str) -> String {
    format!("\u{1f477} Crew Chief assigned is *{name}*")
}

/// CRM note recording the crew-chief assignment.
#[must_use]
pub fn crew_chief_note(name: &str) -> String {
    format!("Crew Chief assigned is: {name}")
}

/// Notice shown when the bot may not invite the chosen crew chief.
#[must_use]
pub fn invite_denied_message(user_id: &str, code: &str) -> String {
    format!(
        "\u{26a0}\u{fe0f} I couldn't add <@{user_id}> to this channel (`{code}`). Please invite them manually."
    )
}

/// Section block with a `users_select` accessory for choosing the crew chief.
///
/// # Errors
///
/// Returns `AppError::Slack` if the block does not match the SDK's Block
/// Kit model.
pub fn crew_chief_picker() -> Result<Vec<SlackBlock>> {
    let block = json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": "Please select the *Crew Chief* for this job:" },
        "accessory": {
            "type": "users_select",
            "action_id": CREW_CHIEF_ACTION_ID,
            "placeholder": { "type": "plain_text", "text": "Select a user" }
        }
    });
    let block: SlackBlock = serde_json::from_value(block)
        .map_err(|err| AppError::Slack(format!("invalid crew chief block: {err}")))?;
    Ok(vec![block])
}
