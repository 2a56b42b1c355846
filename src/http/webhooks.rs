//! Inbound webhooks.
//!
//! Each handler is stateless: validate, perform one side effect, map the
//! outcome to a status code. Validation failures never touch Slack or the
//! CRM.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::FormsConfig;
use crate::crm::NewActivity;
use crate::models::channel::has_job_token;
use crate::models::deal::field_text;
use crate::slack::api::OutboundMessage;
use crate::slack::blocks;
use crate::state::AppState;
use crate::{AppError, Result};

/// Placeholder used when the moisture-check date is not supplied.
pub const DATE_MISSING: &str = "DATE_MISSING";

const INVALID_JOB: &str = "Invalid job number";
const POST_FAILED: &str = "Slack post failed";

/// Body of `/trigger-mc-form`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoistureTrigger {
    /// Job number, which is also the channel name.
    #[serde(default)]
    pub job_number: Option<String>,
    /// Moisture-check sequence number; number or numeric string.
    #[serde(default)]
    pub mc_count: Option<Value>,
    /// Date shown in the message title.
    #[serde(default)]
    pub form_date: Option<String>,
}

/// Body of `/send-closeout-message`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseoutTrigger {
    /// Job number, which is also the channel name.
    #[serde(default)]
    pub job_number: Option<String>,
}

/// A validated webhook job number and the channel it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    /// Job number as sent, trimmed; used in message text and form links.
    pub job_number: String,
    /// Lowercased job number; Slack channel names are lowercase.
    pub channel: String,
}

/// Validate a job number and derive the target channel from it.
///
/// # Errors
///
/// Returns `AppError::Validation` when the value is missing or does not
/// carry the job token.
pub fn job_target(job_number: Option<&str>) -> Result<JobTarget> {
    match job_number.map(str::trim) {
        Some(job) if has_job_token(job) => Ok(JobTarget {
            job_number: job.to_owned(),
            channel: job.to_lowercase(),
        }),
        _ => Err(AppError::Validation(INVALID_JOB.into())),
    }
}

/// Moisture-check count, defaulting to 1 for absent or unreadable values.
fn mc_count(raw: Option<&Value>) -> u32 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

/// Text and link of the moisture-check message for a job.
#[must_use]
pub fn moisture_message(forms: &FormsConfig, job: &str, count: u32, date: &str) -> String {
    let link = blocks::moisture_form_link(forms, job);
    blocks::moisture_check_message(job, count, date, &link)
}

async fn post_text(state: &AppState, channel: String, text: String) -> Response {
    match state
        .chat
        .post_message(OutboundMessage::plain(&channel, text))
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => {
            error!(channel, %err, "webhook post failed");
            (StatusCode::INTERNAL_SERVER_ERROR, POST_FAILED).into_response()
        }
    }
}

/// `POST /trigger-mc-form`.
pub async fn trigger_mc_form(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<MoistureTrigger>, JsonRejection>,
) -> Response {
    let Ok(Json(trigger)) = body else {
        return (StatusCode::BAD_REQUEST, INVALID_JOB).into_response();
    };
    let target = match job_target(trigger.job_number.as_deref()) {
        Ok(target) => target,
        Err(err) => {
            warn!(%err, job_number = ?trigger.job_number, "rejected moisture trigger");
            return (StatusCode::BAD_REQUEST, INVALID_JOB).into_response();
        }
    };

    let count = mc_count(trigger.mc_count.as_ref());
    let date = trigger
        .form_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DATE_MISSING);
    let text = moisture_message(&state.config.forms, &target.job_number, count, date);

    info!(channel = target.channel, count, date, "posting moisture check form");
    let response = post_text(&state, target.channel, text).await;
    if response.status().is_success() {
        (StatusCode::OK, "Moisture form posted").into_response()
    } else {
        response
    }
}

/// `POST /send-closeout-message`.
pub async fn send_closeout_message(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CloseoutTrigger>, JsonRejection>,
) -> Response {
    let Ok(Json(trigger)) = body else {
        return (StatusCode::BAD_REQUEST, INVALID_JOB).into_response();
    };
    let Ok(target) = job_target(trigger.job_number.as_deref()) else {
        warn!(job_number = ?trigger.job_number, "rejected closeout trigger");
        return (StatusCode::BAD_REQUEST, INVALID_JOB).into_response();
    };

    let text = blocks::closeout_message(&target.job_number);
    info!(channel = target.channel, "posting closeout message");
    let response = post_text(&state, target.channel, text).await;
    if response.status().is_success() {
        (StatusCode::OK, "Closeout message sent").into_response()
    } else {
        response
    }
}

/// Deal ID from a webhook `current` object; numbers and numeric strings.
fn webhook_deal_id(current: &Value) -> Option<u64> {
    match current.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `POST /deal-created-task`.
///
/// Unmatched service types are expected and answered with 200 `skipped`.
pub async fn deal_created_task(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = body else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": "invalid" }))).into_response();
    };
    let current = payload.get("current").unwrap_or(&Value::Null);
    let Some(deal_id) = webhook_deal_id(current) else {
        warn!("deal-created payload without current.id");
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": "invalid" }))).into_response();
    };

    let service = field_text(current.get(state.config.crm.service_type_field.as_str()));
    let Some(service) = service.filter(|s| state.config.is_allowlisted_service(s)) else {
        info!(deal_id, "service type not allowlisted; skipping");
        return (StatusCode::OK, Json(json!({ "status": "skipped" }))).into_response();
    };

    let activity = NewActivity {
        subject: state.config.crm.activity_subject.clone(),
        activity_type: state.config.crm.activity_type.clone(),
        due_date: Local::now().date_naive(),
        deal_id,
    };
    match state.crm.create_activity(activity).await {
        Ok(activity_id) => {
            info!(deal_id, service, activity_id, "follow-up activity created");
            (
                StatusCode::OK,
                Json(json!({ "status": "created", "activity_id": activity_id })),
            )
                .into_response()
        }
        Err(err) => {
            error!(deal_id, %err, "activity creation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error" })),
            )
                .into_response()
        }
    }
}
