//! Job channel identity and deal-number extraction.

use std::sync::LazyLock;

use regex::Regex;

/// Label used in messages when a channel does not follow the naming convention.
pub const UNKNOWN_JOB: &str = "UNKNOWN";

/// Naming token every job channel and job number carries.
pub const JOB_TOKEN: &str = "deal";

static DEAL_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)deal(\d+)").unwrap_or_else(|_| unreachable!("static pattern compiles"))
});

/// Extract the CRM deal ID from a channel name such as `deal4821`.
///
/// Returns the digits that immediately follow the first `deal` (any case)
/// that is followed by at least one digit.
#[must_use]
pub fn extract_deal_id(channel_name: &str) -> Option<String> {
    DEAL_ID_PATTERN
        .captures(channel_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Whether a channel name or job number contains the job naming token.
#[must_use]
pub fn has_job_token(value: &str) -> bool {
    value.to_lowercase().contains(JOB_TOKEN)
}

/// A Slack channel resolved for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Slack channel ID.
    pub channel_id: String,
    /// Channel name without the leading `#`.
    pub channel_name: String,
    /// Deal ID derived from the name, if any.
    pub deal_id: Option<String>,
}

impl ChannelRecord {
    /// Build a record and derive the deal ID from the name.
    #[must_use]
    pub fn new(channel_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        let channel_name = channel_name.into();
        let deal_id = extract_deal_id(&channel_name);
        Self {
            channel_id: channel_id.into(),
            channel_name,
            deal_id,
        }
    }

    /// Job number shown to humans: the channel name, or [`UNKNOWN_JOB`].
    #[must_use]
    pub fn job_label(&self) -> &str {
        if self.deal_id.is_some() {
            &self.channel_name
        } else {
            UNKNOWN_JOB
        }
    }
}
