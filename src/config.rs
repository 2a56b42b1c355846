//! Global configuration parsing, validation, and credential loading.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name used for credential lookups.
const KEYRING_SERVICE: &str = "computron";

/// Slack connectivity settings.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// never from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct SlackConfig {
    /// Base URL of the Slack Web API, used for the pin endpoints.
    pub api_base_url: String,
    /// Per-call timeout for Web API requests, in seconds.
    pub timeout_seconds: u64,
    /// Number of recent messages scanned for the durable marker.
    pub history_scan_limit: u16,
    /// Bot user ID; resolved via `auth.test` at startup when empty.
    pub bot_user_id: Option<String>,
    /// Request signing secret (populated at runtime).
    #[serde(skip)]
    pub signing_secret: String,
    /// Bot user token used for Web API calls (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://slack.com/api".into(),
            timeout_seconds: 10,
            history_scan_limit: 50,
            bot_user_id: None,
            signing_secret: String::new(),
            bot_token: String::new(),
        }
    }
}

/// Pipedrive connectivity and field mapping.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct CrmConfig {
    /// Base URL of the Pipedrive v1 REST API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom field key holding the estimator's name on a deal.
    pub estimator_field: Option<String>,
    /// Custom field key holding the service type on a deal.
    pub service_type_field: String,
    /// Subject line for activities created from the deal-created webhook.
    pub activity_subject: String,
    /// Pipedrive activity type key.
    pub activity_type: String,
    /// API token (populated at runtime).
    #[serde(skip)]
    pub api_token: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pipedrive.com/v1".into(),
            timeout_seconds: 10,
            estimator_field: None,
            service_type_field: "service_type".into(),
            activity_subject: "Schedule initial site inspection".into(),
            activity_type: "task".into(),
            api_token: String::new(),
        }
    }
}

impl SlackConfig {
    /// Web API call timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CrmConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Pre-filled form links posted into job channels.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct FormsConfig {
    /// Initial Loss Note form, up to and including `usp=pp_url`.
    pub initial_loss_url: String,
    /// Entry key carrying the job number.
    pub job_entry: String,
    /// Entry key carrying the customer name.
    pub customer_entry: String,
    /// Optional entry key carrying the estimator name.
    pub estimator_entry: Option<String>,
    /// Moisture Check form, up to and including `usp=pp_url`.
    pub moisture_check_url: String,
    /// Entry key carrying the job number on the moisture form.
    pub moisture_job_entry: String,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            initial_loss_url: "https://docs.google.com/forms/d/e/1FAIpQLSey29MpuufCPAn55zRTSK1ZtGF3f9411ey6vn0bQJtArCS8dw/viewform?usp=pp_url".into(),
            job_entry: "entry.703689566".into(),
            customer_entry: "entry.1275810596".into(),
            estimator_entry: None,
            moisture_check_url: "https://docs.google.com/forms/d/e/1FAIpQLSeDAvJ0Ho7gdZTBm-04PnM-dmaNiu3VpqnH4EMyiQkwQQCSuA/viewform?usp=pp_url".into(),
            moisture_job_entry: "entry.931803057".into(),
        }
    }
}

/// Intake workflow timing, guard windows and optional steps.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct IntakeConfig {
    /// Delay after a join event before the workflow runs.
    pub join_delay_seconds: u64,
    /// Window during which a second trigger for a channel is suppressed.
    pub cooldown_seconds: u64,
    /// Lifetime of the short-term duplicate-delivery guard.
    pub recent_guard_seconds: u64,
    /// Sentinel token prefixed to the form message.
    pub marker: String,
    /// Post the marker and pin the form message.
    pub durable_marker: bool,
    /// Invite the roster after the prompts are posted.
    pub auto_invite: bool,
    /// Resolve the deal's estimator for the form link and the roster.
    pub estimator_lookup: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            join_delay_seconds: 5,
            cooldown_seconds: 60,
            recent_guard_seconds: 10,
            marker: "[computron:intake]".into(),
            durable_marker: true,
            auto_invite: true,
            estimator_lookup: true,
        }
    }
}

impl IntakeConfig {
    /// Join settle delay.
    #[must_use]
    pub fn join_delay(&self) -> Duration {
        Duration::from_secs(self.join_delay_seconds)
    }

    /// Cooldown window.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Short-term guard lifetime.
    #[must_use]
    pub fn recent_guard(&self) -> Duration {
        Duration::from_secs(self.recent_guard_seconds)
    }
}

/// Users invited into every new job channel.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct RosterConfig {
    /// Slack user IDs always invited.
    pub always_invite: Vec<String>,
    /// Estimator name (as stored in the CRM) to Slack user ID.
    pub estimators: HashMap<String, String>,
}

/// Filter for the deal-created webhook.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct DealCreatedConfig {
    /// Service-type values that warrant a follow-up activity.
    pub service_allowlist: Vec<String>,
}

impl Default for DealCreatedConfig {
    fn default() -> Self {
        Self {
            service_allowlist: vec![
                "Water Mitigation".into(),
                "Mold Remediation".into(),
                "Fire Restoration".into(),
            ],
        }
    }
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP listening port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Slack connectivity settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// CRM connectivity settings.
    #[serde(default)]
    pub crm: CrmConfig,
    /// Form link templates.
    #[serde(default)]
    pub forms: FormsConfig,
    /// Intake workflow settings.
    #[serde(default)]
    pub intake: IntakeConfig,
    /// Auto-invite roster.
    #[serde(default)]
    pub roster: RosterConfig,
    /// Deal-created webhook filter.
    #[serde(default)]
    pub deal_created: DealCreatedConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            slack: SlackConfig::default(),
            crm: CrmConfig::default(),
            forms: FormsConfig::default(),
            intake: IntakeConfig::default(),
            roster: RosterConfig::default(),
            deal_created: DealCreatedConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load credentials from OS keychain with env-var fallback.
    ///
    /// The signing secret, bot token and CRM token are required. The bot
    /// user ID is optional and only filled in when not already configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required credential is missing from
    /// both the keychain and the environment.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.signing_secret =
            load_credential("slack_signing_secret", "SLACK_SIGNING_SECRET").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        self.crm.api_token = load_credential("pipedrive_api_token", "PIPEDRIVE_API_TOKEN").await?;

        if self.slack.bot_user_id.is_none() {
            self.slack.bot_user_id = load_credential("slack_bot_user_id", "SLACK_BOT_USER_ID")
                .await
                .ok();
        }
        Ok(())
    }

    /// Whether a service type is in the deal-created allowlist.
    ///
    /// Comparison ignores case and surrounding whitespace.
    #[must_use]
    pub fn is_allowlisted_service(&self, service_type: &str) -> bool {
        let wanted = service_type.trim();
        self.deal_created
            .service_allowlist
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(wanted))
    }

    fn validate(&self) -> Result<()> {
        if self.crm.timeout_seconds == 0 {
            return Err(AppError::Config(
                "crm.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.slack.timeout_seconds == 0 {
            return Err(AppError::Config(
                "slack.timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.intake.marker.trim().is_empty() {
            return Err(AppError::Config("intake.marker must not be empty".into()));
        }

        if self.forms.initial_loss_url.is_empty() || self.forms.moisture_check_url.is_empty() {
            return Err(AppError::Config("form base urls must not be empty".into()));
        }

        if self.slack.history_scan_limit == 0 {
            return Err(AppError::Config(
                "slack.history_scan_limit must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            tracing::debug!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
