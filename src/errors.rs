//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Slack Web API error codes that mean "the requested membership already holds".
const ALREADY_MEMBER_CODES: &[&str] = &["already_in_channel", "cant_invite_self"];

/// Slack Web API error codes that mean the bot lacks the rights to invite.
const PERMISSION_CODES: &[&str] = &[
    "not_in_channel",
    "restricted_action",
    "missing_scope",
    "not_allowed_token_type",
    "user_is_restricted",
    "ura_max_channels",
    "cant_invite",
];

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Slack transport failure (connector, network, unexpected payload).
    Slack(String),
    /// Slack Web API answered `ok: false` with the given error code.
    SlackApi(String),
    /// CRM request or response failure.
    Crm(String),
    /// Inbound payload failed validation.
    Validation(String),
    /// HTTP listener failure.
    Http(String),
    /// Requested entity does not exist.
    NotFound(String),
}

impl AppError {
    /// Slack error code when this is a Web API rejection.
    #[must_use]
    pub fn slack_code(&self) -> Option<&str> {
        match self {
            Self::SlackApi(code) => Some(code.as_str()),
            _ => None,
        }
    }

    /// `true` for rejections such as `already_in_channel` that leave the
    /// channel in the state the caller wanted.
    #[must_use]
    pub fn is_already_member(&self) -> bool {
        self.slack_code()
            .is_some_and(|code| ALREADY_MEMBER_CODES.contains(&code))
    }

    /// `true` when Slack refused the call because of missing rights.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.slack_code()
            .is_some_and(|code| PERMISSION_CODES.contains(&code))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::SlackApi(code) => write!(f, "slack api: {code}"),
            Self::Crm(msg) => write!(f, "crm: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Crm(format!("request timed out: {err}"))
        } else {
            Self::Crm(err.to_string())
        }
    }
}
