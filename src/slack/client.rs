//! Slack Web API client.
//!
//! Conversation, message and user calls go through `slack-morphism`. Pins
//! are not covered by the SDK and are called directly over `reqwest`
//! against the same Web API with the bot token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsHistoryRequest,
    SlackApiConversationsInfoRequest, SlackApiConversationsInviteRequest,
    SlackApiConversationsJoinRequest, SlackApiToken, SlackApiTokenType, SlackApiTokenValue,
    SlackApiUsersInfoRequest, SlackChannelId, SlackClient, SlackClientHyperHttpsConnector,
    SlackClientSession, SlackMessageContent, SlackUserId,
};
use tracing::{debug, info};

use crate::slack::api::{ChatApi, ChatFuture, OutboundMessage};
use crate::{config::SlackConfig, AppError, Result};

/// Bound an SDK call by `limit`; expiry is reported as that call's failure.
async fn bounded<T, F>(method: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, SlackClientError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(|err| slack_error(&format!("{method} failed"), err)),
        Err(_) => Err(AppError::Slack(format!(
            "{method} timed out after {}s",
            limit.as_secs()
        ))),
    }
}

/// First non-blank of real name, display name and handle, else a mention.
fn pick_display_name(
    real_name: Option<&str>,
    display_name: Option<&str>,
    handle: Option<&str>,
    user: &str,
) -> String {
    [real_name, display_name, handle]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map_or_else(|| format!("<@{user}>"), str::to_owned)
}

/// Map an SDK error onto the application error, keeping Slack's error code.
fn slack_error(context: &str, err: SlackClientError) -> AppError {
    match err {
        SlackClientError::ApiError(api) => AppError::SlackApi(api.code),
        other => AppError::Slack(format!("{context}: {other}")),
    }
}

/// Generic Web API envelope used for the pin endpoints.
#[derive(Debug, Deserialize)]
struct WebApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    items: Vec<PinnedItem>,
}

#[derive(Debug, Deserialize)]
struct PinnedItem {
    #[serde(default)]
    message: Option<PinnedMessage>,
}

#[derive(Debug, Deserialize)]
struct PinnedMessage {
    #[serde(default)]
    text: Option<String>,
}

impl WebApiEnvelope {
    fn check(self) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(AppError::SlackApi(
                self.error.unwrap_or_else(|| "unknown_error".into()),
            ))
        }
    }
}

/// Slack Web API wrapper authenticated with the bot token.
pub struct SlackService {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    http: reqwest::Client,
    api_base_url: String,
    timeout: Duration,
}

impl SlackService {
    /// Build the Slack client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector or the pin client
    /// cannot be created.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        crate::install_crypto_provider();
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Slack(format!("failed to build http client: {err}")))?;

        info!("slack web api client ready");

        Ok(Self {
            client,
            bot_token,
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            timeout: config.timeout(),
        })
    }

    /// Create an HTTP session for direct API calls using the bot token.
    #[must_use]
    pub fn http_session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }

    /// Resolve the bot's own user ID via `auth.test`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if the call fails.
    pub async fn resolve_bot_user_id(&self) -> Result<String> {
        let session = self.http_session();
        let response = bounded("auth.test", self.timeout, session.auth_test()).await?;
        Ok(response.user_id.to_string())
    }

    fn web_api_url(&self, method: &str) -> Result<Url> {
        Url::parse(&format!("{}/{method}", self.api_base_url))
            .map_err(|err| AppError::Slack(format!("invalid slack api url: {err}")))
    }

    async fn read_envelope(response: reqwest::Response, method: &str) -> Result<WebApiEnvelope> {
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Slack(format!("{method}: http {status}")));
        }
        response
            .json::<WebApiEnvelope>()
            .await
            .map_err(|err| AppError::Slack(format!("{method}: unreadable response: {err}")))?
            .check()
    }
}

impl ChatApi for SlackService {
    fn channel_name<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, String> {
        Box::pin(async move {
            let request = SlackApiConversationsInfoRequest::new(SlackChannelId(channel.to_owned()));
            let session = self.http_session();
            let response = bounded(
                "conversations.info",
                self.timeout,
                session.conversations_info(&request),
            )
            .await?;
            response
                .channel
                .name
                .ok_or_else(|| AppError::NotFound(format!("channel {channel} has no name")))
        })
    }

    fn post_message(&self, message: OutboundMessage) -> ChatFuture<'_, String> {
        Box::pin(async move {
            let channel = message.channel;
            let mut content = SlackMessageContent::new().with_text(message.text);
            if let Some(blocks) = message.blocks {
                content = content.with_blocks(blocks);
            }
            let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel.clone()), content);
            let session = self.http_session();
            let response = bounded(
                "chat.postMessage",
                self.timeout,
                session.chat_post_message(&request),
            )
            .await?;
            debug!(channel, ts = %response.ts, "sent slack message");
            Ok(response.ts.to_string())
        })
    }

    fn pin_message<'a>(&'a self, channel: &'a str, ts: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let response = self
                .http
                .post(self.web_api_url("pins.add")?)
                .bearer_auth(&self.bot_token.token_value.0)
                .json(&serde_json::json!({ "channel": channel, "timestamp": ts }))
                .send()
                .await
                .map_err(|err| AppError::Slack(format!("pins.add failed: {err}")))?;
            Self::read_envelope(response, "pins.add").await?;
            Ok(())
        })
    }

    fn invite_user<'a>(&'a self, channel: &'a str, user: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiConversationsInviteRequest::new(
                SlackChannelId(channel.to_owned()),
                vec![SlackUserId(user.to_owned())],
            );
            let session = self.http_session();
            bounded(
                "conversations.invite",
                self.timeout,
                session.conversations_invite(&request),
            )
            .await?;
            Ok(())
        })
    }

    fn join_channel<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiConversationsJoinRequest::new(SlackChannelId(channel.to_owned()));
            let session = self.http_session();
            bounded(
                "conversations.join",
                self.timeout,
                session.conversations_join(&request),
            )
            .await?;
            Ok(())
        })
    }

    fn user_display_name<'a>(&'a self, user: &'a str) -> ChatFuture<'a, String> {
        Box::pin(async move {
            let request = SlackApiUsersInfoRequest::new(SlackUserId(user.to_owned()));
            let session = self.http_session();
            let response =
                bounded("users.info", self.timeout, session.users_info(&request)).await?;
            let profile = response.user.profile.as_ref();
            Ok(pick_display_name(
                profile.and_then(|p| p.real_name.as_deref()),
                profile.and_then(|p| p.display_name.as_deref()),
                response.user.name.as_deref(),
                user,
            ))
        })
    }

    fn recent_message_texts<'a>(
        &'a self,
        channel: &'a str,
        limit: u16,
    ) -> ChatFuture<'a, Vec<String>> {
        Box::pin(async move {
            let request = SlackApiConversationsHistoryRequest::new()
                .with_channel(SlackChannelId(channel.to_owned()))
                .with_limit(limit);
            let session = self.http_session();
            let response = bounded(
                "conversations.history",
                self.timeout,
                session.conversations_history(&request),
            )
            .await?;
            Ok(response
                .messages
                .into_iter()
                .filter_map(|msg| msg.content.text)
                .collect())
        })
    }

    fn pinned_message_texts<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut url = self.web_api_url("pins.list")?;
            url.query_pairs_mut().append_pair("channel", channel);
            let response = self
                .http
                .get(url)
                .bearer_auth(&self.bot_token.token_value.0)
                .send()
                .await
                .map_err(|err| AppError::Slack(format!("pins.list failed: {err}")))?;
            let envelope = Self::read_envelope(response, "pins.list").await?;
            Ok(envelope
                .items
                .into_iter()
                .filter_map(|item| item.message.and_then(|m| m.text))
                .collect())
        })
    }
}
