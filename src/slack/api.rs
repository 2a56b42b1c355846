//! Chat platform abstraction used by the workflow and handlers.
//!
//! [`SlackService`](crate::slack::client::SlackService) implements
//! [`ChatApi`] against the Slack Web API; tests substitute a recording
//! double so handler sequencing can be asserted without a workspace.

use std::future::Future;
use std::pin::Pin;

use slack_morphism::prelude::SlackBlock;

use crate::Result;

/// Boxed future returned by [`ChatApi`] methods.
pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Message to be delivered via `chat.postMessage`.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Channel ID or channel name.
    pub channel: String,
    /// Message text (also the notification fallback when blocks are set).
    pub text: String,
    /// Optional Block Kit layout.
    pub blocks: Option<Vec<SlackBlock>>,
}

impl OutboundMessage {
    /// Create a plain-text message for a channel.
    pub fn plain(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            blocks: None,
        }
    }

    /// Attach a Block Kit layout.
    #[must_use]
    pub fn with_blocks(mut self, blocks: Vec<SlackBlock>) -> Self {
        self.blocks = Some(blocks);
        self
    }
}

/// Operations the bot performs against the chat platform.
///
/// Every method is attempted exactly once; callers decide which failures
/// are tolerable.
pub trait ChatApi: Send + Sync {
    /// Resolve a channel's name from its ID.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if the lookup fails.
    fn channel_name<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, String>;

    /// Post a message and return its timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if the post fails.
    fn post_message(&self, message: OutboundMessage) -> ChatFuture<'_, String>;

    /// Pin a previously posted message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if pinning fails.
    fn pin_message<'a>(&'a self, channel: &'a str, ts: &'a str) -> ChatFuture<'a, ()>;

    /// Invite a user into a channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SlackApi` carrying Slack's error code, e.g.
    /// `already_in_channel`.
    fn invite_user<'a>(&'a self, channel: &'a str, user: &'a str) -> ChatFuture<'a, ()>;

    /// Make the bot itself a member of a channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SlackApi` carrying Slack's error code.
    fn join_channel<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, ()>;

    /// Human-readable name of a user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if the lookup fails.
    fn user_display_name<'a>(&'a self, user: &'a str) -> ChatFuture<'a, String>;

    /// Texts of the most recent messages in a channel, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if history cannot be read.
    fn recent_message_texts<'a>(&'a self, channel: &'a str, limit: u16)
        -> ChatFuture<'a, Vec<String>>;

    /// Texts of the messages pinned in a channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack`/`AppError::SlackApi` if pins cannot be listed.
    fn pinned_message_texts<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, Vec<String>>;
}
