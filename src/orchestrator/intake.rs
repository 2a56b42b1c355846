//! The intake workflow run once per job channel.
//!
//! Only resolving the channel can abort a run. Every later step degrades on
//! failure: an unreachable CRM yields default labels, and a failed prompt or
//! invite never prevents the form message, which carries the durable marker.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{FormsConfig, GlobalConfig, IntakeConfig};
use crate::crm::CrmApi;
use crate::models::channel::ChannelRecord;
use crate::models::deal::{DealRecord, DEFAULT_CUSTOMER};
use crate::models::roster::InviteRoster;
use crate::slack::api::{ChatApi, OutboundMessage};
use crate::slack::blocks;
use crate::Result;

/// Optional workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeOptions {
    /// Prefix the form message with the marker and pin it.
    pub durable_marker: bool,
    /// Invite the roster into the channel.
    pub auto_invite: bool,
    /// Use the deal's estimator for the form link and the roster.
    pub estimator_lookup: bool,
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self {
            durable_marker: true,
            auto_invite: true,
            estimator_lookup: true,
        }
    }
}

impl From<&IntakeConfig> for IntakeOptions {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            durable_marker: config.durable_marker,
            auto_invite: config.auto_invite,
            estimator_lookup: config.estimator_lookup,
        }
    }
}

/// Static inputs of the workflow.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Form link templates.
    pub forms: FormsConfig,
    /// Durable marker token.
    pub marker: String,
    /// Enabled optional steps.
    pub options: IntakeOptions,
    /// Users invited into every job channel.
    pub always_invite: Vec<String>,
    /// Estimator name to Slack user ID.
    pub estimators: HashMap<String, String>,
    /// The bot's own user ID, never invited.
    pub bot_user_id: Option<String>,
}

impl From<&GlobalConfig> for IntakeSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            forms: config.forms.clone(),
            marker: config.intake.marker.clone(),
            options: IntakeOptions::from(&config.intake),
            always_invite: config.roster.always_invite.clone(),
            estimators: config.roster.estimators.clone(),
            bot_user_id: config.slack.bot_user_id.clone(),
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeOutcome {
    /// Job number used in messages.
    pub job_label: String,
    /// Customer label used in the form link.
    pub customer: String,
    /// Timestamp of the posted form message.
    pub form_ts: Option<String>,
    /// Whether the crew-chief prompt was posted.
    pub prompt_posted: bool,
    /// Users invited successfully or already present.
    pub invited: Vec<String>,
    /// Users whose invite failed unexpectedly.
    pub failed_invites: Vec<String>,
}

/// Runs the intake sequence against the chat platform and the CRM.
pub struct IntakeWorkflow {
    chat: Arc<dyn ChatApi>,
    crm: Arc<dyn CrmApi>,
    settings: IntakeSettings,
}

impl IntakeWorkflow {
    /// Create a workflow bound to its collaborators.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatApi>, crm: Arc<dyn CrmApi>, settings: IntakeSettings) -> Self {
        Self {
            chat,
            crm,
            settings,
        }
    }

    /// Run the intake workflow for a channel.
    ///
    /// # Errors
    ///
    /// Returns an error only when the channel cannot be resolved; nothing
    /// has been posted at that point.
    pub async fn run(&self, channel_id: &str) -> Result<IntakeOutcome> {
        let span = info_span!("intake", channel_id);
        self.run_inner(channel_id).instrument(span).await
    }

    async fn run_inner(&self, channel_id: &str) -> Result<IntakeOutcome> {
        let name = self.chat.channel_name(channel_id).await.map_err(|err| {
            error!(%err, "cannot resolve channel; intake aborted");
            err
        })?;
        let channel = ChannelRecord::new(channel_id, name);
        if channel.deal_id.is_none() {
            warn!(channel_name = %channel.channel_name, "channel name carries no deal id");
        }

        let deal = self.fetch_deal(&channel).await;
        let customer = deal
            .as_ref()
            .map_or(DEFAULT_CUSTOMER, DealRecord::customer_label)
            .to_owned();
        let estimator = deal
            .as_ref()
            .filter(|_| self.settings.options.estimator_lookup)
            .and_then(|d| d.estimator.clone());

        let mut outcome = IntakeOutcome {
            job_label: channel.job_label().to_owned(),
            customer,
            ..IntakeOutcome::default()
        };

        outcome.form_ts = self
            .post_form(&channel, &outcome.customer, estimator.as_deref())
            .await;
        outcome.prompt_posted = self.post_crew_chief_prompt(channel_id).await;

        if self.settings.options.auto_invite {
            self.invite_roster(channel_id, estimator.as_deref(), &mut outcome)
                .await;
        }

        info!(
            job = %outcome.job_label,
            form_posted = outcome.form_ts.is_some(),
            prompt_posted = outcome.prompt_posted,
            invited = outcome.invited.len(),
            failed_invites = outcome.failed_invites.len(),
            "intake workflow finished"
        );
        Ok(outcome)
    }

    async fn fetch_deal(&self, channel: &ChannelRecord) -> Option<DealRecord> {
        let deal_id = channel.deal_id.as_deref()?;
        match self.crm.fetch_deal(deal_id).await {
            Ok(deal) => Some(deal),
            Err(err) => {
                warn!(deal_id, %err, "deal lookup failed; using default labels");
                None
            }
        }
    }

    async fn post_form(
        &self,
        channel: &ChannelRecord,
        customer: &str,
        estimator: Option<&str>,
    ) -> Option<String> {
        let link = blocks::initial_loss_form_link(
            &self.settings.forms,
            channel.job_label(),
            customer,
            estimator,
        );
        let marker = self
            .settings
            .options
            .durable_marker
            .then_some(self.settings.marker.as_str());
        let text = blocks::initial_loss_message(marker, channel.job_label(), &link);

        let ts = match self
            .chat
            .post_message(OutboundMessage::plain(&channel.channel_id, text))
            .await
        {
            Ok(ts) => ts,
            Err(err) => {
                error!(%err, "failed to post initial loss form");
                return None;
            }
        };

        if self.settings.options.durable_marker {
            if let Err(err) = self.chat.pin_message(&channel.channel_id, &ts).await {
                debug!(%err, "pinning form message failed; ignored");
            }
        }
        Some(ts)
    }

    async fn post_crew_chief_prompt(&self, channel_id: &str) -> bool {
        let picker = match blocks::crew_chief_picker() {
            Ok(picker) => picker,
            Err(err) => {
                error!(%err, "cannot build crew chief prompt");
                return false;
            }
        };
        let message = OutboundMessage::plain(channel_id, blocks::CREW_CHIEF_PROMPT_TEXT)
            .with_blocks(picker);
        match self.chat.post_message(message).await {
            Ok(_) => true,
            Err(err) => {
                error!(%err, "failed to post crew chief prompt");
                false
            }
        }
    }

    async fn invite_roster(
        &self,
        channel_id: &str,
        estimator: Option<&str>,
        outcome: &mut IntakeOutcome,
    ) {
        let roster = InviteRoster::resolve(
            &self.settings.always_invite,
            &self.settings.estimators,
            estimator,
            self.settings.bot_user_id.as_deref(),
        );
        if roster.is_empty() {
            debug!("invite roster empty");
            return;
        }

        for user in roster.users() {
            match self.chat.invite_user(channel_id, user).await {
                Ok(()) => outcome.invited.push(user.clone()),
                Err(err) if err.is_already_member() => {
                    debug!(user, "already in channel");
                    outcome.invited.push(user.clone());
                }
                Err(err) => {
                    warn!(user, %err, "invite failed");
                    outcome.failed_invites.push(user.clone());
                }
            }
        }
    }
}
