//! Shared application state handed to every route and Slack handler.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::crm::CrmApi;
use crate::orchestrator::guard::{CompletionCheck, IdempotencyGuard, MarkerScan, MemoryStore};
use crate::orchestrator::intake::{IntakeSettings, IntakeWorkflow};
use crate::slack::api::ChatApi;

/// Shared application state.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Chat platform client.
    pub chat: Arc<dyn ChatApi>,
    /// CRM client.
    pub crm: Arc<dyn CrmApi>,
    /// Duplicate suppression for the intake trigger.
    pub guard: IdempotencyGuard,
    /// The intake workflow.
    pub intake: IntakeWorkflow,
}

impl AppState {
    /// Wire the guard and the workflow from configuration.
    ///
    /// The durable marker check is only installed when the workflow posts
    /// the marker.
    #[must_use]
    pub fn new(config: GlobalConfig, chat: Arc<dyn ChatApi>, crm: Arc<dyn CrmApi>) -> Self {
        let completion: Option<Arc<dyn CompletionCheck>> = if config.intake.durable_marker {
            Some(Arc::new(MarkerScan::new(
                Arc::clone(&chat),
                config.intake.marker.clone(),
                config.slack.history_scan_limit,
            )))
        } else {
            None
        };
        let guard = IdempotencyGuard::new(
            Arc::new(MemoryStore::new()),
            completion,
            config.intake.cooldown(),
            config.intake.recent_guard(),
        );
        let intake = IntakeWorkflow::new(
            Arc::clone(&chat),
            Arc::clone(&crm),
            IntakeSettings::from(&config),
        );

        Self {
            config: Arc::new(config),
            chat,
            crm,
            guard,
            intake,
        }
    }
}
