//! Duplicate suppression for the intake trigger.
//!
//! Three signals decide whether a trigger may start the intake workflow
//! for a channel, consulted in this order:
//!
//! 1. the durable marker, found by scanning recent and pinned messages
//!    ([`CompletionCheck`]); authoritative and survives restarts,
//! 2. a per-channel cooldown timestamp,
//! 3. a short-lived "recently started" entry that absorbs duplicate event
//!    deliveries.
//!
//! (2) and (3) live in an [`IdempotencyStore`] and are best-effort: they
//! reset on restart. A failing durable scan counts as "not found" so that a
//! job is never silently skipped.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::slack::api::ChatApi;

/// Result of an atomic check-and-mark against an [`IdempotencyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns this run; both guards are now set.
    Claimed,
    /// A run started within the cooldown window.
    CoolingDown,
    /// A run started within the short-term guard lifetime.
    RecentlyStarted,
}

/// Process-local guard state keyed by channel ID.
pub trait IdempotencyStore: Send + Sync {
    /// Record that a run just started; the entry expires after `ttl`.
    fn mark_recent(&self, channel: &str, ttl: Duration);

    /// Whether an unexpired short-term entry exists.
    fn is_recent(&self, channel: &str) -> bool;

    /// Record the cooldown start for a channel as now.
    fn mark_cooldown(&self, channel: &str);

    /// Whether the last cooldown start lies within `window` of now.
    fn is_cooling_down(&self, channel: &str, window: Duration) -> bool;

    /// Check both guards and, when clear, set both.
    ///
    /// The default composes the four primitives and is not atomic;
    /// implementations shared between tasks should override it.
    fn claim(&self, channel: &str, window: Duration, ttl: Duration) -> Claim {
        if self.is_cooling_down(channel, window) {
            return Claim::CoolingDown;
        }
        if self.is_recent(channel) {
            return Claim::RecentlyStarted;
        }
        self.mark_recent(channel, ttl);
        self.mark_cooldown(channel);
        Claim::Claimed
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    recent: HashMap<String, Instant>,
    cooldowns: HashMap<String, Instant>,
}

impl MemoryState {
    fn is_recent(&mut self, channel: &str, now: Instant) -> bool {
        let active = self
            .recent
            .get(channel)
            .is_some_and(|expires| *expires > now);
        if !active {
            self.recent.remove(channel);
        }
        active
    }

    fn is_cooling_down(&mut self, channel: &str, window: Duration, now: Instant) -> bool {
        let active = self
            .cooldowns
            .get(channel)
            .is_some_and(|started| now.duration_since(*started) < window);
        if !active {
            self.cooldowns.remove(channel);
        }
        active
    }

    /// Drop every expired entry, whichever channel it belongs to.
    fn sweep(&mut self, window: Duration, now: Instant) {
        self.recent.retain(|_, expires| *expires > now);
        self.cooldowns
            .retain(|_, started| now.duration_since(*started) < window);
    }
}

/// In-memory [`IdempotencyStore`] guarded by a mutex.
///
/// Expired entries are dropped when they are next consulted, and every
/// [`claim`](IdempotencyStore::claim) sweeps both maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl IdempotencyStore for MemoryStore {
    fn mark_recent(&self, channel: &str, ttl: Duration) {
        let expires = Instant::now() + ttl;
        self.with_state(|s| s.recent.insert(channel.to_owned(), expires));
    }

    fn is_recent(&self, channel: &str) -> bool {
        let now = Instant::now();
        self.with_state(|s| s.is_recent(channel, now))
    }

    fn mark_cooldown(&self, channel: &str) {
        let now = Instant::now();
        self.with_state(|s| s.cooldowns.insert(channel.to_owned(), now));
    }

    fn is_cooling_down(&self, channel: &str, window: Duration) -> bool {
        let now = Instant::now();
        self.with_state(|s| s.is_cooling_down(channel, window, now))
    }

    fn claim(&self, channel: &str, window: Duration, ttl: Duration) -> Claim {
        let now = Instant::now();
        self.with_state(|s| {
            s.sweep(window, now);
            if s.is_cooling_down(channel, window, now) {
                return Claim::CoolingDown;
            }
            if s.is_recent(channel, now) {
                return Claim::RecentlyStarted;
            }
            s.recent.insert(channel.to_owned(), now + ttl);
            s.cooldowns.insert(channel.to_owned(), now);
            Claim::Claimed
        })
    }
}

/// Durable "intake already ran here" check.
pub trait CompletionCheck: Send + Sync {
    /// Whether the intake workflow has durably completed for `channel`.
    ///
    /// Implementations answer `false` when they cannot tell.
    fn has_completed<'a>(&'a self, channel: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

/// [`CompletionCheck`] that looks for the marker in recent and pinned messages.
pub struct MarkerScan {
    chat: Arc<dyn ChatApi>,
    marker: String,
    history_limit: u16,
}

impl MarkerScan {
    /// Scan up to `history_limit` recent messages plus all pins for `marker`.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatApi>, marker: impl Into<String>, history_limit: u16) -> Self {
        Self {
            chat,
            marker: marker.into(),
            history_limit,
        }
    }

    fn contains_marker(&self, texts: &[String]) -> bool {
        texts.iter().any(|text| text.contains(&self.marker))
    }
}

impl CompletionCheck for MarkerScan {
    fn has_completed<'a>(&'a self, channel: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            match self.chat.recent_message_texts(channel, self.history_limit).await {
                Ok(texts) if self.contains_marker(&texts) => {
                    debug!(channel, "marker found in recent history");
                    return true;
                }
                Ok(_) => {}
                Err(err) => warn!(channel, %err, "history scan failed; treating as not found"),
            }

            match self.chat.pinned_message_texts(channel).await {
                Ok(texts) if self.contains_marker(&texts) => {
                    debug!(channel, "marker found in pins");
                    true
                }
                Ok(_) => false,
                Err(err) => {
                    warn!(channel, %err, "pin scan failed; treating as not found");
                    false
                }
            }
        })
    }
}

/// Guard decision for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the workflow.
    Proceed,
    /// The durable marker is already present.
    AlreadyCompleted,
    /// Suppressed by the cooldown window.
    CoolingDown,
    /// Suppressed by the short-term duplicate guard.
    RecentlyStarted,
}

impl Admission {
    /// `true` only for [`Admission::Proceed`].
    #[must_use]
    pub fn is_proceed(self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Combines the durable check with the in-memory guards.
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    completion: Option<Arc<dyn CompletionCheck>>,
    cooldown: Duration,
    recent_ttl: Duration,
}

impl IdempotencyGuard {
    /// Build a guard. Pass `None` for `completion` to skip the durable check.
    #[must_use]
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        completion: Option<Arc<dyn CompletionCheck>>,
        cooldown: Duration,
        recent_ttl: Duration,
    ) -> Self {
        Self {
            store,
            completion,
            cooldown,
            recent_ttl,
        }
    }

    /// Decide whether a trigger for `channel` may start the workflow.
    ///
    /// On [`Admission::Proceed`] the in-memory guards are already set.
    pub async fn admit(&self, channel: &str) -> Admission {
        if let Some(ref completion) = self.completion {
            if completion.has_completed(channel).await {
                info!(channel, "intake already completed; skipping");
                return Admission::AlreadyCompleted;
            }
        }

        match self.store.claim(channel, self.cooldown, self.recent_ttl) {
            Claim::Claimed => Admission::Proceed,
            Claim::CoolingDown => {
                info!(channel, "intake cooling down; skipping");
                Admission::CoolingDown
            }
            Claim::RecentlyStarted => {
                info!(channel, "intake recently started; skipping");
                Admission::RecentlyStarted
            }
        }
    }
}
