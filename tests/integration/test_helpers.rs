//! Shared test helpers for workflow and HTTP integration tests.
//!
//! Provides recording doubles for the chat platform and the CRM, plus
//! `GlobalConfig`/`AppState` construction with timing suited to tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use computron::config::GlobalConfig;
use computron::crm::{CrmApi, NewActivity};
use computron::models::deal::DealRecord;
use computron::slack::api::{ChatApi, ChatFuture, OutboundMessage};
use computron::state::AppState;
use computron::{AppError, Result};

/// Marker used by every test configuration.
pub const TEST_MARKER: &str = "[computron:intake]";

/// Config with no join delay and a small roster.
pub fn test_config() -> GlobalConfig {
    let toml = r#"
http_port = 0

[slack]
bot_user_id = "U_BOT"
history_scan_limit = 20

[crm]
estimator_field = "est_field"
service_type_field = "svc_field"

[intake]
join_delay_seconds = 0
cooldown_seconds = 60
recent_guard_seconds = 10

[roster]
always_invite = ["U_OFFICE", "U_BOT"]

[roster.estimators]
"Bob Estimator" = "U_BOB"
"#;
    GlobalConfig::from_toml_str(toml).expect("valid test config")
}

/// Build shared state around the given doubles.
pub fn test_state(config: GlobalConfig, chat: &Arc<FakeChat>, crm: &Arc<FakeCrm>) -> Arc<AppState> {
    computron::install_crypto_provider();
    let chat: Arc<dyn ChatApi> = Arc::clone(chat) as Arc<dyn ChatApi>;
    let crm: Arc<dyn CrmApi> = Arc::clone(crm) as Arc<dyn CrmApi>;
    Arc::new(AppState::new(config, chat, crm))
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Recording chat double.
///
/// Posted texts are appended to the channel history so later marker scans
/// see them, as they would on Slack.
#[derive(Default)]
pub struct FakeChat {
    names: Mutex<HashMap<String, String>>,
    display_names: Mutex<HashMap<String, String>>,
    history: Mutex<HashMap<String, Vec<String>>>,
    pinned: Mutex<HashMap<String, Vec<String>>>,
    posts: Mutex<Vec<OutboundMessage>>,
    pins: Mutex<Vec<(String, String)>>,
    invites: Mutex<Vec<(String, String)>>,
    joins: Mutex<Vec<String>>,
    invite_errors: Mutex<HashMap<String, String>>,
    join_error: Mutex<Option<String>>,
    fail_posts: AtomicBool,
    fail_history: AtomicBool,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_channel(self: Arc<Self>, id: &str, name: &str) -> Arc<Self> {
        lock(&self.names).insert(id.into(), name.into());
        self
    }

    pub fn set_display_name(&self, user: &str, name: &str) {
        lock(&self.display_names).insert(user.into(), name.into());
    }

    pub fn seed_history(&self, channel: &str, text: &str) {
        lock(&self.history)
            .entry(channel.into())
            .or_default()
            .insert(0, text.into());
    }

    pub fn seed_pin(&self, channel: &str, text: &str) {
        lock(&self.pinned)
            .entry(channel.into())
            .or_default()
            .push(text.into());
    }

    /// Make `invite_user` for `user` fail with a Slack error code.
    pub fn fail_invite(&self, user: &str, code: &str) {
        lock(&self.invite_errors).insert(user.into(), code.into());
    }

    pub fn fail_join(&self, code: &str) {
        *lock(&self.join_error) = Some(code.into());
    }

    pub fn fail_posts(&self) {
        self.fail_posts.store(true, Ordering::SeqCst);
    }

    pub fn fail_history(&self) {
        self.fail_history.store(true, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<OutboundMessage> {
        lock(&self.posts).clone()
    }

    pub fn post_texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|m| m.text).collect()
    }

    pub fn pins(&self) -> Vec<(String, String)> {
        lock(&self.pins).clone()
    }

    pub fn invites(&self) -> Vec<(String, String)> {
        lock(&self.invites).clone()
    }

    pub fn joins(&self) -> Vec<String> {
        lock(&self.joins).clone()
    }
}

impl ChatApi for FakeChat {
    fn channel_name<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, String> {
        Box::pin(async move {
            lock(&self.names)
                .get(channel)
                .cloned()
                .ok_or_else(|| AppError::SlackApi("channel_not_found".into()))
        })
    }

    fn post_message(&self, message: OutboundMessage) -> ChatFuture<'_, String> {
        Box::pin(async move {
            if self.fail_posts.load(Ordering::SeqCst) {
                return Err(AppError::SlackApi("channel_not_found".into()));
            }
            let mut posts = lock(&self.posts);
            let ts = format!("1700000000.{:06}", posts.len());
            lock(&self.history)
                .entry(message.channel.clone())
                .or_default()
                .insert(0, message.text.clone());
            posts.push(message);
            Ok(ts)
        })
    }

    fn pin_message<'a>(&'a self, channel: &'a str, ts: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            lock(&self.pins).push((channel.into(), ts.into()));
            Ok(())
        })
    }

    fn invite_user<'a>(&'a self, channel: &'a str, user: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            lock(&self.invites).push((channel.into(), user.into()));
            match lock(&self.invite_errors).get(user) {
                Some(code) => Err(AppError::SlackApi(code.clone())),
                None => Ok(()),
            }
        })
    }

    fn join_channel<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            lock(&self.joins).push(channel.into());
            match lock(&self.join_error).clone() {
                Some(code) => Err(AppError::SlackApi(code)),
                None => Ok(()),
            }
        })
    }

    fn user_display_name<'a>(&'a self, user: &'a str) -> ChatFuture<'a, String> {
        Box::pin(async move {
            lock(&self.display_names)
                .get(user)
                .cloned()
                .ok_or_else(|| AppError::SlackApi("user_not_found".into()))
        })
    }

    fn recent_message_texts<'a>(
        &'a self,
        channel: &'a str,
        limit: u16,
    ) -> ChatFuture<'a, Vec<String>> {
        Box::pin(async move {
            if self.fail_history.load(Ordering::SeqCst) {
                return Err(AppError::SlackApi("ratelimited".into()));
            }
            Ok(lock(&self.history)
                .get(channel)
                .map(|texts| texts.iter().take(usize::from(limit)).cloned().collect())
                .unwrap_or_default())
        })
    }

    fn pinned_message_texts<'a>(&'a self, channel: &'a str) -> ChatFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(lock(&self.pinned).get(channel).cloned().unwrap_or_default()) })
    }
}

/// Recording CRM double.
#[derive(Default)]
pub struct FakeCrm {
    deals: Mutex<HashMap<String, DealRecord>>,
    notes: Mutex<Vec<(String, String)>>,
    activities: Mutex<Vec<NewActivity>>,
    fetches: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeCrm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_deal(self: Arc<Self>, id: &str, person: &str, estimator: Option<&str>) -> Arc<Self> {
        lock(&self.deals).insert(
            id.into(),
            DealRecord {
                id: id.into(),
                person_name: Some(person.into()),
                estimator: estimator.map(str::to_owned),
            },
        );
        self
    }

    /// Make every call fail.
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn notes(&self) -> Vec<(String, String)> {
        lock(&self.notes).clone()
    }

    pub fn activities(&self) -> Vec<NewActivity> {
        lock(&self.activities).clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        lock(&self.fetches).clone()
    }

    fn failing(&self) -> bool {
        self.fail.load(Ordering::SeqCst)
    }
}

impl CrmApi for FakeCrm {
    fn fetch_deal(&self, deal_id: &str) -> Pin<Box<dyn Future<Output = Result<DealRecord>> + Send + '_>> {
        let deal_id = deal_id.to_owned();
        Box::pin(async move {
            lock(&self.fetches).push(deal_id.clone());
            if self.failing() {
                return Err(AppError::Crm("request timed out".into()));
            }
            lock(&self.deals)
                .get(&deal_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("deal {deal_id}")))
        })
    }

    fn create_note(
        &self,
        deal_id: &str,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let note = (deal_id.to_owned(), content.to_owned());
        Box::pin(async move {
            if self.failing() {
                return Err(AppError::Crm("note rejected".into()));
            }
            lock(&self.notes).push(note);
            Ok(())
        })
    }

    fn create_activity(
        &self,
        activity: NewActivity,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            lock(&self.activities).push(activity);
            if self.failing() {
                return Err(AppError::Crm("activity rejected".into()));
            }
            Ok("991".into())
        })
    }
}

/// Serve the router on an ephemeral port, returning its base URL.
///
/// Caller must cancel the token to shut the server down.
pub async fn spawn_router(state: Arc<AppState>) -> (String, tokio_util::sync::CancellationToken) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    let ct = tokio_util::sync::CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, computron::http::build_router(state))
            .with_graceful_shutdown(async move { server_ct.cancelled().await })
            .await;
    });
    (format!("http://{addr}"), ct)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    check()
}
