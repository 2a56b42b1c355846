#![forbid(unsafe_code)]

//! `computron` — Slack and Pipedrive job-intake bot.
//!
//! Loads configuration and credentials, builds the Slack and CRM clients,
//! and serves the Slack ingress routes and inbound webhooks over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use computron::config::GlobalConfig;
use computron::crm::PipedriveClient;
use computron::http::serve_http;
use computron::slack::client::SlackService;
use computron::state::AppState;
use computron::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "computron", about = "Slack and Pipedrive job-intake bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// HTTP listening port, overriding the config file.
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    computron::install_crypto_provider();
    init_tracing(args.log_format)?;
    install_panic_hook();
    info!("computron bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => {
            info!("no config file given; using defaults");
            GlobalConfig::default()
        }
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials().await?;
    info!("configuration loaded");

    // ── Build clients ───────────────────────────────────
    let slack = SlackService::new(&config.slack)?;
    if config.slack.bot_user_id.is_none() {
        match slack.resolve_bot_user_id().await {
            Ok(user_id) => {
                info!(user_id, "resolved bot user id");
                config.slack.bot_user_id = Some(user_id);
            }
            Err(err) => warn!(%err, "could not resolve bot user id; continuing without it"),
        }
    }
    let crm = PipedriveClient::new(&config.crm)?;

    let state = Arc::new(AppState::new(config, Arc::new(slack), Arc::new(crm)));

    // ── Serve ───────────────────────────────────────────
    let ct = CancellationToken::new();
    let mut http_handle = tokio::spawn(serve_http(Arc::clone(&state), ct.clone()));

    info!("computron ready");

    tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            match http_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(%err, "http listener failed during shutdown"),
                Err(err) => error!(%err, "http task panicked"),
            }
        }
        joined = &mut http_handle => {
            ct.cancel();
            match joined {
                Ok(result) => result?,
                Err(err) => return Err(AppError::Http(format!("http task panicked: {err}"))),
            }
        }
    }
    info!("computron shut down");

    Ok(())
}

/// Log panics from spawned handler tasks instead of losing them silently.
///
/// A panicking task only takes down that task; the process keeps serving.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(%panic_info, "handler panicked");
        default_hook(panic_info);
    }));
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
