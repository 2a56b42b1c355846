#![forbid(unsafe_code)]

pub mod config;
pub mod crm;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod slack;
pub mod state;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};

/// Install `ring` as the process-wide rustls provider.
///
/// The SDK connector and reqwest pull in different rustls backends, so
/// rustls cannot pick one on its own. Must run before any TLS client is
/// built; later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
