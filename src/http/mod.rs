//! HTTP ingress: router, listener and inbound webhooks.

pub mod server;
pub mod webhooks;

pub use server::{build_router, serve_http};
