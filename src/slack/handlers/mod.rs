//! Slack trigger and interaction handlers.

pub mod crew_chief;
pub mod start;
