//! Domain model module declarations.

pub mod channel;
pub mod deal;
pub mod roster;
