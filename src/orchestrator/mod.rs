//! Job-intake orchestration: duplicate suppression and the intake sequence.

pub mod guard;
pub mod intake;
