//! Core types for the transcript kernel.

pub mod turn;
pub mod record;

pub use turn::{Role, TurnFeatures};
pub use record::{MessageRecord, UNKNOWN_ROLE_LABEL};
