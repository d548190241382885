//! Routine cycles: which window a recurring task is currently in and when it
//! is next due.

use crate::calendar::IcsError;
use chrono::NaiveDateTime;

mod routine_custom;
mod routine_cycle;
mod routine_types;

pub use routine_cycle::*;
pub use routine_types::*;

/// Errors raised by cycle computation and the persisted cycle codec
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Invalid cycle configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid custom recurrence rule: {0}")]
    Rule(#[from] IcsError),
    #[error("Recurrence ended at {0}")]
    RecurrenceEnded(NaiveDateTime),
    #[error("Date is outside the supported calendar range")]
    OutOfRange,
    #[error("Failed to encode or decode cycle configuration: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CycleError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CycleError::InvalidConfiguration(msg.into())
    }
}
