//! iCalendar (RFC 5545 subset) import.
//
// Turns calendar file text into `ParsedEvent`s. The import is all-or-nothing:
// one bad VEVENT fails the whole call.

mod calendar_import;
mod calendar_recurrence;
mod calendar_types;
mod calendar_validation;

pub use calendar_import::*;
pub use calendar_recurrence::*;
pub use calendar_types::*;
pub use calendar_validation::*;

/// Errors raised while importing calendar text
#[derive(Debug, thiserror::Error)]
pub enum IcsError {
    #[error("Calendar file contains no importable events")]
    EmptyFile,
    #[error("Malformed calendar data: {0}")]
    Parse(String),
    #[error("Invalid date/time or duration format: {0}")]
    InvalidFormat(String),
    #[error("Failed to read calendar file: {0}")]
    Io(#[from] std::io::Error),
}

impl IcsError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        IcsError::Parse(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        IcsError::InvalidFormat(msg.into())
    }
}
