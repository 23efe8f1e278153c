//! Error types for the scheduler crate.

use amber_relay_core::ScheduleId;
use std::fmt;

/// Errors from schedule operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The cron expression could not be parsed.
    InvalidCronExpression { expression: String, reason: String },
    /// The timezone is not a known IANA name.
    InvalidTimezone { timezone: String },
    /// No schedule registered under this ID.
    NotFound { id: ScheduleId },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCronExpression { expression, reason } => {
                write!(f, "invalid cron expression '{expression}': {reason}")
            }
            Self::InvalidTimezone { timezone } => {
                write!(f, "invalid timezone: {timezone}")
            }
            Self::NotFound { id } => write!(f, "schedule not found: {id}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cron_display() {
        let err = ScheduleError::InvalidCronExpression {
            expression: "nope".to_string(),
            reason: "unparseable".to_string(),
        };
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn not_found_display() {
        let err = ScheduleError::NotFound {
            id: ScheduleId::new(),
        };
        assert!(err.to_string().contains("schedule not found"));
    }
}
