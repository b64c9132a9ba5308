//! Schedule translation and validation errors.

use thiserror::Error;

/// A cron expression or local schedule failed validation.
///
/// Raised at save/activate time; never at run time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleParseError {
    /// The cron string is not a valid 5-field UTC expression.
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCron { expression: String, reason: String },

    /// The timezone name is not a known IANA identifier.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The wall-clock time is not a valid `HH:MM` value.
    #[error("invalid time of day: {0}")]
    InvalidTime(String),

    /// A weekday outside ISO 1-7 or a day-of-month outside 1-31.
    #[error("invalid schedule day: {0}")]
    InvalidDay(u8),
}
