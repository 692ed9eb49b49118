use chrono::NaiveTime;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Tag text is not of the form `key=value` with a valid key.
    InvalidTag { tag: String, reason: &'static str },
    /// Incident level outside `1..=5`.
    LevelOutOfRange(u8),
    /// Stateful incident ending before it started (epoch milliseconds).
    EndBeforeStart { start: i64, end: i64 },
    /// Recurrence without any weekday.
    EmptyRecurrenceDays,
    /// Recurrence whose start is after its end.
    ReversedRecurrenceWindow { start: NaiveTime, end: NaiveTime },
    /// Unknown weekday label.
    InvalidDay(String),
    /// Unknown notification medium.
    InvalidMedia(String),
    /// Required name field is blank.
    BlankName(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTag { tag, reason } => write!(f, "invalid tag `{tag}`: {reason}"),
            Self::LevelOutOfRange(level) => {
                write!(f, "incident level {level} is outside 1..=5")
            }
            Self::EndBeforeStart { start, end } => {
                write!(f, "end_time ({end}) must be >= start_time ({start})")
            }
            Self::EmptyRecurrenceDays => write!(f, "time recurrence needs at least one day"),
            Self::ReversedRecurrenceWindow { start, end } => {
                write!(f, "time recurrence start {start} is after end {end}")
            }
            Self::InvalidDay(value) => write!(f, "unknown weekday `{value}`"),
            Self::InvalidMedia(value) => write!(f, "unknown notification medium `{value}`"),
            Self::BlankName(field) => write!(f, "{field} cannot be blank"),
        }
    }
}

impl Error for ValidationError {}
