//! Weekly schedules gating when notifications are sent.
//!
//! # Responsibility
//! - Model a timeslot as a named set of weekly time recurrences.
//! - Decide whether a timestamp falls inside a recurrence or a timeslot.
//!
//! # Invariants
//! - A recurrence window is inclusive at both ends.
//! - Weekday and time-of-day are read in the timestamp's own timezone.
//! - A timeslot without recurrences never contains a timestamp.

use super::{UserId, ValidationError};
use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type TimeslotId = i64;

/// Weekday of a recurrence, numbered as ISO weekdays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    /// ISO weekday number, Monday = 1.
    pub fn iso_number(self) -> u8 {
        self as u8
    }

    pub fn from_iso_number(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value).checked_sub(1)?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl From<Weekday> for Day {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Day::Monday,
            Weekday::Tue => Day::Tuesday,
            Weekday::Wed => Day::Wednesday,
            Weekday::Thu => Day::Thursday,
            Weekday::Fri => Day::Friday,
            Weekday::Sat => Day::Saturday,
            Weekday::Sun => Day::Sunday,
        }
    }
}

impl Display for Day {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = ValidationError;

    /// Accepts ISO numbers (`1`) and full or three-letter names in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return Self::from_iso_number(number)
                .ok_or_else(|| ValidationError::InvalidDay(trimmed.to_string()));
        }
        trimmed
            .parse::<Weekday>()
            .map(Day::from)
            .map_err(|_| ValidationError::InvalidDay(trimmed.to_string()))
    }
}

/// First representable time of day.
pub fn day_start() -> NaiveTime {
    NaiveTime::MIN
}

/// Last representable time of day at microsecond precision.
pub fn day_end() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

/// Inclusive daily window repeated on the given weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecurrence {
    days: BTreeSet<Day>,
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRecurrence {
    pub fn new(
        days: impl IntoIterator<Item = Day>,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Self, ValidationError> {
        let days: BTreeSet<Day> = days.into_iter().collect();
        if days.is_empty() {
            return Err(ValidationError::EmptyRecurrenceDays);
        }
        if start > end {
            return Err(ValidationError::ReversedRecurrenceWindow { start, end });
        }
        Ok(Self { days, start, end })
    }

    /// Covers the whole of each given day.
    pub fn all_day(days: impl IntoIterator<Item = Day>) -> Result<Self, ValidationError> {
        Self::new(days, day_start(), day_end())
    }

    pub fn days(&self) -> &BTreeSet<Day> {
        &self.days
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// True when `timestamp` falls on one of the days and inside
    /// `start..=end`.
    pub fn timestamp_is_within<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> bool {
        let day = Day::from(timestamp.weekday());
        let time = timestamp.time();
        self.days.contains(&day) && self.start <= time && time <= self.end
    }
}

/// Named weekly schedule owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslot {
    pub id: TimeslotId,
    pub user_id: UserId,
    pub name: String,
    pub recurrences: Vec<TimeRecurrence>,
}

impl Timeslot {
    pub fn timestamp_is_within_time_recurrences<Tz: TimeZone>(
        &self,
        timestamp: &DateTime<Tz>,
    ) -> bool {
        self.recurrences
            .iter()
            .any(|recurrence| recurrence.timestamp_is_within(timestamp))
    }
}
