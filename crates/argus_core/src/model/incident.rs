//! Incident and source-system records.
//!
//! # Responsibility
//! - Describe incidents raised by monitored source systems.
//! - Derive stateful/open/closed status from `end_time`.
//!
//! # Invariants
//! - `level` is within `MIN_INCIDENT_LEVEL..=MAX_INCIDENT_LEVEL`; 1 is the
//!   most severe.
//! - `end_time = None` means stateless; `Some(INFINITY)` means stateful and
//!   open until closed.
//! - `end_time`, when set, is not earlier than `start_time`.
//! - Draft constructors keep millisecond precision, the precision incidents
//!   are stored with.

use super::tag::Tag;
use super::{UserId, ValidationError};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub type IncidentId = i64;
pub type SourceSystemId = i64;

pub const MIN_INCIDENT_LEVEL: u8 = 1;
pub const MAX_INCIDENT_LEVEL: u8 = 5;

/// End time of a stateful incident that has not been closed yet.
pub const INFINITY: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// Drops sub-millisecond digits; [`INFINITY`] is kept as is.
pub fn storage_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    if value == INFINITY {
        value
    } else {
        value.trunc_subsecs(3)
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// External monitoring system that reports incidents.
///
/// Every source system authenticates as its own user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSystem {
    pub id: SourceSystemId,
    pub name: String,
    /// Source system type, e.g. `nav` or `zabbix`.
    #[serde(rename = "type")]
    pub type_name: String,
    pub user_id: UserId,
}

/// Draft of an incident that is not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncident {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub source_id: SourceSystemId,
    pub source_incident_id: String,
    pub details_url: String,
    pub description: String,
    pub level: u8,
    pub ticket_url: String,
}

impl NewIncident {
    /// Creates a stateless draft with the default (least severe) level.
    pub fn stateless(source_id: SourceSystemId, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: storage_precision(start_time),
            end_time: None,
            source_id,
            source_incident_id: String::new(),
            details_url: String::new(),
            description: String::new(),
            level: MAX_INCIDENT_LEVEL,
            ticket_url: String::new(),
        }
    }

    /// Creates a stateful draft that stays open until closed.
    pub fn open(source_id: SourceSystemId, start_time: DateTime<Utc>) -> Self {
        Self {
            end_time: Some(INFINITY),
            ..Self::stateless(source_id, start_time)
        }
    }

    pub fn with_source_incident_id(mut self, value: impl Into<String>) -> Self {
        self.source_incident_id = value.into();
        self
    }

    pub fn with_description(mut self, value: impl Into<String>) -> Self {
        self.description = value.into();
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_end_time(mut self, end_time: Option<DateTime<Utc>>) -> Self {
        self.end_time = end_time.map(storage_precision);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_level(self.level)?;
        validate_window(self.start_time, self.end_time)
    }
}

/// Stored incident with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub source_id: SourceSystemId,
    pub source_incident_id: String,
    pub details_url: String,
    pub description: String,
    pub level: u8,
    pub ticket_url: String,
    /// Sorted by key, then value.
    pub tags: Vec<Tag>,
}

impl Incident {
    /// Whether the incident tracks an open/closed state.
    pub fn stateful(&self) -> bool {
        self.end_time.is_some()
    }

    /// Stateful and not yet ended at `now`.
    pub fn open(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| end > now)
    }

    /// Stateful and ended at or before `now`.
    pub fn closed(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| end <= now)
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|own| own == tag)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_level(self.level)?;
        validate_window(self.start_time, self.end_time)
    }
}

fn validate_level(level: u8) -> Result<(), ValidationError> {
    if (MIN_INCIDENT_LEVEL..=MAX_INCIDENT_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(ValidationError::LevelOutOfRange(level))
    }
}

fn validate_window(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match end {
        Some(end) if end < start => Err(ValidationError::EndBeforeStart {
            start: start.timestamp_millis(),
            end: end.timestamp_millis(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{storage_precision, NewIncident, INFINITY};
    use crate::model::ValidationError;
    use chrono::{Duration, TimeZone, Timelike, Utc};

    #[test]
    fn drafts_keep_millisecond_precision() {
        let start = Utc
            .with_ymd_and_hms(2026, 10, 17, 10, 44, 28)
            .unwrap()
            .with_nanosecond(989_146_384)
            .unwrap();
        let draft = NewIncident::stateless(1, start).with_end_time(Some(start));
        assert_eq!(draft.start_time.nanosecond(), 989_000_000);
        assert_eq!(draft.end_time, Some(draft.start_time));
        assert_eq!(storage_precision(INFINITY), INFINITY);
    }

    #[test]
    fn drafts_default_to_least_severe_level() {
        let start = Utc.with_ymd_and_hms(2019, 11, 25, 0, 0, 0).unwrap();
        let draft = NewIncident::stateless(1, start);
        assert_eq!(draft.level, 5);
        assert_eq!(draft.end_time, None);
        assert_eq!(NewIncident::open(1, start).end_time, Some(INFINITY));
    }

    #[test]
    fn validate_rejects_bad_level_and_reversed_window() {
        let start = Utc.with_ymd_and_hms(2019, 11, 25, 0, 0, 0).unwrap();
        assert_eq!(
            NewIncident::stateless(1, start).with_level(0).validate(),
            Err(ValidationError::LevelOutOfRange(0))
        );
        assert_eq!(
            NewIncident::stateless(1, start).with_level(6).validate(),
            Err(ValidationError::LevelOutOfRange(6))
        );

        let err = NewIncident::stateless(1, start)
            .with_end_time(Some(start - Duration::seconds(1)))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::EndBeforeStart { .. }));
    }
}
