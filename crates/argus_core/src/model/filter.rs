//! Stored incident filters.
//!
//! # Responsibility
//! - Parse and serialize the JSON filter specification.
//! - Evaluate the specification against single incidents in memory.
//!
//! # Invariants
//! - Criteria combine by conjunction; an absent key (or an empty list)
//!   imposes no constraint.
//! - A stored [`Filter`] with an empty specification fits no incident.
//!
//! # See also
//! - [`crate::filter::queryset`] for the same criteria as storage queries.

use super::incident::{Incident, SourceSystemId};
use super::tag::Tag;
use super::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type FilterId = i64;

/// Filter specification parsing error.
#[derive(Debug)]
pub enum FilterError {
    /// Malformed JSON or a value of the wrong shape (including bad tags).
    InvalidSpec(serde_json::Error),
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSpec(err) => write!(f, "invalid filter specification: {err}"),
        }
    }
}

impl Error for FilterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidSpec(value)
    }
}

/// Structured incident selection criteria.
///
/// Serialized with the wire names `sourceSystemIds`, `tags`, `maxlevel`,
/// `stateful` and `open`. Unknown keys are ignored when parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(
        rename = "sourceSystemIds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_system_ids: Option<Vec<SourceSystemId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    /// Highest (least severe) level accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlevel: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
}

impl FilterSpec {
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, FilterError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Source system ids that constrain the selection, if any.
    pub fn source_system_constraint(&self) -> Option<&[SourceSystemId]> {
        self.source_system_ids
            .as_deref()
            .filter(|ids| !ids.is_empty())
    }

    /// Tags that constrain the selection, if any.
    pub fn tag_constraint(&self) -> Option<&[Tag]> {
        self.tags.as_deref().filter(|tags| !tags.is_empty())
    }

    /// True when no key constrains the selection.
    pub fn is_empty(&self) -> bool {
        self.source_system_constraint().is_none()
            && self.tag_constraint().is_none()
            && self.maxlevel.is_none()
            && self.stateful.is_none()
            && self.open.is_none()
    }

    pub fn source_system_fits(&self, incident: &Incident) -> bool {
        self.source_system_constraint()
            .map_or(true, |ids| ids.contains(&incident.source_id))
    }

    /// The incident must carry every listed tag.
    pub fn tags_fit(&self, incident: &Incident) -> bool {
        self.tag_constraint()
            .map_or(true, |tags| tags.iter().all(|tag| incident.has_tag(tag)))
    }

    pub fn level_fits(&self, incident: &Incident) -> bool {
        self.maxlevel
            .map_or(true, |max| i64::from(incident.level) <= max)
    }

    pub fn tristates_fit(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        let stateful_fits = self
            .stateful
            .map_or(true, |stateful| incident.stateful() == stateful);
        let open_fits = self.open.map_or(true, |open| {
            if open {
                incident.open(now)
            } else {
                incident.closed(now)
            }
        });
        stateful_fits && open_fits
    }

    /// Conjunction of every criterion. An empty spec matches everything.
    pub fn matches(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        self.source_system_fits(incident)
            && self.tags_fit(incident)
            && self.level_fits(incident)
            && self.tristates_fit(incident, now)
    }

    /// Keeps the incidents matching this spec, preserving input order.
    pub fn select<'a, I>(&self, incidents: I, now: DateTime<Utc>) -> Vec<&'a Incident>
    where
        I: IntoIterator<Item = &'a Incident>,
    {
        incidents
            .into_iter()
            .filter(|incident| self.matches(incident, now))
            .collect()
    }
}

/// Named filter owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: FilterId,
    pub user_id: UserId,
    pub name: String,
    pub spec: FilterSpec,
}

impl Filter {
    pub fn source_system_fits(&self, incident: &Incident) -> bool {
        self.spec.source_system_fits(incident)
    }

    pub fn tags_fit(&self, incident: &Incident) -> bool {
        self.spec.tags_fit(incident)
    }

    /// An empty filter fits nothing.
    pub fn incident_fits(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        !self.spec.is_empty() && self.spec.matches(incident, now)
    }

    /// Stored form of the specification.
    pub fn filter_string(&self) -> Result<String, FilterError> {
        self.spec.to_json()
    }
}
