//! Filter criteria expressed as storage query predicates.
//!
//! # Responsibility
//! - Build lazy [`IncidentQuery`] values from filter specifications.
//! - Mirror the in-memory checks in [`crate::model::filter::FilterSpec`].
//!
//! # Invariants
//! - Each helper narrows only by its own key; an absent or empty key returns
//!   the query unchanged.
//! - [`filtered_incidents`] returns an unsatisfiable query for an empty
//!   stored filter.

use crate::model::filter::{Filter, FilterSpec};
use crate::model::incident::SourceSystemId;
use crate::model::tag::Tag;
use chrono::{DateTime, Utc};

/// One narrowing condition on incidents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentPredicate {
    /// Source system id is one of these.
    SourceIn(Vec<SourceSystemId>),
    /// Incident carries this tag.
    HasTag(Tag),
    /// `level <= max`.
    LevelAtMost(i64),
    /// `end_time` presence equals the flag.
    Stateful(bool),
    /// Open (`end_time > now`) or closed (`end_time <= now`) at `now`.
    Open { open: bool, now: DateTime<Utc> },
    /// Matches no incident.
    Nothing,
}

/// Lazy conjunction of predicates over stored incidents.
///
/// Evaluated by [`crate::repo::incident_repo::IncidentRepository::list_incidents`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    predicates: Vec<IncidentPredicate>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl IncidentQuery {
    /// Every stored incident.
    pub fn all() -> Self {
        Self::default()
    }

    /// No incident at all.
    pub fn none() -> Self {
        Self::all().and(IncidentPredicate::Nothing)
    }

    pub fn and(mut self, predicate: IncidentPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[IncidentPredicate] {
        &self.predicates
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.predicates.contains(&IncidentPredicate::Nothing)
    }
}

pub fn incidents_with_source_systems(incidents: IncidentQuery, spec: &FilterSpec) -> IncidentQuery {
    match spec.source_system_constraint() {
        Some(ids) => incidents.and(IncidentPredicate::SourceIn(ids.to_vec())),
        None => incidents,
    }
}

/// Requires every tag of the spec.
pub fn incidents_with_tags(incidents: IncidentQuery, spec: &FilterSpec) -> IncidentQuery {
    let Some(tags) = spec.tag_constraint() else {
        return incidents;
    };
    tags.iter().cloned().fold(incidents, |query, tag| {
        query.and(IncidentPredicate::HasTag(tag))
    })
}

pub fn incidents_fitting_maxlevel(incidents: IncidentQuery, spec: &FilterSpec) -> IncidentQuery {
    match spec.maxlevel {
        Some(max) => incidents.and(IncidentPredicate::LevelAtMost(max)),
        None => incidents,
    }
}

pub fn incidents_fitting_tristates(
    incidents: IncidentQuery,
    spec: &FilterSpec,
    now: DateTime<Utc>,
) -> IncidentQuery {
    let mut query = incidents;
    if let Some(stateful) = spec.stateful {
        query = query.and(IncidentPredicate::Stateful(stateful));
    }
    if let Some(open) = spec.open {
        query = query.and(IncidentPredicate::Open { open, now });
    }
    query
}

/// Narrows `incidents` by every key of `spec`. An empty spec changes nothing.
pub fn incidents_fitting_spec(
    incidents: IncidentQuery,
    spec: &FilterSpec,
    now: DateTime<Utc>,
) -> IncidentQuery {
    let query = incidents_with_source_systems(incidents, spec);
    let query = incidents_with_tags(query, spec);
    let query = incidents_fitting_maxlevel(query, spec);
    incidents_fitting_tristates(query, spec, now)
}

/// Incidents selected by a stored filter; none when the filter is empty.
pub fn filtered_incidents(filter: &Filter, now: DateTime<Utc>) -> IncidentQuery {
    if filter.spec.is_empty() {
        return IncidentQuery::none();
    }
    incidents_fitting_spec(IncidentQuery::all(), &filter.spec, now)
}
