//! Incident use-case service.
//!
//! # Responsibility
//! - Evaluate ad-hoc filter specifications against stored incidents.
//! - Tag incidents on behalf of a user.
//! - Shape incidents into the JSON projection returned to callers.
//!
//! # Invariants
//! - Ad-hoc evaluation of an empty specification returns every incident.
//! - The projection renders an open incident's end as `"infinity"`.

use crate::filter::queryset::{incidents_fitting_spec, IncidentQuery};
use crate::model::filter::FilterSpec;
use crate::model::incident::{Incident, IncidentId, SourceSystem, SourceSystemId, INFINITY};
use crate::model::tag::Tag;
use crate::model::UserId;
use crate::repo::incident_repo::{IncidentRepository, RepoError, RepoResult};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Textual end time of open stateful incidents.
pub const INFINITY_REPR: &str = "infinity";

/// Source system as embedded in [`IncidentView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSystemView {
    pub pk: SourceSystemId,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// JSON projection of one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentView {
    pub pk: IncidentId,
    pub start_time: String,
    /// `null` for stateless incidents, `"infinity"` while open.
    pub end_time: Option<String>,
    pub source: SourceSystemView,
    pub source_incident_id: String,
    pub details_url: String,
    pub description: String,
    pub level: u8,
    pub ticket_url: String,
    pub tags: Vec<String>,
    pub stateful: bool,
    pub open: bool,
}

impl IncidentView {
    pub fn new(incident: &Incident, source: &SourceSystem, now: DateTime<Utc>) -> Self {
        Self {
            pk: incident.id,
            start_time: format_time(incident.start_time),
            end_time: incident.end_time.map(|end| {
                if end == INFINITY {
                    INFINITY_REPR.to_string()
                } else {
                    format_time(end)
                }
            }),
            source: SourceSystemView {
                pk: source.id,
                name: source.name.clone(),
                type_name: source.type_name.clone(),
            },
            source_incident_id: incident.source_incident_id.clone(),
            details_url: incident.details_url.clone(),
            description: incident.description.clone(),
            level: incident.level,
            ticket_url: incident.ticket_url.clone(),
            tags: incident.tags.iter().map(Tag::to_string).collect(),
            stateful: incident.stateful(),
            open: incident.open(now),
        }
    }
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Use-case service wrapper over an incident repository.
pub struct IncidentService<R: IncidentRepository> {
    repo: R,
}

impl<R: IncidentRepository> IncidentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn get_incident(&self, id: IncidentId) -> RepoResult<Option<Incident>> {
        self.repo.get_incident(id)
    }

    pub fn list_incidents(&self, query: &IncidentQuery) -> RepoResult<Vec<Incident>> {
        self.repo.list_incidents(query)
    }

    /// Incidents matching every key of `spec`.
    pub fn filter_incidents(
        &self,
        spec: &FilterSpec,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Incident>> {
        let query = incidents_fitting_spec(IncidentQuery::all(), spec, now);
        let incidents = self.repo.list_incidents(&query)?;
        debug!(
            "event=filter_incidents module=service status=ok predicates={} count={}",
            query.predicates().len(),
            incidents.len()
        );
        Ok(incidents)
    }

    /// Parses `tag` and attaches it to the incident.
    pub fn tag_incident(
        &self,
        incident_id: IncidentId,
        tag: &str,
        added_by: UserId,
    ) -> RepoResult<Incident> {
        let tag = Tag::parse(tag)?;
        self.repo.add_tag(incident_id, &tag, added_by)?;
        self.repo
            .get_incident(incident_id)?
            .ok_or(RepoError::NotFound {
                entity: "incident",
                id: incident_id,
            })
    }

    /// Projects incidents, resolving each source system once.
    pub fn views(&self, incidents: &[Incident], now: DateTime<Utc>) -> RepoResult<Vec<IncidentView>> {
        let mut sources: BTreeMap<SourceSystemId, SourceSystem> = BTreeMap::new();
        let mut views = Vec::with_capacity(incidents.len());
        for incident in incidents {
            let source = match sources.entry(incident.source_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(
                    self.repo
                        .get_source_system(incident.source_id)?
                        .ok_or(RepoError::NotFound {
                            entity: "source system",
                            id: incident.source_id,
                        })?,
                ),
            };
            views.push(IncidentView::new(incident, source, now));
        }
        Ok(views)
    }
}
