//! Notification profile use-case service.
//!
//! # Responsibility
//! - Resolve the incidents selected by a filter or a notification profile.
//! - Decide which profiles should be notified about an incident.
//!
//! # Invariants
//! - A profile selects the union of its filters' incidents, ordered by
//!   `start_time DESC, id DESC` without duplicates.
//! - A profile is notified only when active, when its timeslot contains the
//!   timestamp and when at least one of its filters fits the incident.

use crate::filter::queryset::filtered_incidents;
use crate::model::filter::{Filter, FilterId};
use crate::model::incident::{Incident, IncidentId};
use crate::model::notification_profile::{NotificationProfile, NotificationProfileId};
use crate::model::timeslot::TimeslotId;
use crate::repo::incident_repo::{IncidentRepository, RepoError};
use crate::repo::notification_repo::NotificationRepository;
use chrono::{DateTime, TimeZone, Utc};
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for notification use-cases.
#[derive(Debug)]
pub enum NotificationServiceError {
    /// A referenced record does not exist.
    NotFound { entity: &'static str, id: i64 },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for NotificationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotificationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<RepoError> for NotificationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationServiceError>;

/// Service facade over notification and incident repositories.
pub struct NotificationService<N: NotificationRepository, I: IncidentRepository> {
    notifications: N,
    incidents: I,
}

impl<N: NotificationRepository, I: IncidentRepository> NotificationService<N, I> {
    pub fn new(notifications: N, incidents: I) -> Self {
        Self {
            notifications,
            incidents,
        }
    }

    /// Incidents selected by one stored filter. Empty filters select nothing.
    pub fn filter_incidents(
        &self,
        filter_id: FilterId,
        now: DateTime<Utc>,
    ) -> NotificationResult<Vec<Incident>> {
        let filter = self.require_filter(filter_id)?;
        Ok(self
            .incidents
            .list_incidents(&filtered_incidents(&filter, now))?)
    }

    /// Union of the incidents selected by the profile's filters.
    pub fn profile_incidents(
        &self,
        profile_id: NotificationProfileId,
        now: DateTime<Utc>,
    ) -> NotificationResult<Vec<Incident>> {
        let profile = self.require_profile(profile_id)?;

        let mut selected: BTreeMap<(DateTime<Utc>, IncidentId), Incident> = BTreeMap::new();
        for filter_id in &profile.filter_ids {
            let filter = self.require_filter(*filter_id)?;
            for incident in self
                .incidents
                .list_incidents(&filtered_incidents(&filter, now))?
            {
                selected
                    .entry((incident.start_time, incident.id))
                    .or_insert(incident);
            }
        }

        let incidents: Vec<Incident> = selected.into_values().rev().collect();
        info!(
            "event=profile_incidents module=service status=ok profile_id={} filters={} count={}",
            profile_id,
            profile.filter_ids.len(),
            incidents.len()
        );
        Ok(incidents)
    }

    /// True when any of the profile's filters fits the incident.
    pub fn profile_incident_fits(
        &self,
        profile: &NotificationProfile,
        incident: &Incident,
        now: DateTime<Utc>,
    ) -> NotificationResult<bool> {
        for filter_id in &profile.filter_ids {
            if self.require_filter(*filter_id)?.incident_fits(incident, now) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether the timeslot's recurrences contain `at`.
    pub fn timeslot_contains<Tz: TimeZone>(
        &self,
        timeslot_id: TimeslotId,
        at: &DateTime<Tz>,
    ) -> NotificationResult<bool> {
        let timeslot = self
            .notifications
            .get_timeslot(timeslot_id)?
            .ok_or(NotificationServiceError::NotFound {
                entity: "timeslot",
                id: timeslot_id,
            })?;
        Ok(timeslot.timestamp_is_within_time_recurrences(at))
    }

    /// Active profiles to notify about `incident_id` at time `at`.
    ///
    /// The timeslot is checked in `at`'s timezone; filters are evaluated at
    /// the same instant.
    pub fn profiles_to_notify<Tz: TimeZone>(
        &self,
        incident_id: IncidentId,
        at: &DateTime<Tz>,
    ) -> NotificationResult<Vec<NotificationProfile>> {
        let incident = self
            .incidents
            .get_incident(incident_id)?
            .ok_or(NotificationServiceError::NotFound {
                entity: "incident",
                id: incident_id,
            })?;
        let now = at.with_timezone(&Utc);

        let mut profiles = Vec::new();
        for profile in self.notifications.list_notification_profiles(true)? {
            if !self.timeslot_contains(profile.timeslot_id, at)? {
                continue;
            }
            if self.profile_incident_fits(&profile, &incident, now)? {
                profiles.push(profile);
            }
        }

        info!(
            "event=profiles_to_notify module=service status=ok incident_id={} count={}",
            incident_id,
            profiles.len()
        );
        Ok(profiles)
    }

    fn require_profile(
        &self,
        profile_id: NotificationProfileId,
    ) -> NotificationResult<NotificationProfile> {
        self.notifications
            .get_notification_profile(profile_id)?
            .ok_or(NotificationServiceError::NotFound {
                entity: "notification profile",
                id: profile_id,
            })
    }

    fn require_filter(&self, filter_id: FilterId) -> NotificationResult<Filter> {
        self.notifications
            .get_filter(filter_id)?
            .ok_or(NotificationServiceError::NotFound {
                entity: "filter",
                id: filter_id,
            })
    }
}
