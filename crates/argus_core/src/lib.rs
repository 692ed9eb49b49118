//! Core domain logic for Argus incident handling.
//! This crate owns incident storage, filter evaluation and notification
//! scheduling rules.

pub mod db;
pub mod filter;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use filter::queryset::{
    filtered_incidents, incidents_fitting_maxlevel, incidents_fitting_spec,
    incidents_fitting_tristates, incidents_with_source_systems, incidents_with_tags,
    IncidentPredicate, IncidentQuery,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::filter::{Filter, FilterError, FilterId, FilterSpec};
pub use model::incident::{
    Incident, IncidentId, NewIncident, SourceSystem, SourceSystemId, User, INFINITY,
    MAX_INCIDENT_LEVEL, MIN_INCIDENT_LEVEL,
};
pub use model::notification_profile::{
    Media, NewNotificationProfile, NotificationProfile, NotificationProfileId,
};
pub use model::tag::Tag;
pub use model::timeslot::{day_end, day_start, Day, TimeRecurrence, Timeslot, TimeslotId};
pub use model::{UserId, ValidationError};
pub use repo::incident_repo::{
    IncidentRepository, RepoError, RepoResult, SqliteIncidentRepository,
};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use service::incident_service::{IncidentService, IncidentView, SourceSystemView};
pub use service::notification_service::{
    NotificationResult, NotificationService, NotificationServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
