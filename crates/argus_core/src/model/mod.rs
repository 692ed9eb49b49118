//! Domain records for incidents and notification settings.
//!
//! # Responsibility
//! - Define incidents, tags and source systems as read from storage.
//! - Define the user-owned notification settings: timeslots, filters and
//!   notification profiles.
//! - Hold the pure predicate logic (recurrence containment, filter fit).
//!
//! # Invariants
//! - Records with an `id` were read back from storage; drafts (`New*`) have
//!   no id yet.
//! - Constructors validate their input and return [`ValidationError`].

pub mod filter;
pub mod incident;
pub mod notification_profile;
pub mod tag;
pub mod timeslot;
mod validation;

pub use validation::ValidationError;

/// Storage id of a user.
pub type UserId = i64;
