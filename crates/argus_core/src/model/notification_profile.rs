//! Notification profiles bind a timeslot to a set of filters.

use super::filter::FilterId;
use super::timeslot::TimeslotId;
use super::{UserId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type NotificationProfileId = i64;

/// Delivery channel for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Media {
    Email,
    Sms,
}

impl Media {
    pub fn as_str(self) -> &'static str {
        match self {
            Media::Email => "email",
            Media::Sms => "sms",
        }
    }
}

impl Display for Media {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Media {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Media::Email),
            "sms" => Ok(Media::Sms),
            other => Err(ValidationError::InvalidMedia(other.to_string())),
        }
    }
}

/// Draft of a profile that is not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotificationProfile {
    pub user_id: UserId,
    pub timeslot_id: TimeslotId,
    pub filter_ids: Vec<FilterId>,
    pub media: BTreeSet<Media>,
    pub active: bool,
}

impl NewNotificationProfile {
    /// Active, e-mail only, no filters attached.
    pub fn new(user_id: UserId, timeslot_id: TimeslotId) -> Self {
        Self {
            user_id,
            timeslot_id,
            filter_ids: Vec::new(),
            media: BTreeSet::from([Media::Email]),
            active: true,
        }
    }

    pub fn with_filters(mut self, filter_ids: impl IntoIterator<Item = FilterId>) -> Self {
        self.filter_ids.extend(filter_ids);
        self
    }
}

/// Stored notification profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationProfile {
    pub id: NotificationProfileId,
    pub user_id: UserId,
    /// Each timeslot backs at most one profile.
    pub timeslot_id: TimeslotId,
    /// Sorted ascending.
    pub filter_ids: Vec<FilterId>,
    pub media: BTreeSet<Media>,
    pub active: bool,
}

/// Joins media into their stored comma-separated form.
pub fn media_to_db(media: &BTreeSet<Media>) -> String {
    media
        .iter()
        .map(|medium| medium.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the stored comma-separated media list.
pub fn parse_media(value: &str) -> Result<BTreeSet<Media>, ValidationError> {
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}
