//! Timeslot/filter/notification-profile repository and SQLite implementation.
//!
//! # Responsibility
//! - Persist user-owned notification settings.
//! - Own multi-row writes (timeslot + recurrences, profile + filter links)
//!   with atomic semantics.
//!
//! # Invariants
//! - Recurrence days are stored as ISO weekday numbers (`"1,3"`), times as
//!   `HH:MM:SS.ffffff`.
//! - Filters are stored as their JSON specification and re-parsed on read.

use crate::model::filter::{Filter, FilterId, FilterSpec};
use crate::model::notification_profile::{
    media_to_db, parse_media, NewNotificationProfile, NotificationProfile, NotificationProfileId,
};
use crate::model::timeslot::{Day, TimeRecurrence, Timeslot, TimeslotId};
use crate::model::{UserId, ValidationError};
use crate::repo::incident_repo::{RepoError, RepoResult};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// Repository interface for notification settings.
pub trait NotificationRepository {
    fn create_timeslot(
        &self,
        user_id: UserId,
        name: &str,
        recurrences: &[TimeRecurrence],
    ) -> RepoResult<TimeslotId>;
    fn add_time_recurrence(
        &self,
        timeslot_id: TimeslotId,
        recurrence: &TimeRecurrence,
    ) -> RepoResult<()>;
    fn get_timeslot(&self, id: TimeslotId) -> RepoResult<Option<Timeslot>>;
    fn create_filter(&self, user_id: UserId, name: &str, spec: &FilterSpec)
        -> RepoResult<FilterId>;
    fn get_filter(&self, id: FilterId) -> RepoResult<Option<Filter>>;
    fn list_filters(&self, user_id: UserId) -> RepoResult<Vec<Filter>>;
    fn create_notification_profile(
        &self,
        profile: &NewNotificationProfile,
    ) -> RepoResult<NotificationProfileId>;
    /// Links one more filter; linking twice is a no-op.
    fn attach_filter(&self, profile_id: NotificationProfileId, filter_id: FilterId)
        -> RepoResult<()>;
    fn get_notification_profile(
        &self,
        id: NotificationProfileId,
    ) -> RepoResult<Option<NotificationProfile>>;
    fn list_notification_profiles(&self, active_only: bool)
        -> RepoResult<Vec<NotificationProfile>>;
}

/// SQLite-backed notification settings repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_timeslot(
        &self,
        user_id: UserId,
        name: &str,
        recurrences: &[TimeRecurrence],
    ) -> RepoResult<TimeslotId> {
        let name = non_blank(name, "timeslot name")?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO timeslots (user_id, name) VALUES (?1, ?2);",
            params![user_id, name],
        )?;
        let timeslot_id = tx.last_insert_rowid();
        for recurrence in recurrences {
            insert_recurrence(&tx, timeslot_id, recurrence)?;
        }
        tx.commit()?;
        Ok(timeslot_id)
    }

    fn add_time_recurrence(
        &self,
        timeslot_id: TimeslotId,
        recurrence: &TimeRecurrence,
    ) -> RepoResult<()> {
        if !row_exists(self.conn, "timeslots", timeslot_id)? {
            return Err(RepoError::NotFound {
                entity: "timeslot",
                id: timeslot_id,
            });
        }
        insert_recurrence(self.conn, timeslot_id, recurrence)
    }

    fn get_timeslot(&self, id: TimeslotId) -> RepoResult<Option<Timeslot>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, user_id, name FROM timeslots WHERE id = ?1;",
                [id],
                |row| {
                    Ok((
                        row.get::<_, TimeslotId>("id")?,
                        row.get::<_, UserId>("user_id")?,
                        row.get::<_, String>("name")?,
                    ))
                },
            )
            .optional()?;
        let Some((id, user_id, name)) = header else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT days, start_time, end_time
             FROM time_recurrences
             WHERE timeslot_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut recurrences = Vec::new();
        while let Some(row) = rows.next()? {
            recurrences.push(parse_recurrence_row(row)?);
        }

        Ok(Some(Timeslot {
            id,
            user_id,
            name,
            recurrences,
        }))
    }

    fn create_filter(
        &self,
        user_id: UserId,
        name: &str,
        spec: &FilterSpec,
    ) -> RepoResult<FilterId> {
        let name = non_blank(name, "filter name")?;
        let filter_string = spec.to_json()?;
        self.conn.execute(
            "INSERT INTO filters (user_id, name, filter_string) VALUES (?1, ?2, ?3);",
            params![user_id, name, filter_string],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_filter(&self, id: FilterId) -> RepoResult<Option<Filter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, filter_string FROM filters WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_filter_row(row)?));
        }
        Ok(None)
    }

    fn list_filters(&self, user_id: UserId) -> RepoResult<Vec<Filter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, filter_string
             FROM filters
             WHERE user_id = ?1
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut filters = Vec::new();
        while let Some(row) = rows.next()? {
            filters.push(parse_filter_row(row)?);
        }
        Ok(filters)
    }

    fn create_notification_profile(
        &self,
        profile: &NewNotificationProfile,
    ) -> RepoResult<NotificationProfileId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notification_profiles (user_id, timeslot_id, media, active)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                profile.user_id,
                profile.timeslot_id,
                media_to_db(&profile.media),
                profile.active,
            ],
        )?;
        let profile_id = tx.last_insert_rowid();
        for filter_id in &profile.filter_ids {
            tx.execute(
                "INSERT OR IGNORE INTO notification_profile_filters (profile_id, filter_id)
                 VALUES (?1, ?2);",
                params![profile_id, filter_id],
            )?;
        }
        tx.commit()?;
        Ok(profile_id)
    }

    fn attach_filter(
        &self,
        profile_id: NotificationProfileId,
        filter_id: FilterId,
    ) -> RepoResult<()> {
        if !row_exists(self.conn, "notification_profiles", profile_id)? {
            return Err(RepoError::NotFound {
                entity: "notification profile",
                id: profile_id,
            });
        }
        if !row_exists(self.conn, "filters", filter_id)? {
            return Err(RepoError::NotFound {
                entity: "filter",
                id: filter_id,
            });
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO notification_profile_filters (profile_id, filter_id)
             VALUES (?1, ?2);",
            params![profile_id, filter_id],
        )?;
        Ok(())
    }

    fn get_notification_profile(
        &self,
        id: NotificationProfileId,
    ) -> RepoResult<Option<NotificationProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, timeslot_id, media, active
             FROM notification_profiles
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_profile_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_notification_profiles(
        &self,
        active_only: bool,
    ) -> RepoResult<Vec<NotificationProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, timeslot_id, media, active
             FROM notification_profiles
             WHERE (?1 = 0 OR active = 1)
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([active_only])?;
        let mut profiles = Vec::new();
        while let Some(row) = rows.next()? {
            profiles.push(parse_profile_row(self.conn, row)?);
        }
        Ok(profiles)
    }
}

fn insert_recurrence(
    conn: &Connection,
    timeslot_id: TimeslotId,
    recurrence: &TimeRecurrence,
) -> RepoResult<()> {
    let days = recurrence
        .days()
        .iter()
        .map(|day| day.iso_number().to_string())
        .collect::<Vec<_>>()
        .join(",");
    conn.execute(
        "INSERT INTO time_recurrences (timeslot_id, days, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            timeslot_id,
            days,
            recurrence.start().format(TIME_FORMAT).to_string(),
            recurrence.end().format(TIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

fn parse_recurrence_row(row: &Row<'_>) -> RepoResult<TimeRecurrence> {
    let days_text: String = row.get("days")?;
    let days = days_text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u8>()
                .ok()
                .and_then(Day::from_iso_number)
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid days `{days_text}` in time_recurrences.days"
                    ))
                })
        })
        .collect::<RepoResult<Vec<Day>>>()?;
    let start = parse_time(&row.get::<_, String>("start_time")?, "time_recurrences.start_time")?;
    let end = parse_time(&row.get::<_, String>("end_time")?, "time_recurrences.end_time")?;
    Ok(TimeRecurrence::new(days, start, end)?)
}

fn parse_time(value: &str, column: &str) -> RepoResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
        .map_err(|_| RepoError::InvalidData(format!("invalid time `{value}` in {column}")))
}

fn parse_filter_row(row: &Row<'_>) -> RepoResult<Filter> {
    let id: FilterId = row.get("id")?;
    let filter_string: String = row.get("filter_string")?;
    let spec = FilterSpec::from_json(&filter_string).map_err(|err| {
        RepoError::InvalidData(format!("filter {id} has invalid filter_string: {err}"))
    })?;
    Ok(Filter {
        id,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        spec,
    })
}

fn parse_profile_row(conn: &Connection, row: &Row<'_>) -> RepoResult<NotificationProfile> {
    let id: NotificationProfileId = row.get("id")?;
    let media_text: String = row.get("media")?;
    let media = parse_media(&media_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid media `{media_text}` in notification_profiles.media"
        ))
    })?;

    let mut stmt = conn.prepare(
        "SELECT filter_id
         FROM notification_profile_filters
         WHERE profile_id = ?1
         ORDER BY filter_id ASC;",
    )?;
    let filter_ids = stmt
        .query_map([id], |row| row.get::<_, FilterId>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NotificationProfile {
        id,
        user_id: row.get("user_id")?,
        timeslot_id: row.get("timeslot_id")?,
        filter_ids,
        media,
        active: row.get("active")?,
    })
}

fn row_exists(conn: &Connection, table: &'static str, id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn non_blank<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::BlankName(field))
    } else {
        Ok(trimmed)
    }
}
