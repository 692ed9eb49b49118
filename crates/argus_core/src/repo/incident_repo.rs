//! Incident repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist users, source systems, incidents and incident tags.
//! - Evaluate [`IncidentQuery`] predicates as SQL.
//!
//! # Invariants
//! - Write paths validate drafts before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Listing order is `start_time DESC, id DESC`.

use crate::db::DbError;
use crate::filter::queryset::{IncidentPredicate, IncidentQuery};
use crate::model::filter::FilterError;
use crate::model::incident::{
    Incident, IncidentId, NewIncident, SourceSystem, SourceSystemId, User, INFINITY,
};
use crate::model::tag::Tag;
use crate::model::{UserId, ValidationError};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const INCIDENT_SELECT_SQL: &str = "SELECT
    id,
    start_time,
    end_time,
    source_id,
    source_incident_id,
    details_url,
    description,
    level,
    ticket_url
FROM incidents";

/// Stored representation of [`INFINITY`].
const INFINITY_MILLIS: i64 = i64::MAX;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Filter(FilterError),
    Db(DbError),
    NotFound { entity: &'static str, id: i64 },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Filter(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Filter(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<FilterError> for RepoError {
    fn from(value: FilterError) -> Self {
        Self::Filter(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for incidents and the records they reference.
pub trait IncidentRepository {
    fn create_user(&self, username: &str) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Registers a source system type; existing names are kept.
    fn create_source_system_type(&self, name: &str) -> RepoResult<()>;
    fn create_source_system(
        &self,
        name: &str,
        type_name: &str,
        user_id: UserId,
    ) -> RepoResult<SourceSystemId>;
    fn get_source_system(&self, id: SourceSystemId) -> RepoResult<Option<SourceSystem>>;
    fn list_source_systems(&self) -> RepoResult<Vec<SourceSystem>>;
    fn create_incident(&self, incident: &NewIncident) -> RepoResult<IncidentId>;
    /// Replaces every stored field except tags.
    fn update_incident(&self, incident: &Incident) -> RepoResult<()>;
    fn get_incident(&self, id: IncidentId) -> RepoResult<Option<Incident>>;
    fn list_incidents(&self, query: &IncidentQuery) -> RepoResult<Vec<Incident>>;
    /// Attaches a tag; attaching the same tag twice is a no-op.
    fn add_tag(&self, incident_id: IncidentId, tag: &Tag, added_by: UserId) -> RepoResult<()>;
}

/// SQLite-backed incident repository.
pub struct SqliteIncidentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIncidentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl IncidentRepository for SqliteIncidentRepository<'_> {
    fn create_user(&self, username: &str) -> RepoResult<UserId> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::BlankName("username").into());
        }
        self.conn
            .execute("INSERT INTO users (username) VALUES (?1);", [username])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username FROM users WHERE id = ?1;",
                [id],
                |row| {
                    Ok(User {
                        id: row.get("id")?,
                        username: row.get("username")?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn create_source_system_type(&self, name: &str) -> RepoResult<()> {
        let name = normalize_type_name(name)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO source_system_types (name) VALUES (?1);",
            [name.as_str()],
        )?;
        Ok(())
    }

    fn create_source_system(
        &self,
        name: &str,
        type_name: &str,
        user_id: UserId,
    ) -> RepoResult<SourceSystemId> {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankName("source system name").into());
        }
        let type_name = normalize_type_name(type_name)?;
        self.conn.execute(
            "INSERT INTO source_systems (name, type_name, user_id) VALUES (?1, ?2, ?3);",
            params![name.trim(), type_name, user_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_source_system(&self, id: SourceSystemId) -> RepoResult<Option<SourceSystem>> {
        let source = self
            .conn
            .query_row(
                "SELECT id, name, type_name, user_id FROM source_systems WHERE id = ?1;",
                [id],
                parse_source_system_row,
            )
            .optional()?;
        Ok(source)
    }

    fn list_source_systems(&self) -> RepoResult<Vec<SourceSystem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, type_name, user_id FROM source_systems ORDER BY id ASC;",
        )?;
        let sources = stmt
            .query_map([], parse_source_system_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn create_incident(&self, incident: &NewIncident) -> RepoResult<IncidentId> {
        incident.validate()?;

        self.conn.execute(
            "INSERT INTO incidents (
                start_time,
                end_time,
                source_id,
                source_incident_id,
                details_url,
                description,
                level,
                ticket_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                time_to_db(incident.start_time),
                incident.end_time.map(time_to_db),
                incident.source_id,
                incident.source_incident_id.as_str(),
                incident.details_url.as_str(),
                incident.description.as_str(),
                incident.level,
                incident.ticket_url.as_str(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_incident(&self, incident: &Incident) -> RepoResult<()> {
        incident.validate()?;

        let changed = self.conn.execute(
            "UPDATE incidents
             SET
                start_time = ?1,
                end_time = ?2,
                source_id = ?3,
                source_incident_id = ?4,
                details_url = ?5,
                description = ?6,
                level = ?7,
                ticket_url = ?8
             WHERE id = ?9;",
            params![
                time_to_db(incident.start_time),
                incident.end_time.map(time_to_db),
                incident.source_id,
                incident.source_incident_id.as_str(),
                incident.details_url.as_str(),
                incident.description.as_str(),
                incident.level,
                incident.ticket_url.as_str(),
                incident.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "incident",
                id: incident.id,
            });
        }
        Ok(())
    }

    fn get_incident(&self, id: IncidentId) -> RepoResult<Option<Incident>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INCIDENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_incident_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_incidents(&self, query: &IncidentQuery) -> RepoResult<Vec<Incident>> {
        let mut sql = format!("{INCIDENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        for predicate in query.predicates() {
            push_predicate(&mut sql, &mut bind_values, predicate);
        }

        sql.push_str(" ORDER BY start_time DESC, id DESC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut incidents = Vec::new();
        while let Some(row) = rows.next()? {
            incidents.push(parse_incident_row(self.conn, row)?);
        }
        Ok(incidents)
    }

    fn add_tag(&self, incident_id: IncidentId, tag: &Tag, added_by: UserId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM incidents WHERE id = ?1);",
            [incident_id],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound {
                entity: "incident",
                id: incident_id,
            });
        }

        tx.execute(
            "INSERT OR IGNORE INTO tags (key, value) VALUES (?1, ?2);",
            params![tag.key(), tag.value()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO incident_tags (incident_id, tag_id, added_by)
             SELECT ?1, id, ?2
             FROM tags
             WHERE key = ?3 AND value = ?4;",
            params![incident_id, added_by, tag.key(), tag.value()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn push_predicate(sql: &mut String, bind_values: &mut Vec<Value>, predicate: &IncidentPredicate) {
    match predicate {
        IncidentPredicate::SourceIn(ids) => {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND source_id IN ({placeholders})"));
            bind_values.extend(ids.iter().map(|id| Value::Integer(*id)));
        }
        IncidentPredicate::HasTag(tag) => {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM incident_tags it
                    INNER JOIN tags t ON t.id = it.tag_id
                    WHERE it.incident_id = incidents.id
                      AND t.key = ?
                      AND t.value = ?
                )",
            );
            bind_values.push(Value::Text(tag.key().to_string()));
            bind_values.push(Value::Text(tag.value().to_string()));
        }
        IncidentPredicate::LevelAtMost(max) => {
            sql.push_str(" AND level <= ?");
            bind_values.push(Value::Integer(*max));
        }
        IncidentPredicate::Stateful(true) => sql.push_str(" AND end_time IS NOT NULL"),
        IncidentPredicate::Stateful(false) => sql.push_str(" AND end_time IS NULL"),
        IncidentPredicate::Open { open, now } => {
            let op = if *open { ">" } else { "<=" };
            sql.push_str(&format!(" AND end_time IS NOT NULL AND end_time {op} ?"));
            bind_values.push(Value::Integer(now.timestamp_millis()));
        }
        IncidentPredicate::Nothing => sql.push_str(" AND 0 = 1"),
    }
}

fn parse_incident_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Incident> {
    let id: IncidentId = row.get("id")?;
    let level = match row.get::<_, i64>("level")? {
        value @ 1..=5 => value as u8,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid level `{other}` in incidents.level"
            )));
        }
    };

    let incident = Incident {
        id,
        start_time: time_from_db(row.get("start_time")?, "incidents.start_time")?,
        end_time: match row.get::<_, Option<i64>>("end_time")? {
            Some(value) => Some(time_from_db(value, "incidents.end_time")?),
            None => None,
        },
        source_id: row.get("source_id")?,
        source_incident_id: row.get("source_incident_id")?,
        details_url: row.get("details_url")?,
        description: row.get("description")?,
        level,
        ticket_url: row.get("ticket_url")?,
        tags: load_tags_for_incident(conn, id)?,
    };
    incident.validate()?;
    Ok(incident)
}

fn parse_source_system_row(row: &Row<'_>) -> rusqlite::Result<SourceSystem> {
    Ok(SourceSystem {
        id: row.get("id")?,
        name: row.get("name")?,
        type_name: row.get("type_name")?,
        user_id: row.get("user_id")?,
    })
}

fn load_tags_for_incident(conn: &Connection, incident_id: IncidentId) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.key, t.value
         FROM incident_tags it
         INNER JOIN tags t ON t.id = it.tag_id
         WHERE it.incident_id = ?1
         ORDER BY t.key ASC, t.value ASC;",
    )?;
    let mut rows = stmt.query([incident_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let value: String = row.get(1)?;
        let tag = Tag::new(key.as_str(), value.as_str()).map_err(|_| {
            RepoError::InvalidData(format!("invalid tag `{key}={value}` in tags"))
        })?;
        tags.push(tag);
    }
    Ok(tags)
}

fn normalize_type_name(name: &str) -> RepoResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankName("source system type").into());
    }
    Ok(trimmed.to_lowercase())
}

pub(crate) fn time_to_db(value: DateTime<Utc>) -> i64 {
    if value == INFINITY {
        INFINITY_MILLIS
    } else {
        value.timestamp_millis()
    }
}

pub(crate) fn time_from_db(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    if value == INFINITY_MILLIS {
        return Ok(INFINITY);
    }
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}
