#![allow(dead_code)]

use argus_core::{
    IncidentId, IncidentRepository, NewIncident, SourceSystemId, SqliteIncidentRepository, Tag,
    UserId,
};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rusqlite::Connection;

pub const TAGSTR1: &str = "object=1";
pub const TAGSTR2: &str = "object=2";
pub const TAGSTR3: &str = "location=Oslo";

/// Two stateless incidents from different source systems.
///
/// - `incident1` from `nav1`, tagged `object=1` and `location=Oslo`.
/// - `incident2` from `zabbix1`, tagged `object=2` and `location=Oslo`.
pub struct MockIncidentData {
    pub user: UserId,
    pub nav1: SourceSystemId,
    pub zabbix1: SourceSystemId,
    pub incident1: IncidentId,
    pub incident2: IncidentId,
}

pub fn init_mock_data(conn: &Connection) -> MockIncidentData {
    let repo = SqliteIncidentRepository::new(conn);
    let user = repo.create_user("asdf").unwrap();

    repo.create_source_system_type("nav").unwrap();
    repo.create_source_system_type("zabbix").unwrap();

    let nav_user = repo.create_user("nav.glos.no").unwrap();
    let zabbix_user = repo.create_user("zabbix.glos.no").unwrap();
    let nav1 = repo
        .create_source_system("Gløshaugen", "nav", nav_user)
        .unwrap();
    let zabbix1 = repo
        .create_source_system("Gløshaugen", "zabbix", zabbix_user)
        .unwrap();

    let start = Utc::now();
    let incident1 = repo
        .create_incident(&NewIncident::stateless(nav1, start).with_source_incident_id("123"))
        .unwrap();
    let incident2 = repo
        .create_incident(&NewIncident::stateless(zabbix1, start).with_source_incident_id("123"))
        .unwrap();

    let tag1 = Tag::parse(TAGSTR1).unwrap();
    let tag2 = Tag::parse(TAGSTR2).unwrap();
    let tag3 = Tag::parse(TAGSTR3).unwrap();
    repo.add_tag(incident1, &tag1, user).unwrap();
    repo.add_tag(incident1, &tag3, user).unwrap();
    repo.add_tag(incident2, &tag2, user).unwrap();
    repo.add_tag(incident2, &tag3, user).unwrap();

    MockIncidentData {
        user,
        nav1,
        zabbix1,
        incident1,
        incident2,
    }
}

/// 2019-11-25 was a Monday.
pub fn monday_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 25, 0, 0, 0).unwrap()
}

pub fn parse_time(value: &str) -> NaiveTime {
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .unwrap()
}

/// Same date and timezone, new time of day.
pub fn set_time<Tz: TimeZone>(timestamp: &DateTime<Tz>, new_time: &str) -> DateTime<Tz> {
    let local = timestamp.naive_local().date().and_time(parse_time(new_time));
    timestamp
        .timezone()
        .from_local_datetime(&local)
        .single()
        .unwrap()
}

pub fn ids<'a>(incidents: impl IntoIterator<Item = &'a argus_core::Incident>) -> Vec<IncidentId> {
    let mut ids: Vec<IncidentId> = incidents.into_iter().map(|incident| incident.id).collect();
    ids.sort_unstable();
    ids
}
