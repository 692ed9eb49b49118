mod common;

use argus_core::db::open_db_in_memory;
use argus_core::{
    Day, FilterSpec, IncidentRepository, IncidentService, IncidentView, Media, NewIncident,
    NewNotificationProfile, NotificationRepository, NotificationService,
    NotificationServiceError, SqliteIncidentRepository, SqliteNotificationRepository,
    TimeRecurrence,
};
use chrono::Utc;
use common::{ids, init_mock_data, monday_datetime, parse_time, set_time, MockIncidentData};
use rusqlite::Connection;
use std::collections::BTreeSet;

fn service(
    conn: &Connection,
) -> NotificationService<SqliteNotificationRepository<'_>, SqliteIncidentRepository<'_>> {
    NotificationService::new(
        SqliteNotificationRepository::new(conn),
        SqliteIncidentRepository::new(conn),
    )
}

fn source_filter(conn: &Connection, data: &MockIncidentData, name: &str, source: i64) -> i64 {
    SqliteNotificationRepository::new(conn)
        .create_filter(
            data.user,
            name,
            &FilterSpec::from_json(&format!(r#"{{"sourceSystemIds": [{source}]}}"#)).unwrap(),
        )
        .unwrap()
}

#[test]
fn incidents_filtered_by_notification_profile_render_as_json() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteNotificationRepository::new(&conn);
    let now = Utc::now();

    let timeslot_id = repo.create_timeslot(data.user, "Never", &[]).unwrap();
    let filter_id = source_filter(&conn, &data, "Critical incidents", data.nav1);
    let profile_id = repo
        .create_notification_profile(&NewNotificationProfile::new(data.user, timeslot_id))
        .unwrap();
    repo.attach_filter(profile_id, filter_id).unwrap();

    let selected = service(&conn).profile_incidents(profile_id, now).unwrap();
    assert_eq!(ids(&selected), vec![data.incident1]);

    let incidents = IncidentService::new(SqliteIncidentRepository::new(&conn));
    let views = incidents.views(&selected, now).unwrap();
    let incident1 = incidents.get_incident(data.incident1).unwrap().unwrap();
    let source = SqliteIncidentRepository::new(&conn)
        .get_source_system(data.nav1)
        .unwrap()
        .unwrap();
    assert_eq!(views, vec![IncidentView::new(&incident1, &source, now)]);

    let json = serde_json::to_value(&views).unwrap();
    assert_eq!(json[0]["pk"], data.incident1);
    assert_eq!(json[0]["source"]["type"], "nav");
    assert_eq!(json[0]["source"]["name"], "Gløshaugen");
    assert_eq!(json[0]["source_incident_id"], "123");
    assert_eq!(json[0]["end_time"], serde_json::Value::Null);
    assert_eq!(json[0]["stateful"], false);
    assert_eq!(
        json[0]["tags"],
        serde_json::json!(["location=Oslo", "object=1"])
    );
}

#[test]
fn open_incident_renders_infinite_end_time() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteIncidentRepository::new(&conn);
    let now = Utc::now();
    let open_id = repo
        .create_incident(&NewIncident::open(data.zabbix1, now))
        .unwrap();

    let incidents = IncidentService::new(SqliteIncidentRepository::new(&conn));
    let open = incidents.get_incident(open_id).unwrap().unwrap();
    let json = serde_json::to_value(incidents.views(&[open], now).unwrap()).unwrap();
    assert_eq!(json[0]["end_time"], "infinity");
    assert_eq!(json[0]["open"], true);
}

#[test]
fn profile_incidents_are_union_of_filters_without_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteNotificationRepository::new(&conn);
    let now = Utc::now();

    let nav_filter = source_filter(&conn, &data, "nav", data.nav1);
    let zabbix_filter = source_filter(&conn, &data, "zabbix", data.zabbix1);
    let oslo_filter = repo
        .create_filter(
            data.user,
            "oslo",
            &FilterSpec::from_json(r#"{"tags": ["location=Oslo"]}"#).unwrap(),
        )
        .unwrap();
    let empty_filter = repo
        .create_filter(data.user, "empty", &FilterSpec::default())
        .unwrap();
    let timeslot_id = repo.create_timeslot(data.user, "Always", &[]).unwrap();
    let profile_id = repo
        .create_notification_profile(
            &NewNotificationProfile::new(data.user, timeslot_id)
                .with_filters([nav_filter, zabbix_filter, oslo_filter, empty_filter]),
        )
        .unwrap();

    let selected = service(&conn).profile_incidents(profile_id, now).unwrap();
    let order: Vec<i64> = selected.iter().map(|incident| incident.id).collect();
    assert_eq!(order, vec![data.incident2, data.incident1]);
}

#[test]
fn profile_with_only_empty_filters_selects_nothing() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteNotificationRepository::new(&conn);

    let empty_filter = repo
        .create_filter(data.user, "empty", &FilterSpec::default())
        .unwrap();
    let timeslot_id = repo.create_timeslot(data.user, "Always", &[]).unwrap();
    let profile_id = repo
        .create_notification_profile(
            &NewNotificationProfile::new(data.user, timeslot_id).with_filters([empty_filter]),
        )
        .unwrap();

    assert!(service(&conn)
        .profile_incidents(profile_id, Utc::now())
        .unwrap()
        .is_empty());
}

#[test]
fn missing_records_are_reported_as_not_found() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let service = service(&conn);

    assert!(matches!(
        service.profile_incidents(999, Utc::now()),
        Err(NotificationServiceError::NotFound {
            entity: "notification profile",
            id: 999
        })
    ));
    assert!(matches!(
        service.timeslot_contains(42, &Utc::now()),
        Err(NotificationServiceError::NotFound { entity: "timeslot", .. })
    ));
    assert!(matches!(
        SqliteNotificationRepository::new(&conn).attach_filter(999, 1),
        Err(argus_core::RepoError::NotFound { .. })
    ));
    assert!(matches!(
        SqliteIncidentRepository::new(&conn).add_tag(
            999,
            &argus_core::Tag::parse("object=1").unwrap(),
            data.user
        ),
        Err(argus_core::RepoError::NotFound { entity: "incident", .. })
    ));
}

#[test]
fn profiles_to_notify_respect_timeslot_filters_and_active_flag() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteNotificationRepository::new(&conn);
    let incidents = SqliteIncidentRepository::new(&conn);

    let monday_night = TimeRecurrence::new(
        [Day::Monday],
        parse_time("00:00:00"),
        parse_time("06:00:00"),
    )
    .unwrap();
    let nav_filter = source_filter(&conn, &data, "nav", data.nav1);
    let zabbix_filter = source_filter(&conn, &data, "zabbix", data.zabbix1);

    let night_slot = repo
        .create_timeslot(data.user, "Night", &[monday_night.clone()])
        .unwrap();
    let night_profile = repo
        .create_notification_profile(
            &NewNotificationProfile::new(data.user, night_slot).with_filters([nav_filter]),
        )
        .unwrap();

    let zabbix_slot = repo
        .create_timeslot(data.user, "Zabbix night", &[monday_night.clone()])
        .unwrap();
    repo.create_notification_profile(
        &NewNotificationProfile::new(data.user, zabbix_slot).with_filters([zabbix_filter]),
    )
    .unwrap();

    let inactive_slot = repo
        .create_timeslot(data.user, "Inactive", &[monday_night])
        .unwrap();
    let mut inactive = NewNotificationProfile::new(data.user, inactive_slot).with_filters([nav_filter]);
    inactive.active = false;
    inactive.media = BTreeSet::from([Media::Sms]);
    let inactive_id = repo.create_notification_profile(&inactive).unwrap();
    let stored_inactive = repo.get_notification_profile(inactive_id).unwrap().unwrap();
    assert!(!stored_inactive.active);
    assert_eq!(stored_inactive.media, BTreeSet::from([Media::Sms]));

    let service = service(&conn);
    let during = set_time(&monday_datetime(), "03:00");
    let notified = service.profiles_to_notify(data.incident1, &during).unwrap();
    assert_eq!(
        notified.iter().map(|profile| profile.id).collect::<Vec<_>>(),
        vec![night_profile]
    );

    let after = set_time(&monday_datetime(), "06:00:01");
    assert!(service
        .profiles_to_notify(data.incident1, &after)
        .unwrap()
        .is_empty());

    let incident1 = incidents.get_incident(data.incident1).unwrap().unwrap();
    let night = repo.get_notification_profile(night_profile).unwrap().unwrap();
    assert!(service
        .profile_incident_fits(&night, &incident1, during)
        .unwrap());
}

#[test]
fn tag_incident_parses_and_attaches_tags() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let incidents = IncidentService::new(SqliteIncidentRepository::new(&conn));

    let tagged = incidents
        .tag_incident(data.incident1, "host=vm1=primary", data.user)
        .unwrap();
    let host = argus_core::Tag::parse("host=vm1=primary").unwrap();
    assert_eq!(host.value(), "vm1=primary");
    assert!(tagged.has_tag(&host));

    let again = incidents
        .tag_incident(data.incident1, "host=vm1=primary", data.user)
        .unwrap();
    assert_eq!(again.tags.len(), tagged.tags.len());

    assert!(matches!(
        incidents.tag_incident(data.incident1, "Bad Key=1", data.user),
        Err(argus_core::RepoError::Validation(_))
    ));
    assert!(incidents
        .tag_incident(data.incident1, "novalue", data.user)
        .is_err());
}

#[test]
fn views_keep_every_incident_and_report_unknown_sources() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteIncidentRepository::new(&conn);
    let now = Utc::now();
    let extra = repo
        .create_incident(&NewIncident::stateless(data.nav1, now))
        .unwrap();

    let incidents = IncidentService::new(SqliteIncidentRepository::new(&conn));
    let all = incidents
        .list_incidents(&argus_core::IncidentQuery::all())
        .unwrap();
    let views = incidents.views(&all, now).unwrap();
    assert_eq!(
        views.iter().map(|view| view.pk).collect::<Vec<_>>(),
        all.iter().map(|incident| incident.id).collect::<Vec<_>>()
    );
    assert!(views.iter().any(|view| view.pk == extra));
    assert_eq!(
        views.iter().filter(|view| view.source.pk == data.nav1).count(),
        2
    );

    let mut orphan = incidents.get_incident(extra).unwrap().unwrap();
    orphan.source_id = 999;
    assert!(matches!(
        incidents.views(&[orphan], now),
        Err(argus_core::RepoError::NotFound {
            entity: "source system",
            id: 999
        })
    ));
}
