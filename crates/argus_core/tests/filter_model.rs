mod common;

use argus_core::db::open_db_in_memory;
use argus_core::{
    FilterSpec, IncidentRepository, NewIncident, NotificationRepository, NotificationService,
    SqliteIncidentRepository, SqliteNotificationRepository,
};
use chrono::{Duration, Utc};
use common::{ids, init_mock_data};

#[test]
fn source_system_fits_checks_incident_source() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let incidents = SqliteIncidentRepository::new(&conn);
    let notifications = SqliteNotificationRepository::new(&conn);

    let spec1 = FilterSpec::from_json(&format!(r#"{{"sourceSystemIds": [{}]}}"#, data.nav1)).unwrap();
    let spec2 =
        FilterSpec::from_json(&format!(r#"{{"sourceSystemIds": [{}]}}"#, data.zabbix1)).unwrap();
    let filter1_id = notifications.create_filter(data.user, "Filter1", &spec1).unwrap();
    let filter2_id = notifications.create_filter(data.user, "Filter2", &spec2).unwrap();
    let filter1 = notifications.get_filter(filter1_id).unwrap().unwrap();
    let filter2 = notifications.get_filter(filter2_id).unwrap().unwrap();

    let incident1 = incidents.get_incident(data.incident1).unwrap().unwrap();
    assert!(filter1.source_system_fits(&incident1));
    assert!(!filter2.source_system_fits(&incident1));
}

#[test]
fn tags_fit_requires_every_filter_tag() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let incidents = SqliteIncidentRepository::new(&conn);
    let notifications = SqliteNotificationRepository::new(&conn);

    let mut filters = Vec::new();
    for (name, json) in [
        ("Filter1", r#"{"tags": []}"#),
        ("Filter2", r#"{"tags": ["object=1"]}"#),
        ("Filter3", r#"{"tags": ["object=2"]}"#),
        ("Filter4", r#"{"tags": ["object=1", "location=Oslo"]}"#),
        ("Filter5", r#"{"tags": ["object=1", "location=Bergen"]}"#),
    ] {
        let id = notifications
            .create_filter(data.user, name, &FilterSpec::from_json(json).unwrap())
            .unwrap();
        filters.push(notifications.get_filter(id).unwrap().unwrap());
    }

    let incident1 = incidents.get_incident(data.incident1).unwrap().unwrap();
    assert!(filters[0].tags_fit(&incident1));
    assert!(filters[1].tags_fit(&incident1));
    assert!(!filters[2].tags_fit(&incident1));
    assert!(filters[3].tags_fit(&incident1));
    assert!(!filters[4].tags_fit(&incident1));
}

#[test]
fn incident_fits_and_filtered_incidents_agree() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let incidents = SqliteIncidentRepository::new(&conn);
    let notifications = SqliteNotificationRepository::new(&conn);
    let now = Utc::now();

    let filter1_id = notifications
        .create_filter(
            data.user,
            "Filter1",
            &FilterSpec::from_json(&format!(r#"{{"sourceSystemIds": [{}]}}"#, data.nav1)).unwrap(),
        )
        .unwrap();
    let filter2_id = notifications
        .create_filter(
            data.user,
            "Filter2",
            &FilterSpec::from_json(&format!(r#"{{"sourceSystemIds": [{}]}}"#, data.zabbix1))
                .unwrap(),
        )
        .unwrap();
    let filter1 = notifications.get_filter(filter1_id).unwrap().unwrap();
    let filter2 = notifications.get_filter(filter2_id).unwrap().unwrap();

    let incident1 = incidents.get_incident(data.incident1).unwrap().unwrap();
    let incident2 = incidents.get_incident(data.incident2).unwrap().unwrap();

    assert!(filter1.incident_fits(&incident1, now));
    assert!(!filter1.incident_fits(&incident2, now));
    assert!(!filter2.incident_fits(&incident1, now));
    assert!(filter2.incident_fits(&incident2, now));

    let service = NotificationService::new(
        SqliteNotificationRepository::new(&conn),
        SqliteIncidentRepository::new(&conn),
    );
    assert_eq!(
        ids(&service.filter_incidents(filter1_id, now).unwrap()),
        vec![data.incident1]
    );
    assert_eq!(
        ids(&service.filter_incidents(filter2_id, now).unwrap()),
        vec![data.incident2]
    );
}

#[test]
fn empty_stored_filter_fits_nothing() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let incidents = SqliteIncidentRepository::new(&conn);
    let notifications = SqliteNotificationRepository::new(&conn);
    let now = Utc::now();

    let filter_id = notifications
        .create_filter(data.user, "Empty", &FilterSpec::default())
        .unwrap();
    let filter = notifications.get_filter(filter_id).unwrap().unwrap();
    let incident1 = incidents.get_incident(data.incident1).unwrap().unwrap();

    assert!(!filter.incident_fits(&incident1, now));
    assert!(filter.spec.matches(&incident1, now));
}

#[test]
fn in_memory_select_matches_tristates_and_level() {
    let conn = open_db_in_memory().unwrap();
    let data = init_mock_data(&conn);
    let repo = SqliteIncidentRepository::new(&conn);
    let now = Utc::now();

    let open_id = repo
        .create_incident(&NewIncident::open(data.nav1, now - Duration::hours(1)).with_level(2))
        .unwrap();
    let closed_id = repo
        .create_incident(
            &NewIncident::stateless(data.nav1, now - Duration::hours(2))
                .with_end_time(Some(now - Duration::hours(1)))
                .with_level(1),
        )
        .unwrap();
    let all = [data.incident1, data.incident2, open_id, closed_id]
        .into_iter()
        .map(|id| repo.get_incident(id).unwrap().unwrap())
        .collect::<Vec<_>>();

    let select = |json: &str| ids(FilterSpec::from_json(json).unwrap().select(&all, now));

    assert_eq!(select("{}").len(), 4);
    assert_eq!(select(r#"{"stateful": true}"#), vec![open_id, closed_id]);
    assert_eq!(select(r#"{"stateful": false}"#), vec![data.incident1, data.incident2]);
    assert_eq!(select(r#"{"open": true}"#), vec![open_id]);
    assert_eq!(select(r#"{"open": false}"#), vec![closed_id]);
    assert_eq!(select(r#"{"maxlevel": 2}"#), vec![open_id, closed_id]);
    assert_eq!(select(r#"{"maxlevel": 1, "stateful": true}"#), vec![closed_id]);
}
