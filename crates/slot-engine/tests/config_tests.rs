//! Configuration loading and the file-backed calendar.

use std::collections::HashSet;
use std::io::Write;

use chrono::{NaiveDate, TimeZone, Utc};
use slot_engine::config::{CalendarConfig, ClinicConfig};
use slot_engine::dst::DstPolicy;
use slot_engine::file_store::FileCalendar;
use slot_engine::{
    BookingRequest, CalendarGateway, ConfigError, FixedClock, ShiftGrid, SlotEngine, SlotStatus,
};

const FULL: &str = r#"
[schedule]
step_minutes = 15
slot_minutes = 15
dst_policy = "skip"

[[schedule.windows]]
name = "morning"
start = "09:00"
end = "10:00"

[labels]
blocked_summary = "CLOSED"
appointment_prefix = "Patient: "

[calendar]
backend = "google"
base_url = "https://www.googleapis.com/calendar/v3"
calendar_id = "clinic@example.com"
access_token_env = "CLINIC_CALENDAR_TOKEN"
"#;

// ── Parsing ─────────────────────────────────────────────────────────────────

#[test]
fn parses_every_section() {
    let config = ClinicConfig::from_toml_str(FULL).unwrap();

    assert_eq!(config.schedule.step_minutes, 15);
    assert_eq!(config.schedule.dst_policy, DstPolicy::Skip);
    assert_eq!(config.labels.blocked_summary, "CLOSED");
    assert_eq!(config.grid().unwrap().slots().len(), 4);
    match config.calendar().unwrap() {
        CalendarConfig::Google(google) => {
            assert_eq!(google.calendar_id, "clinic@example.com");
            assert_eq!(google.timeout_secs, 10);
        }
        other => panic!("expected google backend, got {:?}", other),
    }
}

#[test]
fn schedule_and_labels_default_to_the_clinic_grid() {
    let config = ClinicConfig::from_toml_str(
        r#"
        [calendar]
        backend = "file"
        path = "calendar.json"
        timezone = "Asia/Kolkata"
        "#,
    )
    .unwrap();

    assert_eq!(config.grid().unwrap().slots().len(), 14);
    assert_eq!(config.schedule.slot_minutes, 30);
    assert_eq!(config.labels.blocked_summary, "BLOCKED");
    assert_eq!(config.labels.appointment_prefix, "Appointment: ");
}

#[test]
fn calendar_section_is_required() {
    let result = ClinicConfig::from_toml_str("[schedule]\nstep_minutes = 30\n");
    assert!(matches!(result, Err(ConfigError::MissingField(field)) if field == "calendar"));
}

#[test]
fn google_backend_needs_endpoint_and_calendar() {
    let result = ClinicConfig::from_toml_str(
        r#"
        [calendar]
        backend = "google"
        base_url = ""
        calendar_id = "primary"
        "#,
    );
    assert!(matches!(result, Err(ConfigError::MissingField(_))));

    let result = ClinicConfig::from_toml_str(
        r#"
        [calendar]
        backend = "google"
        calendar_id = "primary"
        "#,
    );
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn invalid_values_are_rejected() {
    let bad_zone = r#"
        [calendar]
        backend = "file"
        path = "calendar.json"
        timezone = "Nowhere/Special"
    "#;
    assert!(matches!(
        ClinicConfig::from_toml_str(bad_zone),
        Err(ConfigError::Invalid(_))
    ));

    let bad_step = format!("[schedule]\nstep_minutes = 0\n{}", bad_zone.replace("Nowhere/Special", "UTC"));
    assert!(matches!(
        ClinicConfig::from_toml_str(&bad_step),
        Err(ConfigError::Invalid(_))
    ));

    let huge_step = bad_step.replace("step_minutes = 0", "step_minutes = 4294967295");
    assert!(matches!(
        ClinicConfig::from_toml_str(&huge_step),
        Err(ConfigError::Invalid(_))
    ));

    let bad_time = r#"
        [[schedule.windows]]
        name = "morning"
        start = "9:00"
        end = "10:00"

        [calendar]
        backend = "file"
        path = "calendar.json"
        timezone = "UTC"
    "#;
    assert!(matches!(
        ClinicConfig::from_toml_str(bad_time),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn missing_token_fails_when_opening_google_backend() {
    let config = ClinicConfig::from_toml_str(&FULL.replace(
        "CLINIC_CALENDAR_TOKEN",
        "SLOT_ENGINE_CONFIG_TEST_TOKEN_UNSET",
    ))
    .unwrap();

    assert!(matches!(
        config.open_gateway(),
        Err(ConfigError::MissingField(_))
    ));
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(FULL.as_bytes()).unwrap();

    let config = ClinicConfig::from_file(&path).unwrap();
    assert_eq!(config.labels.appointment_prefix, "Patient: ");

    assert!(matches!(
        ClinicConfig::from_file(dir.path().join("absent.toml")),
        Err(ConfigError::ReadFile(_))
    ));
}

// ── File backend ────────────────────────────────────────────────────────────

#[test]
fn file_backend_persists_across_gateway_instances() {
    let dir = tempfile::tempdir().unwrap();
    let calendar_path = dir.path().join("calendar.json");
    let config = ClinicConfig::from_toml_str(&format!(
        r#"
        [calendar]
        backend = "file"
        path = "{}"
        timezone = "Asia/Kolkata"
        "#,
        calendar_path.display()
    ))
    .unwrap();
    let now = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();

    let first = config
        .build_engine(config.open_gateway().unwrap())
        .unwrap()
        .with_clock(FixedClock(now));
    first.block(day, "17:00".parse().unwrap()).unwrap();
    first
        .book_slot(&BookingRequest::new("2024-11-20T10:00".parse().unwrap()).summary("Checkup"))
        .unwrap();
    assert!(calendar_path.exists());

    let second = config
        .build_engine(config.open_gateway().unwrap())
        .unwrap()
        .with_clock(FixedClock(now));
    let status = second.get_slot_status(day);
    assert_eq!(
        status.slots.get("17:00".parse().unwrap()).unwrap().status,
        SlotStatus::Blocked
    );
    assert_eq!(status.slots.get("10:00".parse().unwrap()).unwrap().detail, "Checkup");

    second.unblock(day, "17:00".parse().unwrap()).unwrap();
    assert_eq!(first.available_slots(day).len(), 13);
}

#[test]
fn concurrent_file_writers_keep_every_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calendar.json");
    let now = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
    let day = NaiveDate::from_ymd_opt(2030, 1, 10).unwrap();
    let slots = ShiftGrid::default().slots().to_vec();

    std::thread::scope(|scope| {
        for &time in &slots {
            let path = &path;
            scope.spawn(move || {
                let engine = SlotEngine::new(
                    FileCalendar::new(path, chrono_tz::Asia::Kolkata),
                    ShiftGrid::default(),
                )
                .with_clock(FixedClock(now));
                engine.block(day, time).unwrap();
            });
        }
    });

    let calendar = FileCalendar::new(&path, chrono_tz::Asia::Kolkata);
    let start = chrono::DateTime::parse_from_rfc3339("2030-01-10T00:00:00+05:30").unwrap();
    let end = chrono::DateTime::parse_from_rfc3339("2030-01-11T00:00:00+05:30").unwrap();
    let events = calendar.list_events(start, end).unwrap();
    assert_eq!(events.len(), slots.len());
    let ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), slots.len());
}

#[test]
fn missing_file_reads_as_empty_calendar() {
    let dir = tempfile::tempdir().unwrap();
    let calendar = FileCalendar::new(dir.path().join("none.json"), chrono_tz::Europe::Berlin);

    assert_eq!(calendar.timezone().unwrap(), chrono_tz::Europe::Berlin);
    let start = chrono::DateTime::parse_from_rfc3339("2024-11-20T00:00:00+01:00").unwrap();
    let end = chrono::DateTime::parse_from_rfc3339("2024-11-20T23:59:59+01:00").unwrap();
    assert!(calendar.list_events(start, end).unwrap().is_empty());
    assert!(calendar.delete_event("evt-1").is_err());
    assert!(!calendar.path().exists());
}

#[test]
fn corrupt_file_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calendar.json");
    std::fs::write(&path, "not json").unwrap();

    let calendar = FileCalendar::new(&path, chrono_tz::UTC);
    assert!(matches!(
        calendar.timezone(),
        Err(slot_engine::GatewayError::Malformed(_))
    ));
}
