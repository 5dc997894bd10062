//! Tests for slot status resolution (pure: no gateway involved).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use slot_engine::gateway::{CalendarEvent, EventTime, SlotKind};
use slot_engine::dst::DstPolicy;
use slot_engine::grid::{ShiftGrid, ShiftWindow, SlotTime};
use slot_engine::resolver::{resolve_day, resolve_slot, Labels, SlotClaim, SlotStatus};

const KOLKATA: Tz = chrono_tz::Asia::Kolkata;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn t(s: &str) -> SlotTime {
    s.parse().unwrap()
}

fn local(tz: Tz, day: &str, time: &str) -> DateTime<Utc> {
    let naive = NaiveDateTime::parse_from_str(&format!("{}T{}", day, time), "%Y-%m-%dT%H:%M:%S")
        .unwrap();
    tz.from_local_datetime(&naive).unwrap().with_timezone(&Utc)
}

fn event(id: &str, tz: Tz, day: &str, time: &str, summary: &str) -> CalendarEvent {
    let start = tz
        .from_local_datetime(
            &NaiveDateTime::parse_from_str(&format!("{}T{}", day, time), "%Y-%m-%dT%H:%M:%S")
                .unwrap(),
        )
        .unwrap()
        .fixed_offset();
    CalendarEvent {
        id: id.to_string(),
        summary: summary.to_string(),
        description: None,
        start: EventTime::DateTime(start),
        end: EventTime::DateTime(start + Duration::minutes(30)),
        kind: None,
        link: None,
    }
}

fn tagged(mut e: CalendarEvent, kind: SlotKind) -> CalendarEvent {
    e.kind = Some(kind);
    e
}

// ── Past-time rules ─────────────────────────────────────────────────────────

#[test]
fn future_date_has_no_past_time_slots() {
    let grid = ShiftGrid::default();
    let now = local(KOLKATA, "2024-11-20", "23:00:00");

    let board = resolve_day(
        grid.slots(),
        &[],
        date("2024-11-21"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    assert_eq!(board.len(), 14);
    assert!(board.iter().all(|(_, s)| s.status == SlotStatus::Available));
    assert!(board.iter().all(|(_, s)| s.detail.is_empty()));
}

#[test]
fn today_at_1115_blocks_the_first_three_slots_as_past() {
    let grid = ShiftGrid::default();
    let now = local(KOLKATA, "2024-11-20", "11:15:00");

    let board = resolve_day(
        grid.slots(),
        &[],
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    for past in ["10:00", "10:30", "11:00"] {
        let state = board.get(t(past)).unwrap();
        assert_eq!(state.status, SlotStatus::Blocked, "{} should be past", past);
        assert_eq!(state.detail, "Past time");
    }
    for open in ["11:30", "12:00", "12:30", "17:00", "20:30"] {
        let state = board.get(t(open)).unwrap();
        assert_eq!(state.status, SlotStatus::Available, "{} should be open", open);
        assert!(state.detail.is_empty());
    }
    assert_eq!(board.available().len(), 11);
}

#[test]
fn slot_starting_exactly_now_is_not_past() {
    let grid = ShiftGrid::default();
    let now = local(KOLKATA, "2024-11-20", "11:30:00");

    let board = resolve_day(
        grid.slots(),
        &[],
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    assert_eq!(board.get(t("11:00")).unwrap().detail, "Past time");
    assert_eq!(board.get(t("11:30")).unwrap().status, SlotStatus::Available);
}

#[test]
fn skipped_gap_slot_is_past_once_its_wall_clock_time_has_gone() {
    // 2024-03-10 02:00-03:00 does not exist in New York.
    let new_york = chrono_tz::America::New_York;
    let grid = ShiftGrid::new(
        vec![ShiftWindow::new("night", t("01:00"), t("04:00"))],
        30,
    )
    .unwrap();
    let day = date("2024-03-10");

    let early = local(new_york, "2024-03-10", "01:45:00");
    let board = resolve_day(
        grid.slots(),
        &[],
        day,
        new_york,
        early,
        &Labels::default(),
        DstPolicy::Skip,
    );
    assert_eq!(board.get(t("01:30")).unwrap().detail, "Past time");
    assert_eq!(board.get(t("02:30")).unwrap().status, SlotStatus::Available);

    let late = local(new_york, "2024-03-10", "04:00:00");
    let board = resolve_day(
        grid.slots(),
        &[],
        day,
        new_york,
        late,
        &Labels::default(),
        DstPolicy::Skip,
    );
    for gap in ["02:00", "02:30"] {
        let state = board.get(t(gap)).unwrap();
        assert_eq!(state.status, SlotStatus::Blocked, "{} should be past", gap);
        assert_eq!(state.detail, "Past time");
    }
    assert!(board.available().is_empty());

    let single = resolve_slot(
        t("02:30"),
        &[],
        day,
        new_york,
        late,
        &Labels::default(),
        DstPolicy::Skip,
    );
    assert_eq!(single.detail, "Past time");
}

#[test]
fn today_is_evaluated_in_the_calendar_timezone() {
    // 2024-11-19 20:00 UTC is already 2024-11-20 01:30 in Kolkata.
    let grid = ShiftGrid::default();
    let now = Utc.with_ymd_and_hms(2024, 11, 19, 20, 0, 0).unwrap();

    // In UTC, 2024-11-19 is today and everything before 20:00 has passed.
    let utc_day = resolve_day(
        grid.slots(),
        &[],
        date("2024-11-19"),
        Tz::UTC,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );
    assert_eq!(utc_day.available().len(), 2, "only 20:00 and 20:30 remain");

    // In Kolkata the same date is yesterday: past-time only applies to today.
    let kolkata_yesterday = resolve_day(
        grid.slots(),
        &[],
        date("2024-11-19"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );
    assert_eq!(kolkata_yesterday.available().len(), 14);

    // And 2024-11-20 is today at 01:30, before every slot.
    let kolkata_today = resolve_day(
        grid.slots(),
        &[],
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );
    assert_eq!(kolkata_today.available().len(), 14);
}

// ── Event matching ──────────────────────────────────────────────────────────

#[test]
fn summaries_resolve_to_status_and_detail() {
    let grid = ShiftGrid::default();
    let day = "2024-11-20";
    let events = vec![
        event("a", KOLKATA, day, "10:00:00", "Appointment: Jane Doe"),
        event("b", KOLKATA, day, "10:30:00", "BLOCKED"),
        event("c", KOLKATA, day, "11:00:00", "Checkup"),
    ];
    let now = local(KOLKATA, "2024-11-01", "09:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date(day),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    let jane = board.get(t("10:00")).unwrap();
    assert_eq!(jane.status, SlotStatus::Booked);
    assert_eq!(jane.detail, "Jane Doe");

    let blocked = board.get(t("10:30")).unwrap();
    assert_eq!(blocked.status, SlotStatus::Blocked);
    assert_eq!(blocked.detail, "");

    let raw = board.get(t("11:00")).unwrap();
    assert_eq!(raw.status, SlotStatus::Booked);
    assert_eq!(raw.detail, "Checkup");
}

#[test]
fn event_match_overrides_past_time() {
    let grid = ShiftGrid::default();
    let day = "2024-11-20";
    let events = vec![
        event("a", KOLKATA, day, "10:00:00", "Appointment: Ravi"),
        event("b", KOLKATA, day, "10:30:00", "BLOCKED"),
    ];
    let now = local(KOLKATA, day, "18:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date(day),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    let booked = board.get(t("10:00")).unwrap();
    assert_eq!(booked.status, SlotStatus::Booked);
    assert_eq!(booked.detail, "Ravi");

    let blocked = board.get(t("10:30")).unwrap();
    assert_eq!(blocked.status, SlotStatus::Blocked);
    assert_eq!(blocked.detail, "", "a blocking event never reports 'Past time'");

    assert_eq!(board.get(t("11:00")).unwrap().detail, "Past time");
}

#[test]
fn first_matching_event_wins() {
    let grid = ShiftGrid::default();
    let day = "2024-11-20";
    let events = vec![
        event("first", KOLKATA, day, "17:00:00", "Appointment: First"),
        event("second", KOLKATA, day, "17:00:00", "BLOCKED"),
    ];
    let now = local(KOLKATA, "2024-11-01", "09:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date(day),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    let state = board.get(t("17:00")).unwrap();
    assert_eq!(state.status, SlotStatus::Booked);
    assert_eq!(state.detail, "First");

    let single = resolve_slot(
        t("17:00"),
        &events,
        date(day),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );
    assert_eq!(&single, state);
}

#[test]
fn event_start_is_projected_into_calendar_timezone() {
    // 04:30Z is 10:00 in Kolkata (+05:30).
    let grid = ShiftGrid::default();
    let start = Utc.with_ymd_and_hms(2024, 11, 20, 4, 30, 0).unwrap().fixed_offset();
    let events = vec![CalendarEvent {
        id: "utc".to_string(),
        summary: "Appointment: Asha".to_string(),
        description: None,
        start: EventTime::DateTime(start),
        end: EventTime::DateTime(start + Duration::minutes(30)),
        kind: None,
        link: None,
    }];
    let now = local(KOLKATA, "2024-11-01", "09:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    assert_eq!(board.get(t("10:00")).unwrap().detail, "Asha");
    assert_eq!(board.available().len(), 13);
}

#[test]
fn seconds_are_truncated_when_matching() {
    let grid = ShiftGrid::default();
    let events = vec![event("a", KOLKATA, "2024-11-20", "12:00:45", "Walk-in")];
    let now = local(KOLKATA, "2024-11-01", "09:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    assert_eq!(board.get(t("12:00")).unwrap().status, SlotStatus::Booked);
}

#[test]
fn off_grid_all_day_and_other_day_events_control_nothing() {
    let grid = ShiftGrid::default();
    let mut all_day = event("allday", KOLKATA, "2024-11-20", "00:00:00", "Holiday");
    all_day.start = EventTime::Date(date("2024-11-20"));
    all_day.end = EventTime::Date(date("2024-11-21"));
    let events = vec![
        event("offgrid", KOLKATA, "2024-11-20", "10:15:00", "Phone call"),
        all_day,
        event("yesterday", KOLKATA, "2024-11-19", "10:00:00", "Appointment: Late"),
    ];
    let now = local(KOLKATA, "2024-11-01", "09:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );

    assert_eq!(board.available().len(), 14);
}

// ── Structured tags ─────────────────────────────────────────────────────────

#[test]
fn structured_tag_takes_precedence_over_sentinel() {
    let labels = Labels::default();

    let booked = tagged(
        event("a", KOLKATA, "2024-11-20", "10:00:00", "BLOCKED"),
        SlotKind::Booked,
    );
    assert_eq!(
        SlotClaim::of(&booked, &labels),
        SlotClaim::Booked {
            patient: "BLOCKED".to_string()
        }
    );

    let blocked = tagged(
        event("b", KOLKATA, "2024-11-20", "10:30:00", "Doctor in surgery"),
        SlotKind::Blocked,
    );
    assert_eq!(SlotClaim::of(&blocked, &labels), SlotClaim::Blocked);
}

#[test]
fn custom_labels_change_the_sentinel_convention() {
    let labels = Labels {
        blocked_summary: "UNAVAILABLE".to_string(),
        appointment_prefix: "Patient - ".to_string(),
    };
    let e1 = event("a", KOLKATA, "2024-11-20", "10:00:00", "UNAVAILABLE");
    let e2 = event("b", KOLKATA, "2024-11-20", "10:30:00", "Patient - Meera");
    let e3 = event("c", KOLKATA, "2024-11-20", "11:00:00", "BLOCKED");

    assert_eq!(SlotClaim::of(&e1, &labels), SlotClaim::Blocked);
    assert_eq!(
        SlotClaim::of(&e2, &labels),
        SlotClaim::Booked {
            patient: "Meera".to_string()
        }
    );
    assert_eq!(
        SlotClaim::of(&e3, &labels),
        SlotClaim::Booked {
            patient: "BLOCKED".to_string()
        }
    );
}

// ── Serialization ───────────────────────────────────────────────────────────

#[test]
fn board_serializes_as_map_in_grid_order() {
    let grid = ShiftGrid::default();
    let events = vec![event("a", KOLKATA, "2024-11-20", "20:30:00", "Appointment: Last")];
    let now = local(KOLKATA, "2024-11-01", "09:00:00");

    let board = resolve_day(
        grid.slots(),
        &events,
        date("2024-11-20"),
        KOLKATA,
        now,
        &Labels::default(),
        DstPolicy::WallClock,
    );
    let json = serde_json::to_value(&board).unwrap();
    let map = json.as_object().unwrap();

    let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys.first(), Some(&"10:00"));
    assert_eq!(keys.last(), Some(&"20:30"));
    assert_eq!(map["20:30"]["status"], "booked");
    assert_eq!(map["20:30"]["detail"], "Last");
    assert_eq!(map["10:00"]["status"], "available");
}
