//! Slot status resolution: grid × events × now → per-slot status.
//!
//! For each grid slot, in grid order:
//!
//! 1. default `available` with empty detail;
//! 2. on the calendar's current day, a slot whose start is strictly before now
//!    is provisionally `blocked` with detail `"Past time"`;
//! 3. the first event (fetch order) whose start, projected into the calendar
//!    timezone and truncated to `HH:MM`, lands on the slot decides the final
//!    status, overriding the past-time default.
//!
//! Resolution is pure; fetching the events is the engine's job.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::dst::{self, DstPolicy};
use crate::gateway::{CalendarEvent, SlotKind};
use crate::grid::SlotTime;

/// Detail reported for unmatched slots that have already started today.
pub const PAST_TIME_DETAIL: &str = "Past time";

/// Summary used to mark staff-blocked slots on untagged backends.
pub const BLOCKED_SENTINEL: &str = "BLOCKED";

/// Prefix stripped from booked summaries before reporting the patient.
pub const APPOINTMENT_PREFIX: &str = "Appointment: ";

/// Summary conventions used to read untagged events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub blocked_summary: String,
    pub appointment_prefix: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            blocked_summary: BLOCKED_SENTINEL.to_string(),
            appointment_prefix: APPOINTMENT_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Status of one slot plus its human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub status: SlotStatus,
    pub detail: String,
}

impl SlotState {
    pub fn available() -> Self {
        Self {
            status: SlotStatus::Available,
            detail: String::new(),
        }
    }

    fn past() -> Self {
        Self {
            status: SlotStatus::Blocked,
            detail: PAST_TIME_DETAIL.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }
}

/// What a controlling event says about its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotClaim {
    Booked { patient: String },
    Blocked,
}

impl SlotClaim {
    /// Classify an event. A structured tag wins; untagged events fall back to
    /// the sentinel summary convention.
    pub fn of(event: &CalendarEvent, labels: &Labels) -> Self {
        let blocked = match event.kind {
            Some(kind) => kind == SlotKind::Blocked,
            None => event.summary == labels.blocked_summary,
        };
        if blocked {
            return SlotClaim::Blocked;
        }
        let patient = event
            .summary
            .strip_prefix(labels.appointment_prefix.as_str())
            .unwrap_or(&event.summary);
        SlotClaim::Booked {
            patient: patient.to_string(),
        }
    }

    fn into_state(self) -> SlotState {
        match self {
            SlotClaim::Blocked => SlotState {
                status: SlotStatus::Blocked,
                detail: String::new(),
            },
            SlotClaim::Booked { patient } => SlotState {
                status: SlotStatus::Booked,
                detail: patient,
            },
        }
    }
}

/// Resolved status for every grid slot of one day, in grid order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotBoard {
    entries: Vec<(SlotTime, SlotState)>,
}

impl SlotBoard {
    pub fn get(&self, time: SlotTime) -> Option<&SlotState> {
        self.entries.iter().find(|(t, _)| *t == time).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SlotTime, SlotState)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The patient-facing view: available slot times in grid order.
    pub fn available(&self) -> Vec<SlotTime> {
        self.entries
            .iter()
            .filter(|(_, state)| state.is_available())
            .map(|(time, _)| *time)
            .collect()
    }
}

impl Serialize for SlotBoard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (time, state) in &self.entries {
            map.serialize_entry(time, state)?;
        }
        map.end()
    }
}

/// One day's events seen from the calendar's timezone at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct DayView<'a> {
    pub date: NaiveDate,
    pub tz: Tz,
    pub now: DateTime<Utc>,
    pub events: &'a [CalendarEvent],
    pub labels: &'a Labels,
    pub policy: DstPolicy,
}

impl<'a> DayView<'a> {
    /// Whether `date` is the current day in the calendar timezone.
    pub fn is_today(&self) -> bool {
        self.now.with_timezone(&self.tz).date_naive() == self.date
    }

    /// The instant a slot starts on this day, if that local time exists.
    pub fn slot_start(&self, time: SlotTime) -> Option<DateTime<Tz>> {
        dst::localize(self.tz, self.date.and_time(time.as_naive()), self.policy)
    }

    /// A slot that does not exist locally (DST gap) is compared by wall clock.
    fn is_past(&self, time: SlotTime) -> bool {
        if !self.is_today() {
            return false;
        }
        match self.slot_start(time) {
            Some(start) => start.with_timezone(&Utc) < self.now,
            None => {
                self.date.and_time(time.as_naive()) < self.now.with_timezone(&self.tz).naive_local()
            }
        }
    }

    /// Whether `event` controls `time` on this day.
    pub fn controls(&self, event: &CalendarEvent, time: SlotTime) -> bool {
        event.local_start(self.tz).is_some_and(|start| {
            start.date_naive() == self.date && SlotTime::truncate(start.time()) == time
        })
    }

    /// Every event controlling `time`, in fetch order.
    pub fn controlling(&self, time: SlotTime) -> impl Iterator<Item = &'a CalendarEvent> + 'a {
        let view = *self;
        self.events.iter().filter(move |e| view.controls(e, time))
    }

    pub fn resolve(&self, time: SlotTime) -> SlotState {
        if let Some(event) = self.controlling(time).next() {
            return SlotClaim::of(event, self.labels).into_state();
        }
        if self.is_past(time) {
            return SlotState::past();
        }
        SlotState::available()
    }

    /// Resolve every slot. Never omits a slot.
    pub fn resolve_all(&self, slots: &[SlotTime]) -> SlotBoard {
        let entries = slots
            .iter()
            .map(|&time| {
                let masked = self.controlling(time).count().saturating_sub(1);
                if masked > 0 {
                    tracing::warn!(
                        date = %self.date,
                        slot = %time,
                        masked,
                        "slot has more than one controlling event; first one wins"
                    );
                }
                (time, self.resolve(time))
            })
            .collect();
        SlotBoard { entries }
    }
}

/// Resolve a full day. Convenience wrapper around [`DayView::resolve_all`].
pub fn resolve_day(
    slots: &[SlotTime],
    events: &[CalendarEvent],
    date: NaiveDate,
    tz: Tz,
    now: DateTime<Utc>,
    labels: &Labels,
    policy: DstPolicy,
) -> SlotBoard {
    DayView {
        date,
        tz,
        now,
        events,
        labels,
        policy,
    }
    .resolve_all(slots)
}

/// Resolve a single slot. Convenience wrapper around [`DayView::resolve`].
pub fn resolve_slot(
    time: SlotTime,
    events: &[CalendarEvent],
    date: NaiveDate,
    tz: Tz,
    now: DateTime<Utc>,
    labels: &Labels,
    policy: DstPolicy,
) -> SlotState {
    DayView {
        date,
        tz,
        now,
        events,
        labels,
        policy,
    }
    .resolve(time)
}
