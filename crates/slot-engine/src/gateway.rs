//! The Calendar Gateway seam: the only way the engine touches the backend.
//!
//! A gateway stores zoned events and reports the calendar's configured
//! timezone. Implementations in this crate:
//!
//! - [`InMemoryCalendar`](crate::memory::InMemoryCalendar): process-local
//! - [`FileCalendar`](crate::file_store::FileCalendar): JSON file on disk
//! - [`GoogleCalendar`](crate::google::GoogleCalendar): Google Calendar v3 REST

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Start or end of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    /// A zoned timestamp.
    DateTime(DateTime<FixedOffset>),
    /// An all-day boundary. All-day events never control a slot.
    Date(NaiveDate),
}

impl EventTime {
    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            EventTime::DateTime(dt) => Some(*dt),
            EventTime::Date(_) => None,
        }
    }

    /// Chronological ordering key; all-day boundaries sort at UTC midnight.
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => dt.with_timezone(&Utc),
            EventTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

/// Structured marker stored with events the engine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Booked,
    Blocked,
}

impl SlotKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            SlotKind::Booked => "booked",
            SlotKind::Blocked => "blocked",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "booked" => Some(SlotKind::Booked),
            "blocked" => Some(SlotKind::Blocked),
            _ => None,
        }
    }
}

/// An event as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Opaque backend identifier.
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    /// Tag written by this engine; `None` for events created elsewhere.
    #[serde(default)]
    pub kind: Option<SlotKind>,
    /// Human-facing link to the event, when the backend has one.
    #[serde(default)]
    pub link: Option<String>,
}

impl CalendarEvent {
    /// The event start projected into `tz`, or `None` for all-day events.
    pub fn local_start(&self, tz: Tz) -> Option<DateTime<Tz>> {
        self.start.instant().map(|dt| dt.with_timezone(&tz))
    }

    /// Whether the event intersects `[range_start, range_end)`.
    pub fn overlaps(&self, range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> bool {
        self.start.sort_key() < range_end && self.end.sort_key() > range_start
    }
}

/// An event the engine asks the gateway to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub kind: Option<SlotKind>,
}

/// Capability set the engine consumes from the calendar backend.
///
/// All calls are blocking. Callers are responsible for request timeouts
/// beyond whatever the implementation's transport applies.
pub trait CalendarGateway {
    /// The calendar's configured IANA timezone.
    fn timezone(&self) -> Result<Tz, GatewayError>;

    /// Events intersecting `[start, end]`, chronologically ordered, with any
    /// recurrence already expanded into single occurrences.
    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError>;

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError>;

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError>;
}

impl<G: CalendarGateway + ?Sized> CalendarGateway for &G {
    fn timezone(&self) -> Result<Tz, GatewayError> {
        (**self).timezone()
    }

    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError> {
        (**self).list_events(start, end)
    }

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError> {
        (**self).insert_event(event)
    }

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        (**self).delete_event(event_id)
    }
}

impl<G: CalendarGateway + ?Sized> CalendarGateway for Box<G> {
    fn timezone(&self) -> Result<Tz, GatewayError> {
        (**self).timezone()
    }

    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError> {
        (**self).list_events(start, end)
    }

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError> {
        (**self).insert_event(event)
    }

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        (**self).delete_event(event_id)
    }
}

impl<G: CalendarGateway + ?Sized> CalendarGateway for Arc<G> {
    fn timezone(&self) -> Result<Tz, GatewayError> {
        (**self).timezone()
    }

    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError> {
        (**self).list_events(start, end)
    }

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError> {
        (**self).insert_event(event)
    }

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        (**self).delete_event(event_id)
    }
}
