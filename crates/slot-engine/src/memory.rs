//! Process-local calendar backend.
//!
//! [`CalendarBook`] holds the event list and implements the gateway semantics
//! (overlap filter, chronological listing, id assignment). [`InMemoryCalendar`]
//! wraps it behind a mutex and adds fault injection so degraded read paths and
//! surfaced write failures can be exercised without a network.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::gateway::{CalendarEvent, CalendarGateway, EventTime, NewEvent};

/// Serializable calendar state shared by the in-memory and file backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarBook {
    /// IANA timezone name, e.g. "Asia/Kolkata".
    pub timezone: String,
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

impl CalendarBook {
    pub fn new(tz: Tz) -> Self {
        Self {
            timezone: tz.name().to_string(),
            next_id: 0,
            events: Vec::new(),
        }
    }

    pub fn zone(&self) -> Result<Tz, GatewayError> {
        self.timezone
            .parse()
            .map_err(|_| GatewayError::Malformed(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Events intersecting the range, ordered by start. Events sharing a start
    /// keep insertion order.
    pub fn list(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Vec<CalendarEvent> {
        let range_start = start.with_timezone(&Utc);
        let range_end = end.with_timezone(&Utc);
        let mut events: Vec<CalendarEvent> = self
            .events
            .iter()
            .filter(|e| e.overlaps(range_start, range_end))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start.sort_key());
        events
    }

    /// Store a new event under the next free id. `link_scheme` prefixes the
    /// generated link (e.g. "memory" gives `memory://events/evt-1`).
    pub fn insert(&mut self, event: &NewEvent, link_scheme: &str) -> CalendarEvent {
        self.next_id += 1;
        let id = format!("evt-{}", self.next_id);
        let stored = CalendarEvent {
            link: Some(format!("{}://events/{}", link_scheme, id)),
            id,
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: EventTime::DateTime(event.start),
            end: EventTime::DateTime(event.end),
            kind: event.kind,
        };
        self.events.push(stored.clone());
        stored
    }

    pub fn delete(&mut self, event_id: &str) -> Result<(), GatewayError> {
        let before = self.events.len();
        self.events.retain(|e| e.id != event_id);
        if self.events.len() == before {
            return Err(GatewayError::NotFound(format!("event '{}'", event_id)));
        }
        Ok(())
    }
}

/// Which gateway calls should fail. Each enabled fault returns
/// `GatewayError::Transport`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    pub timezone: bool,
    pub list: bool,
    pub insert: bool,
    pub delete: bool,
    /// Deletes that still succeed before `delete_event` starts failing.
    pub deletes_left: Option<usize>,
}

/// A calendar held entirely in memory.
#[derive(Debug)]
pub struct InMemoryCalendar {
    book: Mutex<CalendarBook>,
    faults: Mutex<Faults>,
}

impl InMemoryCalendar {
    pub fn new(tz: Tz) -> Self {
        Self {
            book: Mutex::new(CalendarBook::new(tz)),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Insert an event directly, bypassing fault injection.
    pub fn seed(&self, event: NewEvent) -> CalendarEvent {
        self.book.lock().insert(&event, "memory")
    }

    /// Add an externally shaped event (all-day, foreign id, no tag) as-is.
    pub fn seed_raw(&self, event: CalendarEvent) {
        self.book.lock().events.push(event);
    }

    /// Snapshot of every stored event in insertion order.
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.book.lock().events.clone()
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock() = faults;
    }

    fn fail_if(&self, enabled: bool, call: &str) -> Result<(), GatewayError> {
        if enabled {
            return Err(GatewayError::Transport(format!("{} unavailable", call)));
        }
        Ok(())
    }
}

impl CalendarGateway for InMemoryCalendar {
    fn timezone(&self) -> Result<Tz, GatewayError> {
        self.fail_if(self.faults.lock().timezone, "timezone")?;
        self.book.lock().zone()
    }

    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError> {
        self.fail_if(self.faults.lock().list, "list_events")?;
        Ok(self.book.lock().list(start, end))
    }

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError> {
        self.fail_if(self.faults.lock().insert, "insert_event")?;
        Ok(self.book.lock().insert(event, "memory"))
    }

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        let exhausted = {
            let mut faults = self.faults.lock();
            match faults.deletes_left {
                Some(0) => true,
                Some(ref mut left) => {
                    *left -= 1;
                    false
                }
                None => false,
            }
        };
        self.fail_if(self.faults.lock().delete || exhausted, "delete_event")?;
        self.book.lock().delete(event_id)
    }
}
