//! The slot engine: one calendar, one grid, one day at a time.
//!
//! Reads degrade rather than fail. A timezone lookup failure falls back to
//! UTC and an event fetch failure resolves the day as if it had no events; both
//! are recorded in [`DayStatus`] so callers can tell a real UTC calendar from a
//! fallback. Writes never degrade (see [`crate::mutator`]).

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::dst::{self, DstPolicy};
use crate::error::{GatewayError, Result, SlotError};
use crate::gateway::{CalendarEvent, CalendarGateway};
use crate::grid::{ShiftGrid, SlotTime};
use crate::locks::SlotLocks;
use crate::resolver::{DayView, Labels, SlotBoard};

/// Default length of a blocking event, in minutes.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Where the timezone used for a read came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ZoneSource {
    Calendar,
    /// The lookup failed and UTC was used instead.
    Fallback { reason: String },
}

/// Whether the day's events were actually known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EventSource {
    Live { count: usize },
    /// The fetch failed; slots follow the availability rules only.
    Unavailable { reason: String },
}

/// Staff-facing view of one day.
#[derive(Debug, Clone, Serialize)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub timezone: String,
    pub zone: ZoneSource,
    pub events: EventSource,
    pub slots: SlotBoard,
}

impl DayStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self.zone, ZoneSource::Fallback { .. })
            || matches!(self.events, EventSource::Unavailable { .. })
    }
}

pub struct SlotEngine<G> {
    pub(crate) gateway: G,
    pub(crate) grid: ShiftGrid,
    pub(crate) labels: Labels,
    pub(crate) slot_minutes: u32,
    pub(crate) policy: DstPolicy,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) locks: SlotLocks,
}

impl<G: CalendarGateway> SlotEngine<G> {
    pub fn new(gateway: G, grid: ShiftGrid) -> Self {
        Self {
            gateway,
            grid,
            labels: Labels::default(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            policy: DstPolicy::default(),
            clock: Arc::new(SystemClock),
            locks: SlotLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_slot_minutes(mut self, minutes: u32) -> Self {
        self.slot_minutes = minutes;
        self
    }

    pub fn with_dst_policy(mut self, policy: DstPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn grid(&self) -> &ShiftGrid {
        &self.grid
    }

    /// Slots with a live lock entry; zero whenever no mutation is running.
    pub fn held_slot_locks(&self) -> usize {
        self.locks.active()
    }

    /// The calendar timezone for a read, falling back to UTC.
    pub(crate) fn calendar_zone(&self) -> (Tz, ZoneSource) {
        match self.gateway.timezone() {
            Ok(tz) => (tz, ZoneSource::Calendar),
            Err(err) => {
                tracing::warn!(error = %err, "timezone lookup failed; falling back to UTC");
                (
                    Tz::UTC,
                    ZoneSource::Fallback {
                        reason: err.to_string(),
                    },
                )
            }
        }
    }

    /// The calendar timezone for a write. No fallback.
    pub(crate) fn require_zone(&self) -> Result<Tz> {
        Ok(self.gateway.timezone()?)
    }

    /// Events overlapping the local day 00:00:00–23:59:59.
    pub(crate) fn fetch_day(
        &self,
        date: NaiveDate,
        tz: Tz,
    ) -> std::result::Result<Vec<CalendarEvent>, GatewayError> {
        let (start, end) = day_bounds(date, tz);
        tracing::debug!(%date, %tz, %start, %end, "fetching events for day");
        self.gateway.list_events(start, end)
    }

    pub(crate) fn view<'a>(
        &'a self,
        date: NaiveDate,
        tz: Tz,
        events: &'a [CalendarEvent],
    ) -> DayView<'a> {
        DayView {
            date,
            tz,
            now: self.clock.now(),
            events,
            labels: &self.labels,
            policy: self.policy,
        }
    }

    pub(crate) fn ensure_on_grid(&self, time: SlotTime) -> Result<()> {
        if self.grid.contains(time) {
            return Ok(());
        }
        Err(SlotError::InvalidInput(format!(
            "{} is not a slot on the shift grid",
            time
        )))
    }

    /// Status of every grid slot on `date`. Never fails.
    pub fn get_slot_status(&self, date: NaiveDate) -> DayStatus {
        let (tz, zone) = self.calendar_zone();
        let (events, source) = match self.fetch_day(date, tz) {
            Ok(events) => {
                let count = events.len();
                (events, EventSource::Live { count })
            }
            Err(err) => {
                tracing::warn!(%date, error = %err, "event fetch failed; resolving without events");
                (
                    Vec::new(),
                    EventSource::Unavailable {
                        reason: err.to_string(),
                    },
                )
            }
        };

        let slots = self.view(date, tz, &events).resolve_all(self.grid.slots());
        DayStatus {
            date,
            timezone: tz.name().to_string(),
            zone,
            events: source,
            slots,
        }
    }

    /// Patient-facing view: available slot times on `date` in grid order.
    pub fn available_slots(&self, date: NaiveDate) -> Vec<SlotTime> {
        self.get_slot_status(date).slots.available()
    }
}

/// Local start-of-day and 23:59:59 of `date` in `tz`.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let local = |time: NaiveTime, policy| {
        let naive = date.and_time(time);
        dst::localize(tz, naive, policy)
            .unwrap_or_else(|| tz.from_utc_datetime(&naive))
            .fixed_offset()
    };
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    (
        local(NaiveTime::MIN, DstPolicy::ShiftForward),
        local(last_second, DstPolicy::WallClock),
    )
}
