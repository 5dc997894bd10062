//! Calendar mutations: block, unblock and book.
//!
//! Every mutation returns its failure to the caller; none of them degrade the
//! way reads do. Block and unblock re-read the day under the slot's lock
//! before writing, so one engine never inserts two controlling events for the
//! same slot.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::dst;
use crate::engine::SlotEngine;
use crate::error::{GatewayError, Result, SlotError};
use crate::gateway::{CalendarEvent, CalendarGateway, NewEvent, SlotKind};
use crate::grid::SlotTime;
use crate::locks::SlotKey;
use crate::resolver::{SlotClaim, PAST_TIME_DETAIL};
use crate::wire::{BookingStart, SlotAction};

pub const DEFAULT_BOOKING_SUMMARY: &str = "Medical Appointment";
pub const DEFAULT_BOOKING_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub start: BookingStart,
    pub duration_minutes: u32,
    pub summary: String,
    pub description: String,
}

impl BookingRequest {
    /// A 30-minute "Medical Appointment" at `start`.
    pub fn new(start: BookingStart) -> Self {
        Self {
            start,
            duration_minutes: DEFAULT_BOOKING_MINUTES,
            summary: DEFAULT_BOOKING_SUMMARY.to_string(),
            description: String::new(),
        }
    }

    pub fn duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = summary.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// A created appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub event_id: String,
    pub link: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl fmt::Display for Booking {
    /// The backend link, or the event id when there is none.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.link.as_deref().unwrap_or(&self.event_id))
    }
}

impl<G: CalendarGateway> SlotEngine<G> {
    /// Mark an available slot as staff-blocked.
    ///
    /// # Errors
    /// - `InvalidInput` if `time` is not on the grid.
    /// - `SlotConflict` if the slot is booked, blocked, or already past.
    /// - `GatewayUnavailable` if the timezone, the day's events, or the insert
    ///   cannot be obtained.
    pub fn block(&self, date: NaiveDate, time: SlotTime) -> Result<String> {
        self.ensure_on_grid(time)?;
        self.locks.with_slot(SlotKey::new(date, time), || -> Result<String> {
            let tz = self.require_zone()?;
            let events = self.fetch_day(date, tz)?;
            let view = self.view(date, tz, &events);

            let state = view.resolve(time);
            if !state.is_available() {
                let reason = if state.detail == PAST_TIME_DETAIL {
                    format!("slot {} on {} is in the past", time, date)
                } else {
                    format!("slot {} on {} is already {}", time, date, state.status)
                };
                tracing::warn!(%date, slot = %time, %reason, "block rejected");
                return Err(SlotError::SlotConflict(reason));
            }

            let start = view.slot_start(time).ok_or_else(|| {
                SlotError::InvalidInput(format!("{} {} does not exist in {}", date, time, tz))
            })?;
            let end = start + Duration::minutes(i64::from(self.slot_minutes));
            let created = self.gateway.insert_event(&NewEvent {
                summary: self.labels.blocked_summary.clone(),
                description: None,
                start: start.fixed_offset(),
                end: end.fixed_offset(),
                kind: Some(SlotKind::Blocked),
            })?;

            tracing::info!(%date, slot = %time, event_id = %created.id, "slot blocked");
            Ok("Slot blocked".to_string())
        })
    }

    /// Remove the blocking event(s) on a slot. Appointments are never touched.
    ///
    /// # Errors
    /// - `InvalidInput` if `time` is not on the grid.
    /// - `SlotConflict` if no blocking event controls the slot.
    /// - `GatewayUnavailable` on backend failure.
    pub fn unblock(&self, date: NaiveDate, time: SlotTime) -> Result<String> {
        self.ensure_on_grid(time)?;
        self.locks.with_slot(SlotKey::new(date, time), || -> Result<String> {
            let tz = self.require_zone()?;
            let events = self.fetch_day(date, tz)?;
            let view = self.view(date, tz, &events);

            let blocking: Vec<&CalendarEvent> = view
                .controlling(time)
                .filter(|e| SlotClaim::of(e, &self.labels) == SlotClaim::Blocked)
                .collect();
            if blocking.is_empty() {
                tracing::warn!(%date, slot = %time, "unblock rejected; slot was not blocked");
                return Err(SlotError::SlotConflict("Slot was not blocked".to_string()));
            }

            let total = blocking.len();
            for (removed, event) in blocking.into_iter().enumerate() {
                match self.gateway.delete_event(&event.id) {
                    Ok(()) => {
                        tracing::info!(%date, slot = %time, event_id = %event.id, "slot unblocked");
                    }
                    Err(GatewayError::NotFound(_)) => {
                        tracing::debug!(%date, slot = %time, event_id = %event.id, "block already gone");
                    }
                    Err(err) if removed == 0 => return Err(err.into()),
                    Err(err) => {
                        tracing::warn!(
                            %date,
                            slot = %time,
                            removed,
                            total,
                            error = %err,
                            "unblock stopped part way"
                        );
                        return Err(GatewayError::Transport(format!(
                            "removed {} of {} blocking events before failing: {}",
                            removed, total, err
                        ))
                        .into());
                    }
                }
            }
            Ok("Slot unblocked".to_string())
        })
    }

    pub fn toggle_slot(&self, date: NaiveDate, time: SlotTime, action: SlotAction) -> Result<String> {
        match action {
            SlotAction::Block => self.block(date, time),
            SlotAction::Unblock => self.unblock(date, time),
        }
    }

    /// Create an appointment.
    ///
    /// A naive start is read as calendar-local time, resolved through the
    /// engine's DST policy. The insert is unconditional: no conflict check is
    /// made beyond what the backend enforces.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero duration, an empty summary, or a local time
    ///   the DST policy rejects.
    /// - `GatewayUnavailable` on backend failure.
    pub fn book_slot(&self, request: &BookingRequest) -> Result<Booking> {
        if request.duration_minutes == 0 {
            return Err(SlotError::InvalidInput(
                "duration must be at least one minute".to_string(),
            ));
        }
        if request.summary.trim().is_empty() {
            return Err(SlotError::InvalidInput("summary is required".to_string()));
        }

        let tz = self.require_zone()?;
        let start = match request.start {
            BookingStart::Zoned(dt) => dt,
            BookingStart::Naive(naive) => dst::localize(tz, naive, self.policy)
                .ok_or_else(|| {
                    SlotError::InvalidInput(format!("{} does not exist in {}", naive, tz))
                })?
                .fixed_offset(),
        };
        let end = start + Duration::minutes(i64::from(request.duration_minutes));

        let insert = || -> Result<Booking> {
            let description = Some(request.description.clone()).filter(|d| !d.is_empty());
            let created = self.gateway.insert_event(&NewEvent {
                summary: request.summary.clone(),
                description,
                start,
                end,
                kind: Some(SlotKind::Booked),
            })?;
            tracing::info!(event_id = %created.id, %start, %end, "appointment booked");
            Ok(Booking {
                event_id: created.id,
                link: created.link,
                start,
                end,
            })
        };

        let local = start.with_timezone(&tz);
        let slot = SlotTime::truncate(local.time());
        if self.grid.contains(slot) && slot.as_naive() == local.time() {
            self.locks
                .with_slot(SlotKey::new(local.date_naive(), slot), insert)
        } else {
            insert()
        }
    }
}
