//! Detect and repair slots controlled by more than one event.
//!
//! The slot locks serialize mutations inside one engine, but two engines (or
//! staff editing the calendar directly) can still leave duplicates behind.
//! Resolution hides them ("first match wins"); this pass finds them.
//!
//! Repair policy: the event resolution reports (the first match) always
//! stays. Shadowed blocking events are deleted. A shadowed appointment is
//! never deleted; its slot is reported as unresolved for staff.

use chrono::NaiveDate;
use serde::Serialize;

use crate::engine::SlotEngine;
use crate::error::{GatewayError, Result};
use crate::gateway::{CalendarEvent, CalendarGateway};
use crate::grid::SlotTime;
use crate::locks::SlotKey;
use crate::resolver::{DayView, SlotClaim};

/// A slot with more than one controlling event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateClaim {
    pub time: SlotTime,
    /// The event resolution currently reports.
    pub kept: CalendarEvent,
    /// Later matches that resolution masks.
    pub shadowed: Vec<CalendarEvent>,
}

/// Find every grid slot of `view` with more than one controlling event.
pub fn find_duplicate_claims(view: &DayView<'_>, slots: &[SlotTime]) -> Vec<DuplicateClaim> {
    slots
        .iter()
        .filter_map(|&time| {
            let mut controlling = view.controlling(time).cloned();
            let kept = controlling.next()?;
            let shadowed: Vec<CalendarEvent> = controlling.collect();
            if shadowed.is_empty() {
                return None;
            }
            Some(DuplicateClaim {
                time,
                kept,
                shadowed,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Ids of deleted blocking events.
    pub removed: Vec<String>,
    /// Slots where an appointment is still masked by an earlier event.
    pub unresolved: Vec<SlotTime>,
}

impl<G: CalendarGateway> SlotEngine<G> {
    /// Remove duplicate controlling events on `date` following the module's
    /// repair policy.
    ///
    /// # Errors
    /// `GatewayUnavailable` if the timezone, events or a delete fail. Events
    /// that vanished in the meantime are skipped.
    pub fn reconcile(&self, date: NaiveDate) -> Result<ReconcileReport> {
        let tz = self.require_zone()?;
        let events = self.fetch_day(date, tz)?;
        let suspects: Vec<SlotTime> =
            find_duplicate_claims(&self.view(date, tz, &events), self.grid.slots())
                .into_iter()
                .map(|duplicate| duplicate.time)
                .collect();

        let mut report = ReconcileReport::default();
        for time in suspects {
            self.locks
                .with_slot(SlotKey::new(date, time), || -> Result<()> {
                    // Re-read under the lock: the slot may have changed since
                    // the scan.
                    let events = self.fetch_day(date, tz)?;
                    let fresh = find_duplicate_claims(&self.view(date, tz, &events), &[time]);
                    match fresh.first() {
                        Some(duplicate) => self.repair(date, duplicate, &mut report),
                        None => Ok(()),
                    }
                })?;
        }

        if !report.removed.is_empty() || !report.unresolved.is_empty() {
            tracing::info!(
                %date,
                removed = report.removed.len(),
                unresolved = report.unresolved.len(),
                "reconciled duplicate slot claims"
            );
        }
        Ok(report)
    }

    fn repair(
        &self,
        date: NaiveDate,
        duplicate: &DuplicateClaim,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let (blocking, booked): (Vec<&CalendarEvent>, Vec<&CalendarEvent>) = duplicate
            .shadowed
            .iter()
            .partition(|e| SlotClaim::of(e, &self.labels) == SlotClaim::Blocked);

        for event in blocking {
            match self.gateway.delete_event(&event.id) {
                Ok(()) => report.removed.push(event.id.clone()),
                Err(GatewayError::NotFound(_)) => {
                    tracing::debug!(%date, event_id = %event.id, "duplicate already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !booked.is_empty() {
            tracing::warn!(
                %date,
                slot = %duplicate.time,
                kept = %duplicate.kept.id,
                masked = booked.len(),
                "appointment masked by an earlier event; leaving for staff"
            );
            report.unresolved.push(duplicate.time);
        }
        Ok(())
    }
}
