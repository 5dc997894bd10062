//! The shift grid: fixed daily windows sliced into equal slot start-times.
//!
//! The grid is the same for every date. Each window contributes the starts
//! `start, start + step, ...` that lie strictly before the window end, so a
//! window whose length is not a multiple of the step silently drops the
//! remainder (10:00–11:45 at 30 minutes ends with 11:00, 11:30).

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SlotError};

/// Default step between slot starts, in minutes.
pub const DEFAULT_STEP_MINUTES: u32 = 30;

/// Largest accepted step: one slot per window.
pub const MAX_STEP_MINUTES: u32 = 24 * 60;

/// A slot's time of day, always at whole-minute precision.
///
/// Displays and parses as zero-padded 24-hour `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    /// Build a slot time from an hour (0–23) and minute (0–59).
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    /// Truncate a wall-clock time to `HH:MM`, discarding seconds.
    pub fn truncate(time: NaiveTime) -> Self {
        let minute = time
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(time);
        SlotTime(minute)
    }

    pub fn as_naive(self) -> NaiveTime {
        self.0
    }

    fn minute_of_day(self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }

    fn from_minute_of_day(minutes: u32) -> Option<Self> {
        Self::from_hm(minutes / 60, minutes % 60)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 2 || b.is_ascii_digit());
        if !well_formed {
            return Err(SlotError::InvalidInput(format!(
                "slot time '{}' is not zero-padded HH:MM",
                s
            )));
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .map(SlotTime)
            .map_err(|e| SlotError::InvalidInput(format!("slot time '{}': {}", s, e)))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One working window of the day, e.g. morning 10:00–13:00.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub name: String,
    /// First slot start (inclusive).
    pub start: SlotTime,
    /// Window close (exclusive): no slot starts at or after it.
    pub end: SlotTime,
}

impl ShiftWindow {
    pub fn new(name: &str, start: SlotTime, end: SlotTime) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }
}

/// The process-wide slot grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftGrid {
    windows: Vec<ShiftWindow>,
    step_minutes: u32,
    slots: Vec<SlotTime>,
}

impl ShiftGrid {
    /// Validate the windows and precompute the slot list.
    ///
    /// # Errors
    /// Returns `SlotError::InvalidInput` when the step is zero or longer than
    /// a day, a window is empty, or windows are out of order or overlapping.
    pub fn new(windows: Vec<ShiftWindow>, step_minutes: u32) -> Result<Self> {
        if step_minutes == 0 {
            return Err(SlotError::InvalidInput(
                "grid step must be at least one minute".to_string(),
            ));
        }
        if step_minutes > MAX_STEP_MINUTES {
            return Err(SlotError::InvalidInput(format!(
                "grid step of {} minutes exceeds one day",
                step_minutes
            )));
        }
        for window in &windows {
            if window.start >= window.end {
                return Err(SlotError::InvalidInput(format!(
                    "window '{}' must start before it ends ({}–{})",
                    window.name, window.start, window.end
                )));
            }
        }
        for pair in windows.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(SlotError::InvalidInput(format!(
                    "window '{}' overlaps or precedes window '{}'",
                    pair[1].name, pair[0].name
                )));
            }
        }

        let slots = generate_slots(&windows, step_minutes);
        Ok(Self {
            windows,
            step_minutes,
            slots,
        })
    }

    /// Morning 10:00–13:00 and evening 17:00–21:00 at 30-minute steps.
    pub fn clinic_default() -> Self {
        let slots = generate_slots(&default_windows(), DEFAULT_STEP_MINUTES);
        Self {
            windows: default_windows(),
            step_minutes: DEFAULT_STEP_MINUTES,
            slots,
        }
    }

    /// Slot start-times in grid order.
    pub fn slots(&self) -> &[SlotTime] {
        &self.slots
    }

    pub fn contains(&self, time: SlotTime) -> bool {
        self.slots.contains(&time)
    }

    pub fn windows(&self) -> &[ShiftWindow] {
        &self.windows
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }
}

impl Default for ShiftGrid {
    fn default() -> Self {
        Self::clinic_default()
    }
}

/// The two windows every clinic day is built from unless configured otherwise.
pub fn default_windows() -> Vec<ShiftWindow> {
    let hm = |h, m| SlotTime::from_hm(h, m).unwrap_or(SlotTime(NaiveTime::MIN));
    vec![
        ShiftWindow::new("morning", hm(10, 0), hm(13, 0)),
        ShiftWindow::new("evening", hm(17, 0), hm(21, 0)),
    ]
}

/// Slice each window into `step_minutes` starts, window order preserved.
///
/// Pure and deterministic. A zero step yields no slots.
pub fn generate_slots(windows: &[ShiftWindow], step_minutes: u32) -> Vec<SlotTime> {
    if step_minutes == 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    for window in windows {
        let end = window.end.minute_of_day();
        let mut cursor = window.start.minute_of_day();
        while cursor < end {
            if let Some(slot) = SlotTime::from_minute_of_day(cursor) {
                slots.push(slot);
            }
            cursor = match cursor.checked_add(step_minutes) {
                Some(next) => next,
                None => break,
            };
        }
    }
    slots
}
