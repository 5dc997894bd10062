//! Wire formats for the upward interface.
//!
//! - dates: `YYYY-MM-DD`
//! - slot times: `HH:MM` (see [`SlotTime`](crate::grid::SlotTime))
//! - booking starts: ISO-8601 with or without an offset
//!   (`2024-11-20T10:00`, `2024-11-20T10:00:00`, `2024-11-20T10:00+05:30`,
//!   `2024-11-20T04:30:00Z`)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const ZONED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M%z"];

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| SlotError::InvalidInput(format!("date '{}' is not YYYY-MM-DD: {}", s, e)))
}

/// A booking start as received: either already zoned or calendar-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStart {
    Zoned(DateTime<FixedOffset>),
    /// No offset given; interpreted in the calendar's timezone, never UTC.
    Naive(NaiveDateTime),
}

impl FromStr for BookingStart {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(BookingStart::Zoned(dt));
        }
        for format in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, format) {
                return Ok(BookingStart::Zoned(dt));
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(BookingStart::Naive(naive));
            }
        }
        Err(SlotError::InvalidInput(format!(
            "start '{}' is not an ISO-8601 timestamp",
            s
        )))
    }
}

/// Staff toggle on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotAction {
    Block,
    Unblock,
}

impl FromStr for SlotAction {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "block" => Ok(SlotAction::Block),
            "unblock" => Ok(SlotAction::Unblock),
            other => Err(SlotError::InvalidInput(format!(
                "unknown action '{}' (expected block or unblock)",
                other
            ))),
        }
    }
}

/// `(success, message)` pair handed to the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl<T: fmt::Display> From<Result<T>> for Outcome {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome {
                success: true,
                message: value.to_string(),
            },
            Err(err) => Outcome {
                success: false,
                message: err.to_string(),
            },
        }
    }
}
