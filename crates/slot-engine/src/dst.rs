//! DST transition policies for turning clinic wall-clock times into instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Longest DST gap we search across when shifting forward.
const MAX_GAP_MINUTES: i64 = 180;

/// Policy for local times that fall in a DST gap or overlap.
///
/// Ambiguous times (the repeated hour in autumn) always resolve to the
/// earliest instant; the policy only matters for nonexistent times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Reject times that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the next valid time after the gap
    ShiftForward,
    /// Use wall clock time (keep the pre-transition offset)
    #[default]
    WallClock,
}

/// Resolve a naive local time in `tz` according to `policy`.
///
/// Returns `None` only when the time is nonexistent and the policy is `Skip`
/// (or no valid time exists within a plausible gap).
pub fn localize(tz: Tz, naive: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => (1..=MAX_GAP_MINUTES)
                .map(|m| naive + Duration::minutes(m))
                .find_map(|candidate| tz.from_local_datetime(&candidate).earliest()),
            DstPolicy::WallClock => {
                let before = tz
                    .from_local_datetime(&(naive - Duration::minutes(MAX_GAP_MINUTES)))
                    .earliest()?;
                let offset = before.offset().fix().local_minus_utc();
                let utc = naive - Duration::seconds(i64::from(offset));
                Some(tz.from_utc_datetime(&utc))
            }
        },
    }
}
