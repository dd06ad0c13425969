//! Weekly time-slot overlap check.

use crate::model::clock::WallClock;
use crate::model::enrollment::HeldClassroom;

/// Weekly slot: weekday plus a half-open `[start, end)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub day: u8,
    pub start: WallClock,
    pub end: WallClock,
}

/// Returns whether two slots intersect.
///
/// Windows on different days never overlap, and windows that merely touch
/// (`a.end == b.start`) do not overlap either.
pub fn overlaps(candidate: &TimeWindow, held: &TimeWindow) -> bool {
    if candidate.day != held.day {
        return false;
    }

    let start = candidate.start.minutes_since_midnight();
    let end = candidate.end.minutes_since_midnight();
    let held_start = held.start.minutes_since_midnight();
    let held_end = held.end.minutes_since_midnight();

    start < held_end && end > held_start
}

/// Returns the first held classroom, in iteration order, that overlaps
/// `candidate`.
pub fn first_conflict<'a>(
    candidate: &TimeWindow,
    held: &'a [HeldClassroom],
) -> Option<&'a HeldClassroom> {
    held.iter()
        .filter(|seat| seat.day == candidate.day)
        .find(|seat| overlaps(candidate, &seat.time_window()))
}
