//! Enrollment record: one student holding one seat.

use super::classroom::ClassroomId;
use super::clock::WallClock;
use super::period::PeriodId;
use crate::schedule::overlap::TimeWindow;
use serde::{Deserialize, Serialize};

pub type EnrollmentId = i64;
pub type ParticipantId = i64;

/// Active seat. Withdrawn rows are tombstoned in the store and never loaded.
/// Credit and schedule data are never copied here; they are read from the
/// classroom and course at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub participant_id: ParticipantId,
    pub classroom_id: ClassroomId,
}

/// One of a student's active seats, joined with the schedule and credit
/// data the commit checks need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldClassroom {
    pub classroom_id: ClassroomId,
    pub code: String,
    pub period_id: PeriodId,
    pub day: u8,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub credits: u32,
}

impl HeldClassroom {
    pub fn time_window(&self) -> TimeWindow {
        TimeWindow {
            day: self.day,
            start: self.start_time,
            end: self.end_time,
        }
    }
}
