//! Classroom (course section) record.
//!
//! # Responsibility
//! - Carry the weekly slot, capacity, and denormalized seat counter.
//! - Provide the outward-facing view returned after enrollment changes.
//!
//! # Invariants
//! - `day` is within `0..=6`.
//! - `quota > 0`. Writes never raise `participants_count` past `quota`; a
//!   stored counter above it reads as a full classroom.
//! - `participants_count` equals the number of active enrollments; only the
//!   enrollment service mutates it, under the classroom lock.

use super::clock::WallClock;
use super::course::CourseId;
use super::period::PeriodId;
use super::ModelValidationError;
use crate::schedule::overlap::TimeWindow;
use serde::{Deserialize, Serialize};

pub type ClassroomId = i64;

/// Highest valid weekday index.
pub const MAX_DAY: u8 = 6;

/// Scheduled offering of one course within one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: ClassroomId,
    pub code: String,
    pub course_id: CourseId,
    pub period_id: PeriodId,
    pub day: u8,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub quota: u32,
    pub participants_count: u32,
}

impl Classroom {
    /// Checks slot and capacity policy.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        self.validate_slot()?;
        if self.participants_count > self.quota {
            return Err(ModelValidationError::new(
                "participants_count",
                format!(
                    "participants_count {} exceeds quota {}",
                    self.participants_count, self.quota
                ),
            ));
        }
        Ok(())
    }

    /// Checks day and quota only. An over-full counter passes and is
    /// treated as having no open seat.
    pub fn validate_slot(&self) -> Result<(), ModelValidationError> {
        if self.day > MAX_DAY {
            return Err(ModelValidationError::new(
                "day",
                format!("day must be between 0 and {MAX_DAY}, got {}", self.day),
            ));
        }
        if self.quota == 0 {
            return Err(ModelValidationError::new(
                "quota",
                "quota must be a positive integer",
            ));
        }
        Ok(())
    }

    pub fn has_open_seat(&self) -> bool {
        self.participants_count < self.quota
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow {
            day: self.day,
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn to_view(&self) -> ClassroomView {
        ClassroomView::from(self)
    }
}

/// Classroom shape returned to callers of enrollment operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomView {
    pub id: ClassroomId,
    pub code: String,
    pub course_id: CourseId,
    pub period_id: PeriodId,
    pub day: u8,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub quota: u32,
    pub participants_count: u32,
}

impl From<&Classroom> for ClassroomView {
    fn from(value: &Classroom) -> Self {
        Self {
            id: value.id,
            code: value.code.clone(),
            course_id: value.course_id,
            period_id: value.period_id,
            day: value.day,
            start_time: value.start_time,
            end_time: value.end_time,
            quota: value.quota,
            participants_count: value.participants_count,
        }
    }
}
