//! Catalog course record.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};

pub type CourseId = i64;

/// Policy ceiling for a single course weight.
pub const MAX_COURSE_CREDITS: u32 = 10;

/// Catalog subject with a fixed credit-hour weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub credits: u32,
}

impl Course {
    /// Checks the credit policy (`1..=MAX_COURSE_CREDITS`).
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_credits(self.credits)
    }
}

pub(crate) fn validate_credits(credits: u32) -> Result<(), ModelValidationError> {
    if credits == 0 || credits > MAX_COURSE_CREDITS {
        return Err(ModelValidationError::new(
            "credits",
            format!("credits must be between 1 and {MAX_COURSE_CREDITS}, got {credits}"),
        ));
    }
    Ok(())
}
