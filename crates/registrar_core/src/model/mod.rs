//! Academic domain model.
//!
//! # Responsibility
//! - Define the records the enrollment engine reads and writes.
//! - Keep field-level policy checks next to the types they guard.
//!
//! # Invariants
//! - Identity is the integer row id assigned by the store.
//! - Deletion is a `deleted_at` tombstone, never a hard delete.

pub mod classroom;
pub mod clock;
pub mod course;
pub mod enrollment;
pub mod identity;
pub mod period;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level policy violation found on a model before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ModelValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ModelValidationError {}
