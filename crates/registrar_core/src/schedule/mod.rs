//! Pure scheduling rules used by the enrollment commit.
//!
//! # Responsibility
//! - Decide time-slot overlap between classrooms.
//! - Accumulate credit-hours against the fixed cap.
//!
//! # Invariants
//! - No I/O; every function here is total and deterministic.

pub mod credits;
pub mod overlap;
