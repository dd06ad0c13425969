//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the data-access contracts the enrollment engine consumes.
//! - Keep SQL, locking and row mapping out of the service layer.
//!
//! # Invariants
//! - Repository reads ignore soft-deleted rows.
//! - Repository errors classify lock waits and uniqueness failures so the
//!   service can map them to retryable or validation outcomes.

pub mod catalog_repo;
pub mod enrollment_repo;
