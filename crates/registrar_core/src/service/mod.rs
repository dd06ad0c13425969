//! Registration use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into request-level operations.
//! - Map storage failures into caller-facing error categories.

pub mod enrollment_service;
pub mod query_service;
