//! Enrollment commit use-case service.
//!
//! # Responsibility
//! - Run one enroll or withdraw request end-to-end in a single unit of work.
//! - Apply the enrollment rules in a fixed, fail-fast order and report the
//!   first violation as a field-tagged error.
//!
//! # Invariants
//! - The target classroom is fetched with `LockMode::ForUpdate` before any
//!   capacity decision, and the lock is held until commit or rollback.
//! - Every rule is checked before the first write; a rejected request leaves
//!   no trace in the store.
//! - `participants_count` changes only here, by exactly one, together with
//!   the enrollment row it mirrors.

use crate::model::classroom::{ClassroomId, ClassroomView};
use crate::model::enrollment::ParticipantId;
use crate::model::identity::{Caller, Role};
use crate::model::period::PeriodId;
use crate::repo::enrollment_repo::{EnrollmentRepository, EnrollmentStore, LockMode, RepoError};
use crate::schedule::credits::{exceeds_cap, total_credits, MAX_CREDITS};
use crate::schedule::overlap::first_conflict;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub const FIELD_PERIOD_ID: &str = "period_id";
pub const FIELD_CLASSROOM_ID: &str = "classroom_id";

/// Inbound enrollment request. The participant comes from [`Caller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub classroom_id: ClassroomId,
    pub period_id: PeriodId,
}

/// One `(field, message)` pair reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Business rule that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentRule {
    AlreadyEnrolled,
    PeriodMismatch,
    ScheduleOverlap,
    QuotaFull,
    CreditCap,
    NotEnrolled,
}

impl EnrollmentRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyEnrolled => "already_enrolled",
            Self::PeriodMismatch => "period_mismatch",
            Self::ScheduleOverlap => "schedule_overlap",
            Self::QuotaFull => "quota_full",
            Self::CreditCap => "credit_cap_exceeded",
            Self::NotEnrolled => "not_enrolled",
        }
    }
}

/// Errors from enrollment use-cases.
#[derive(Debug)]
pub enum EnrollmentError {
    /// Caller role may not perform the action.
    Forbidden { role: Role, action: &'static str },
    /// Referenced period, classroom or course does not exist.
    NotFound(FieldError),
    /// A business rule rejected the request.
    Validation(EnrollmentRule, FieldError),
    /// The classroom lock was not granted in time. Retryable.
    LockTimeout,
    /// Infrastructure failure. The unit of work was rolled back.
    Storage(RepoError),
}

impl EnrollmentError {
    fn not_found(field: &str, message: impl Into<String>) -> Self {
        Self::NotFound(FieldError::new(field, message))
    }

    fn rejected(rule: EnrollmentRule, message: impl Into<String>) -> Self {
        Self::Validation(rule, FieldError::new(FIELD_CLASSROOM_ID, message))
    }

    fn already_enrolled(classroom_id: ClassroomId) -> Self {
        Self::rejected(
            EnrollmentRule::AlreadyEnrolled,
            format!("You have already enrolled in classroom with id {classroom_id}"),
        )
    }

    /// Field-tagged messages for client display. Empty for non-field errors.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            Self::NotFound(err) | Self::Validation(_, err) => vec![err.clone()],
            _ => Vec::new(),
        }
    }

    /// Rule that fired, for validation rejections.
    pub fn rule(&self) -> Option<EnrollmentRule> {
        match self {
            Self::Validation(rule, _) => Some(*rule),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout)
    }

    /// HTTP status the outer layer should use.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden { .. } => 403,
            Self::NotFound(_) => 404,
            Self::Validation(..) => 422,
            Self::LockTimeout => 409,
            Self::Storage(_) => 500,
        }
    }

    /// Stable machine-readable code used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Validation(rule, _) => rule.as_str(),
            Self::LockTimeout => "lock_timeout",
            Self::Storage(_) => "storage_failure",
        }
    }
}

impl Display for EnrollmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden { role, action } => {
                write!(f, "role `{role}` is not allowed to {action}")
            }
            Self::NotFound(err) | Self::Validation(_, err) => {
                write!(f, "{}: {}", err.field, err.message)
            }
            Self::LockTimeout => write!(f, "classroom is busy, retry the request"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EnrollmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EnrollmentError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::LockTimeout => Self::LockTimeout,
            other => Self::Storage(other),
        }
    }
}

/// Enrollment commit coordinator.
pub struct EnrollmentService<S: EnrollmentStore> {
    store: S,
}

impl<S: EnrollmentStore> EnrollmentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Enrolls the calling student into a classroom of the given period.
    ///
    /// # Contract
    /// - Caller must hold [`Role::Student`].
    /// - Returns the classroom with its incremented `participants_count`.
    /// - Any error leaves the store unchanged.
    pub fn enroll(
        &self,
        caller: &Caller,
        request: &EnrollmentRequest,
    ) -> Result<ClassroomView, EnrollmentError> {
        let attempt_id = Uuid::new_v4();
        let started_at = Instant::now();

        let outcome = ensure_role(caller, Role::Student, "enroll").and_then(|()| {
            self.store
                .transaction(|repo| commit_enrollment(repo, caller.user_id, request))
        });

        log_outcome(
            "enroll",
            attempt_id,
            caller,
            request.classroom_id,
            &outcome,
            started_at,
        );
        outcome
    }

    /// Withdraws the calling student from a classroom.
    ///
    /// Uses the same classroom lock as [`Self::enroll`], so the seat counter
    /// never races with concurrent enrollments.
    pub fn withdraw(
        &self,
        caller: &Caller,
        classroom_id: ClassroomId,
    ) -> Result<ClassroomView, EnrollmentError> {
        let attempt_id = Uuid::new_v4();
        let started_at = Instant::now();

        let outcome = ensure_role(caller, Role::Student, "withdraw").and_then(|()| {
            self.store
                .transaction(|repo| commit_withdrawal(repo, caller.user_id, classroom_id))
        });

        log_outcome(
            "withdraw",
            attempt_id,
            caller,
            classroom_id,
            &outcome,
            started_at,
        );
        outcome
    }
}

fn ensure_role(caller: &Caller, required: Role, action: &'static str) -> Result<(), EnrollmentError> {
    if caller.role != required {
        return Err(EnrollmentError::Forbidden {
            role: caller.role,
            action,
        });
    }
    Ok(())
}

fn commit_enrollment(
    repo: &dyn EnrollmentRepository,
    participant_id: ParticipantId,
    request: &EnrollmentRequest,
) -> Result<ClassroomView, EnrollmentError> {
    if repo.find_period(request.period_id)?.is_none() {
        return Err(EnrollmentError::not_found(
            FIELD_PERIOD_ID,
            format!("Period with id {} not found", request.period_id),
        ));
    }

    let mut classroom = repo
        .find_classroom(request.classroom_id, LockMode::ForUpdate)?
        .ok_or_else(|| {
            EnrollmentError::not_found(
                FIELD_CLASSROOM_ID,
                format!("Classroom with id {} not found", request.classroom_id),
            )
        })?;

    let course = repo.find_course(classroom.course_id)?.ok_or_else(|| {
        EnrollmentError::not_found(
            FIELD_CLASSROOM_ID,
            format!("Course with id {} not found", classroom.course_id),
        )
    })?;

    if repo
        .find_active_enrollment(participant_id, classroom.id)?
        .is_some()
    {
        return Err(EnrollmentError::already_enrolled(classroom.id));
    }

    if classroom.period_id != request.period_id {
        return Err(EnrollmentError::rejected(
            EnrollmentRule::PeriodMismatch,
            "Classroom period does not match with selected period",
        ));
    }

    let held = repo.list_held_classrooms(participant_id, request.period_id)?;

    if let Some(conflict) = first_conflict(&classroom.time_window(), &held) {
        return Err(EnrollmentError::rejected(
            EnrollmentRule::ScheduleOverlap,
            format!(
                "Classroom {} overlaps with enrolled classroom {}",
                classroom.code, conflict.code
            ),
        ));
    }

    if !classroom.has_open_seat() {
        return Err(EnrollmentError::rejected(
            EnrollmentRule::QuotaFull,
            format!("Classroom {} quota is full", classroom.code),
        ));
    }

    let held_credits = total_credits(held.iter().map(|seat| seat.credits));
    if exceeds_cap(held_credits, course.credits) {
        return Err(EnrollmentError::rejected(
            EnrollmentRule::CreditCap,
            format!("Total credits exceed the maximum credits of {MAX_CREDITS}"),
        ));
    }

    // The partial unique index backs the existence check above.
    repo.insert_enrollment(participant_id, classroom.id)
        .map_err(|err| match err {
            RepoError::Conflict(_) => EnrollmentError::already_enrolled(classroom.id),
            other => other.into(),
        })?;

    classroom.participants_count += 1;
    repo.save_participants_count(&classroom)?;

    Ok(classroom.to_view())
}

fn commit_withdrawal(
    repo: &dyn EnrollmentRepository,
    participant_id: ParticipantId,
    classroom_id: ClassroomId,
) -> Result<ClassroomView, EnrollmentError> {
    let mut classroom = repo
        .find_classroom(classroom_id, LockMode::ForUpdate)?
        .ok_or_else(|| {
            EnrollmentError::not_found(
                FIELD_CLASSROOM_ID,
                format!("Classroom with id {classroom_id} not found"),
            )
        })?;

    let enrollment = repo
        .find_active_enrollment(participant_id, classroom.id)?
        .ok_or_else(|| {
            EnrollmentError::rejected(
                EnrollmentRule::NotEnrolled,
                format!("You have not enrolled in classroom with id {classroom_id}"),
            )
        })?;

    repo.soft_delete_enrollment(enrollment.id)?;

    classroom.participants_count = classroom.participants_count.checked_sub(1).ok_or_else(|| {
        EnrollmentError::Storage(RepoError::InvalidData(format!(
            "classroom {classroom_id} has an active enrollment but a zero participants_count"
        )))
    })?;
    repo.save_participants_count(&classroom)?;

    Ok(classroom.to_view())
}

fn log_outcome(
    event: &str,
    attempt_id: Uuid,
    caller: &Caller,
    classroom_id: ClassroomId,
    outcome: &Result<ClassroomView, EnrollmentError>,
    started_at: Instant,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match outcome {
        Ok(view) => info!(
            "event={} module=enrollment status=ok attempt_id={} participant_id={} classroom_id={} participants_count={} quota={} duration_ms={}",
            event,
            attempt_id,
            caller.user_id,
            classroom_id,
            view.participants_count,
            view.quota,
            duration_ms
        ),
        Err(EnrollmentError::Storage(err)) => error!(
            "event={} module=enrollment status=error attempt_id={} participant_id={} classroom_id={} duration_ms={} error_code=storage_failure error={}",
            event, attempt_id, caller.user_id, classroom_id, duration_ms, err
        ),
        Err(err) if err.is_retryable() => warn!(
            "event={} module=enrollment status=retryable attempt_id={} participant_id={} classroom_id={} duration_ms={} error_code={}",
            event,
            attempt_id,
            caller.user_id,
            classroom_id,
            duration_ms,
            err.error_code()
        ),
        Err(err) => warn!(
            "event={} module=enrollment status=rejected attempt_id={} participant_id={} classroom_id={} duration_ms={} error_code={}",
            event,
            attempt_id,
            caller.user_id,
            classroom_id,
            duration_ms,
            err.error_code()
        ),
    }
}
