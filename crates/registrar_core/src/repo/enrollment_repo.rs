//! Enrollment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Give the enrollment commit read/write access to periods, courses,
//!   classrooms and enrollments.
//! - Expose exclusive classroom access as an explicit capability
//!   (`LockMode::ForUpdate`) and run units of work atomically.
//!
//! # Invariants
//! - Soft-deleted rows are invisible to every lookup here.
//! - `LockMode::ForUpdate` is only honored inside a store transaction; the
//!   lock is held until that transaction commits or rolls back.
//! - A dropped unit of work rolls back; nothing partial is ever committed.
//! - `BEGIN IMMEDIATE` takes the store-wide writer lock, so enrollments into
//!   different classrooms also commit one at a time.
//! - A stored `participants_count` above `quota` loads as a full classroom;
//!   `save_participants_count` only lets such a counter go down.

use crate::db::DbError;
use crate::model::classroom::{Classroom, ClassroomId};
use crate::model::course::{Course, CourseId};
use crate::model::enrollment::{Enrollment, EnrollmentId, HeldClassroom, ParticipantId};
use crate::model::period::{Period, PeriodId};
use crate::model::ModelValidationError;
use log::warn;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CLASSROOM_SELECT_SQL: &str = "SELECT
    id,
    code,
    course_id,
    period_id,
    day,
    start_time,
    end_time,
    quota,
    participants_count
FROM classrooms";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by the academic persistence layer.
#[derive(Debug)]
pub enum RepoError {
    /// Model failed its policy check before a write.
    Validation(ModelValidationError),
    /// Transport or schema failure.
    Db(DbError),
    /// The store could not grant a lock within the configured wait bound.
    LockTimeout,
    /// A uniqueness constraint rejected the write.
    Conflict(String),
    /// Exclusive access was requested outside a transaction.
    TransactionRequired,
    NotFound { entity: &'static str, id: i64 },
    /// Persisted row cannot be mapped to a valid model.
    InvalidData(String),
}

impl RepoError {
    /// Whether retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout)
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::LockTimeout => write!(f, "timed out waiting for a database write lock"),
            Self::Conflict(message) => write!(f, "unique constraint violated: {message}"),
            Self::TransactionRequired => {
                write!(f, "exclusive row access requires an open transaction")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => return Self::LockTimeout,
                ErrorCode::ConstraintViolation
                    if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return Self::Conflict(
                        message.clone().unwrap_or_else(|| "unique constraint".to_string()),
                    );
                }
                _ => {}
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row access mode for classroom lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Plain committed read.
    Shared,
    /// Exclusive access until the enclosing transaction ends.
    ForUpdate,
}

/// Data access used by the enrollment commit, scoped to one unit of work.
pub trait EnrollmentRepository {
    /// Loads an active period.
    fn find_period(&self, id: PeriodId) -> RepoResult<Option<Period>>;
    /// Loads an active course.
    fn find_course(&self, id: CourseId) -> RepoResult<Option<Course>>;
    /// Loads an active classroom, optionally taking exclusive access.
    fn find_classroom(&self, id: ClassroomId, lock: LockMode) -> RepoResult<Option<Classroom>>;
    /// Loads the participant's active seat in a classroom, if any.
    fn find_active_enrollment(
        &self,
        participant_id: ParticipantId,
        classroom_id: ClassroomId,
    ) -> RepoResult<Option<Enrollment>>;
    /// Lists the participant's active seats in one period, oldest first.
    fn list_held_classrooms(
        &self,
        participant_id: ParticipantId,
        period_id: PeriodId,
    ) -> RepoResult<Vec<HeldClassroom>>;
    /// Inserts an active enrollment row.
    fn insert_enrollment(
        &self,
        participant_id: ParticipantId,
        classroom_id: ClassroomId,
    ) -> RepoResult<Enrollment>;
    /// Tombstones an active enrollment row.
    fn soft_delete_enrollment(&self, id: EnrollmentId) -> RepoResult<()>;
    /// Persists the classroom's seat counter.
    fn save_participants_count(&self, classroom: &Classroom) -> RepoResult<()>;
}

/// Transactional execution over an [`EnrollmentRepository`].
pub trait EnrollmentStore {
    /// Runs `work` atomically.
    ///
    /// # Contract
    /// - `Ok` commits every write made through the repository.
    /// - `Err` (or a panic) rolls everything back.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EnrollmentRepository) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed repository bound to one connection or transaction.
pub struct SqliteEnrollmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEnrollmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EnrollmentRepository for SqliteEnrollmentRepository<'_> {
    fn find_period(&self, id: PeriodId) -> RepoResult<Option<Period>> {
        self.conn
            .query_row(
                "SELECT id, code, name
                 FROM periods
                 WHERE id = ?1
                   AND deleted_at IS NULL;",
                [id],
                |row| {
                    Ok(Period {
                        id: row.get("id")?,
                        code: row.get("code")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn find_course(&self, id: CourseId) -> RepoResult<Option<Course>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, name, credits
             FROM courses
             WHERE id = ?1
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_course_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_classroom(&self, id: ClassroomId, lock: LockMode) -> RepoResult<Option<Classroom>> {
        if lock == LockMode::ForUpdate {
            if self.conn.is_autocommit() {
                return Err(RepoError::TransactionRequired);
            }
            // No-op write: takes the reserved (writer) lock even when the
            // enclosing transaction was opened as deferred.
            self.conn.execute(
                "UPDATE classrooms
                 SET participants_count = participants_count
                 WHERE id = ?1;",
                [id],
            )?;
        }

        let mut stmt = self.conn.prepare(&format!(
            "{CLASSROOM_SELECT_SQL}
             WHERE id = ?1
               AND deleted_at IS NULL;"
        ))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_classroom_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_active_enrollment(
        &self,
        participant_id: ParticipantId,
        classroom_id: ClassroomId,
    ) -> RepoResult<Option<Enrollment>> {
        self.conn
            .query_row(
                "SELECT id, participant_id, classroom_id
                 FROM enrollments
                 WHERE participant_id = ?1
                   AND classroom_id = ?2
                   AND deleted_at IS NULL;",
                params![participant_id, classroom_id],
                |row| {
                    Ok(Enrollment {
                        id: row.get("id")?,
                        participant_id: row.get("participant_id")?,
                        classroom_id: row.get("classroom_id")?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn list_held_classrooms(
        &self,
        participant_id: ParticipantId,
        period_id: PeriodId,
    ) -> RepoResult<Vec<HeldClassroom>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.id AS classroom_id,
                c.code AS code,
                c.period_id AS period_id,
                c.day AS day,
                c.start_time AS start_time,
                c.end_time AS end_time,
                cr.credits AS credits
             FROM enrollments e
             JOIN classrooms c ON c.id = e.classroom_id AND c.deleted_at IS NULL
             JOIN courses cr ON cr.id = c.course_id AND cr.deleted_at IS NULL
             WHERE e.participant_id = ?1
               AND e.deleted_at IS NULL
               AND c.period_id = ?2
             ORDER BY e.id ASC;",
        )?;
        let mut rows = stmt.query(params![participant_id, period_id])?;

        let mut held = Vec::new();
        while let Some(row) = rows.next()? {
            held.push(HeldClassroom {
                classroom_id: row.get("classroom_id")?,
                code: row.get("code")?,
                period_id: row.get("period_id")?,
                day: parse_day(row.get("day")?)?,
                start_time: parse_clock(row, "start_time")?,
                end_time: parse_clock(row, "end_time")?,
                credits: parse_unsigned(row.get("credits")?, "courses.credits")?,
            });
        }
        Ok(held)
    }

    fn insert_enrollment(
        &self,
        participant_id: ParticipantId,
        classroom_id: ClassroomId,
    ) -> RepoResult<Enrollment> {
        self.conn.execute(
            "INSERT INTO enrollments (participant_id, classroom_id)
             VALUES (?1, ?2);",
            params![participant_id, classroom_id],
        )?;

        Ok(Enrollment {
            id: self.conn.last_insert_rowid(),
            participant_id,
            classroom_id,
        })
    }

    fn soft_delete_enrollment(&self, id: EnrollmentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE enrollments
             SET deleted_at = (strftime('%s', 'now') * 1000),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL;",
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "enrollment",
                id,
            });
        }
        Ok(())
    }

    fn save_participants_count(&self, classroom: &Classroom) -> RepoResult<()> {
        classroom.validate_slot()?;

        // Decrements always apply; increments only while a seat is free.
        let changed = self.conn.execute(
            "UPDATE classrooms
             SET participants_count = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND deleted_at IS NULL
               AND (?2 <= quota OR ?2 < participants_count);",
            params![classroom.id, i64::from(classroom.participants_count)],
        )?;
        if changed == 0 {
            if self.find_classroom(classroom.id, LockMode::Shared)?.is_some() {
                return Err(RepoError::Validation(ModelValidationError::new(
                    "participants_count",
                    format!(
                        "participants_count {} exceeds quota {}",
                        classroom.participants_count, classroom.quota
                    ),
                )));
            }
            return Err(RepoError::NotFound {
                entity: "classroom",
                id: classroom.id,
            });
        }
        Ok(())
    }
}

/// SQLite unit-of-work runner.
///
/// Every unit of work opens with `BEGIN IMMEDIATE`, so the writer lock is
/// taken before the first read and waits at most the connection's busy
/// timeout. Concurrent workers must each own a separate connection.
pub struct SqliteEnrollmentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEnrollmentStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EnrollmentStore for SqliteEnrollmentStore<'_> {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EnrollmentRepository) -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| E::from(RepoError::from(err)))?;
        let repo = SqliteEnrollmentRepository::new(&tx);

        let value = match work(&repo) {
            Ok(value) => value,
            Err(err) => {
                // Dropping `tx` rolls back.
                drop(tx);
                return Err(err);
            }
        };

        tx.commit().map_err(|err| {
            warn!("event=tx_commit module=repo status=error error={}", err);
            E::from(RepoError::from(err))
        })?;
        Ok(value)
    }
}

pub(crate) fn parse_classroom_row(row: &Row<'_>) -> RepoResult<Classroom> {
    let classroom = Classroom {
        id: row.get("id")?,
        code: row.get("code")?,
        course_id: row.get("course_id")?,
        period_id: row.get("period_id")?,
        day: parse_day(row.get("day")?)?,
        start_time: parse_clock(row, "start_time")?,
        end_time: parse_clock(row, "end_time")?,
        quota: parse_unsigned(row.get("quota")?, "classrooms.quota")?,
        participants_count: parse_unsigned(
            row.get("participants_count")?,
            "classrooms.participants_count",
        )?,
    };
    // An over-full counter still loads; callers see it as having no open seat.
    classroom
        .validate_slot()
        .map_err(|err| RepoError::InvalidData(format!("classroom {}: {err}", classroom.id)))?;
    Ok(classroom)
}

pub(crate) fn parse_course_row(row: &Row<'_>) -> RepoResult<Course> {
    let course = Course {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        credits: parse_unsigned(row.get("credits")?, "courses.credits")?,
    };
    course
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("course {}: {err}", course.id)))?;
    Ok(course)
}

fn parse_day(value: i64) -> RepoResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|day| *day <= crate::model::classroom::MAX_DAY)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid day `{value}` in classrooms.day")))
}

fn parse_clock(
    row: &Row<'_>,
    column: &'static str,
) -> RepoResult<crate::model::clock::WallClock> {
    let text: String = row.get(column)?;
    text.parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid time `{text}` in classrooms.{column}")))
}

fn parse_unsigned(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}
