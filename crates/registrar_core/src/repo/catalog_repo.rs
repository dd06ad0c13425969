//! Catalog write primitives for periods, courses and classrooms.
//!
//! # Responsibility
//! - Insert catalog rows for seeding and fixtures.
//! - Tombstone catalog rows so lookups stop seeing them.
//! - Count active enrollments for seat-counter audits.
//!
//! # Invariants
//! - New classrooms always start with `participants_count = 0`; the counter
//!   is owned by the enrollment service afterwards.
//! - Writes validate the model policy before touching SQL.

use crate::model::classroom::{Classroom, ClassroomId};
use crate::model::clock::WallClock;
use crate::model::course::{validate_credits, Course, CourseId};
use crate::model::period::{Period, PeriodId};
use crate::repo::enrollment_repo::{parse_classroom_row, parse_course_row, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Input for a new course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub code: String,
    pub name: String,
    pub credits: u32,
}

/// Input for a new classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClassroom {
    pub code: String,
    pub course_id: CourseId,
    pub period_id: PeriodId,
    pub day: u8,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub quota: u32,
}

impl NewClassroom {
    fn as_classroom(&self, id: ClassroomId) -> Classroom {
        Classroom {
            id,
            code: self.code.clone(),
            course_id: self.course_id,
            period_id: self.period_id,
            day: self.day,
            start_time: self.start_time,
            end_time: self.end_time,
            quota: self.quota,
            participants_count: 0,
        }
    }
}

/// Catalog persistence used by seeding, fixtures and audits.
pub trait CatalogRepository {
    fn create_period(&self, code: &str, name: &str) -> RepoResult<Period>;
    fn create_course(&self, course: &NewCourse) -> RepoResult<Course>;
    fn create_classroom(&self, classroom: &NewClassroom) -> RepoResult<Classroom>;
    fn find_period_by_code(&self, code: &str) -> RepoResult<Option<Period>>;
    fn find_course_by_code(&self, code: &str) -> RepoResult<Option<Course>>;
    fn find_classroom_by_code(
        &self,
        code: &str,
        course_id: CourseId,
        period_id: PeriodId,
    ) -> RepoResult<Option<Classroom>>;
    fn soft_delete_period(&self, id: PeriodId) -> RepoResult<()>;
    fn soft_delete_course(&self, id: CourseId) -> RepoResult<()>;
    fn soft_delete_classroom(&self, id: ClassroomId) -> RepoResult<()>;
    /// Counts non-deleted enrollment rows for one classroom.
    fn count_active_enrollments(&self, classroom_id: ClassroomId) -> RepoResult<u32>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn soft_delete(&self, table: &'static str, entity: &'static str, id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET deleted_at = (strftime('%s', 'now') * 1000),
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1
                   AND deleted_at IS NULL;"
            ),
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity, id });
        }
        Ok(())
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_period(&self, code: &str, name: &str) -> RepoResult<Period> {
        self.conn.execute(
            "INSERT INTO periods (code, name) VALUES (?1, ?2);",
            params![code, name],
        )?;
        Ok(Period {
            id: self.conn.last_insert_rowid(),
            code: code.to_string(),
            name: name.to_string(),
        })
    }

    fn create_course(&self, course: &NewCourse) -> RepoResult<Course> {
        validate_credits(course.credits)?;

        self.conn.execute(
            "INSERT INTO courses (code, name, credits) VALUES (?1, ?2, ?3);",
            params![course.code, course.name, i64::from(course.credits)],
        )?;
        Ok(Course {
            id: self.conn.last_insert_rowid(),
            code: course.code.clone(),
            name: course.name.clone(),
            credits: course.credits,
        })
    }

    fn create_classroom(&self, classroom: &NewClassroom) -> RepoResult<Classroom> {
        classroom.as_classroom(0).validate()?;

        self.conn.execute(
            "INSERT INTO classrooms (
                code,
                course_id,
                period_id,
                day,
                start_time,
                end_time,
                quota,
                participants_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0);",
            params![
                classroom.code,
                classroom.course_id,
                classroom.period_id,
                i64::from(classroom.day),
                classroom.start_time.to_string(),
                classroom.end_time.to_string(),
                i64::from(classroom.quota),
            ],
        )?;
        Ok(classroom.as_classroom(self.conn.last_insert_rowid()))
    }

    fn find_period_by_code(&self, code: &str) -> RepoResult<Option<Period>> {
        self.conn
            .query_row(
                "SELECT id, code, name
                 FROM periods
                 WHERE code = ?1
                   AND deleted_at IS NULL;",
                [code],
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

    fn find_course_by_code(&self, code: &str) -> RepoResult<Option<Course>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, name, credits
             FROM courses
             WHERE code = ?1
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query([code])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_course_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_classroom_by_code(
        &self,
        code: &str,
        course_id: CourseId,
        period_id: PeriodId,
    ) -> RepoResult<Option<Classroom>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                code,
                course_id,
                period_id,
                day,
                start_time,
                end_time,
                quota,
                participants_count
             FROM classrooms
             WHERE code = ?1
               AND course_id = ?2
               AND period_id = ?3
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query(params![code, course_id, period_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_classroom_row(row)?)),
            None => Ok(None),
        }
    }

    fn soft_delete_period(&self, id: PeriodId) -> RepoResult<()> {
        self.soft_delete("periods", "period", id)
    }

    fn soft_delete_course(&self, id: CourseId) -> RepoResult<()> {
        self.soft_delete("courses", "course", id)
    }

    fn soft_delete_classroom(&self, id: ClassroomId) -> RepoResult<()> {
        self.soft_delete("classrooms", "classroom", id)
    }

    fn count_active_enrollments(&self, classroom_id: ClassroomId) -> RepoResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM enrollments
             WHERE classroom_id = ?1
               AND deleted_at IS NULL;",
            [classroom_id],
            |row| row.get(0),
        )?;
        u32::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("invalid enrollment count `{count}`")))
    }
}
