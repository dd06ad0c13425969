//! Catalog seeding for periods, courses and classrooms.
//!
//! # Responsibility
//! - Load a catalog description from JSON.
//! - Insert it in one transaction, skipping rows that already exist.
//!
//! # Invariants
//! - Seeding is repeatable: a second run with the same input inserts nothing.
//! - A row whose unique code is already taken counts as skipped. No other
//!   error is swallowed; any failure rolls the whole seed back.

use crate::db::DbError;
use crate::model::clock::WallClock;
use crate::repo::catalog_repo::{
    CatalogRepository, NewClassroom, NewCourse, SqliteCatalogRepository,
};
use crate::repo::enrollment_repo::{RepoError, RepoResult};
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSeed {
    pub code: String,
    pub name: String,
}

/// Classroom entry. Course and period are referenced by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomSeed {
    pub code: String,
    pub course_code: String,
    pub period_code: String,
    pub day: u8,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub quota: u32,
}

/// Catalog description accepted by [`seed_catalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub periods: Vec<PeriodSeed>,
    pub courses: Vec<NewCourse>,
    pub classrooms: Vec<ClassroomSeed>,
}

impl CatalogSeed {
    pub fn from_json_str(raw: &str) -> Result<Self, SeedError> {
        serde_json::from_str(raw).map_err(SeedError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(SeedError::Io)?;
        Self::from_json_str(&raw)
    }
}

/// Per-table inserted/skipped counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCounts {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub periods: SeedCounts,
    pub courses: SeedCounts,
    pub classrooms: SeedCounts,
}

impl SeedReport {
    pub fn inserted(&self) -> usize {
        self.periods.inserted + self.courses.inserted + self.classrooms.inserted
    }

    pub fn skipped(&self) -> usize {
        self.periods.skipped + self.courses.skipped + self.classrooms.skipped
    }
}

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Classroom references a course code that is neither seeded nor stored.
    UnknownCourse(String),
    /// Classroom references a period code that is neither seeded nor stored.
    UnknownPeriod(String),
    Repo(RepoError),
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read seed file: {err}"),
            Self::Parse(err) => write!(f, "failed to parse seed file: {err}"),
            Self::UnknownCourse(code) => write!(f, "seed references unknown course `{code}`"),
            Self::UnknownPeriod(code) => write!(f, "seed references unknown period `{code}`"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SeedError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for SeedError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<DbError> for SeedError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Inserts the described catalog.
///
/// Existing rows (same period/course code, or same classroom code within the
/// same course and period) are left untouched and reported as skipped.
pub fn seed_catalog(conn: &Connection, seed: &CatalogSeed) -> Result<SeedReport, SeedError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let repo = SqliteCatalogRepository::new(&tx);
    let mut report = SeedReport::default();

    let mut period_ids = HashMap::new();
    for period in &seed.periods {
        let id = match repo.find_period_by_code(&period.code)? {
            Some(existing) => {
                report.periods.skipped += 1;
                Some(existing.id)
            }
            None => insert_or_skip(
                repo.create_period(&period.code, &period.name).map(|p| p.id),
                &mut report.periods,
            )?,
        };
        if let Some(id) = id {
            period_ids.insert(period.code.clone(), id);
        }
    }

    let mut course_ids = HashMap::new();
    for course in &seed.courses {
        let id = match repo.find_course_by_code(&course.code)? {
            Some(existing) => {
                report.courses.skipped += 1;
                Some(existing.id)
            }
            None => insert_or_skip(
                repo.create_course(course).map(|c| c.id),
                &mut report.courses,
            )?,
        };
        if let Some(id) = id {
            course_ids.insert(course.code.clone(), id);
        }
    }

    for classroom in &seed.classrooms {
        let course_id = match course_ids.get(&classroom.course_code) {
            Some(id) => *id,
            None => repo
                .find_course_by_code(&classroom.course_code)?
                .map(|course| course.id)
                .ok_or_else(|| SeedError::UnknownCourse(classroom.course_code.clone()))?,
        };
        let period_id = match period_ids.get(&classroom.period_code) {
            Some(id) => *id,
            None => repo
                .find_period_by_code(&classroom.period_code)?
                .map(|period| period.id)
                .ok_or_else(|| SeedError::UnknownPeriod(classroom.period_code.clone()))?,
        };

        if repo
            .find_classroom_by_code(&classroom.code, course_id, period_id)?
            .is_some()
        {
            report.classrooms.skipped += 1;
            continue;
        }

        let new_classroom = NewClassroom {
            code: classroom.code.clone(),
            course_id,
            period_id,
            day: classroom.day,
            start_time: classroom.start_time,
            end_time: classroom.end_time,
            quota: classroom.quota,
        };
        insert_or_skip(
            repo.create_classroom(&new_classroom).map(|c| c.id),
            &mut report.classrooms,
        )?;
    }

    tx.commit()?;

    info!(
        "event=catalog_seed module=seed status=ok inserted={} skipped={}",
        report.inserted(),
        report.skipped()
    );
    Ok(report)
}

/// Counts an insert outcome. A unique conflict (e.g. a tombstoned row still
/// holding the code) is the one tolerated failure.
fn insert_or_skip(result: RepoResult<i64>, counts: &mut SeedCounts) -> Result<Option<i64>, SeedError> {
    match result {
        Ok(id) => {
            counts.inserted += 1;
            Ok(Some(id))
        }
        Err(RepoError::Conflict(_)) => {
            counts.skipped += 1;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
