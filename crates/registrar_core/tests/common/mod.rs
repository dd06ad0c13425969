#![allow(dead_code)]

use registrar_core::{
    CatalogRepository, Caller, ClassroomId, ClassroomView, CourseId, EnrollmentError,
    EnrollmentRequest, EnrollmentService, NewClassroom, NewCourse, PeriodId,
    SqliteCatalogRepository, SqliteEnrollmentStore, WallClock,
};
use rusqlite::Connection;

pub fn at(value: &str) -> WallClock {
    value.parse().unwrap()
}

pub fn period(conn: &Connection, code: &str) -> PeriodId {
    SqliteCatalogRepository::new(conn)
        .create_period(code, &format!("Period {code}"))
        .unwrap()
        .id
}

pub fn course(conn: &Connection, code: &str, credits: u32) -> CourseId {
    SqliteCatalogRepository::new(conn)
        .create_course(&NewCourse {
            code: code.to_string(),
            name: format!("Course {code}"),
            credits,
        })
        .unwrap()
        .id
}

/// Creates a classroom with a `day start-end` slot, e.g. `(1, "08:00", "10:00")`.
pub fn classroom(
    conn: &Connection,
    code: &str,
    course_id: CourseId,
    period_id: PeriodId,
    slot: (u8, &str, &str),
    quota: u32,
) -> ClassroomId {
    SqliteCatalogRepository::new(conn)
        .create_classroom(&NewClassroom {
            code: code.to_string(),
            course_id,
            period_id,
            day: slot.0,
            start_time: at(slot.1),
            end_time: at(slot.2),
            quota,
        })
        .unwrap()
        .id
}

pub fn enroll(
    conn: &Connection,
    student: i64,
    classroom_id: ClassroomId,
    period_id: PeriodId,
) -> Result<ClassroomView, EnrollmentError> {
    EnrollmentService::new(SqliteEnrollmentStore::new(conn)).enroll(
        &Caller::student(student),
        &EnrollmentRequest {
            classroom_id,
            period_id,
        },
    )
}

pub fn participants_count(conn: &Connection, classroom_id: ClassroomId) -> u32 {
    conn.query_row(
        "SELECT participants_count FROM classrooms WHERE id = ?1;",
        [classroom_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn active_enrollments(conn: &Connection, classroom_id: ClassroomId) -> u32 {
    SqliteCatalogRepository::new(conn)
        .count_active_enrollments(classroom_id)
        .unwrap()
}

pub fn enrollment_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM enrollments;", [], |row| row.get(0))
        .unwrap()
}
