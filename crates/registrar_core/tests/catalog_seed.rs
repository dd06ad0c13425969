use registrar_core::{
    open_db_in_memory, seed_catalog, CatalogRepository, CatalogSeed, SeedError,
    SqliteCatalogRepository,
};
use rusqlite::Connection;
use serde_json::json;

fn catalog_json() -> serde_json::Value {
    json!({
        "periods": [
            { "code": "20241", "name": "Odd Semester 2024" },
            { "code": "20242", "name": "Even Semester 2024" }
        ],
        "courses": [
            { "code": "CS101", "name": "Programming Basics", "credits": 3 },
            { "code": "CS201", "name": "Data Structures", "credits": 4 }
        ],
        "classrooms": [
            {
                "code": "A",
                "course_code": "CS101",
                "period_code": "20241",
                "day": 1,
                "start_time": "08:00",
                "end_time": "10:30",
                "quota": 40
            },
            {
                "code": "B",
                "course_code": "CS201",
                "period_code": "20241",
                "day": 3,
                "start_time": "13:00:00",
                "end_time": "15:00:00",
                "quota": 35
            }
        ]
    })
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn seed_inserts_catalog_and_resolves_codes() {
    let conn = open_db_in_memory().unwrap();
    let seed: CatalogSeed = serde_json::from_value(catalog_json()).unwrap();

    let report = seed_catalog(&conn, &seed).unwrap();

    assert_eq!(report.inserted(), 6);
    assert_eq!(report.skipped(), 0);
    let repo = SqliteCatalogRepository::new(&conn);
    let period = repo.find_period_by_code("20241").unwrap().unwrap();
    let course = repo.find_course_by_code("CS101").unwrap().unwrap();
    let classroom = repo
        .find_classroom_by_code("A", course.id, period.id)
        .unwrap()
        .unwrap();
    assert_eq!(classroom.quota, 40);
    assert_eq!(classroom.participants_count, 0);
    assert_eq!(classroom.end_time.to_string(), "10:30:00");
}

#[test]
fn seeding_twice_is_a_noop() {
    let conn = open_db_in_memory().unwrap();
    let seed: CatalogSeed = serde_json::from_value(catalog_json()).unwrap();
    seed_catalog(&conn, &seed).unwrap();

    let second = seed_catalog(&conn, &seed).unwrap();

    assert_eq!(second.inserted(), 0);
    assert_eq!(second.skipped(), 6);
    assert_eq!(count(&conn, "classrooms"), 2);
}

#[test]
fn tombstoned_codes_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::new(&conn);
    let retired = repo.create_period("20242", "Retired").unwrap();
    repo.soft_delete_period(retired.id).unwrap();
    let seed = CatalogSeed {
        classrooms: Vec::new(),
        ..serde_json::from_value(catalog_json()).unwrap()
    };

    let report = seed_catalog(&conn, &seed).unwrap();

    assert_eq!(report.periods.inserted, 1);
    assert_eq!(report.periods.skipped, 1);
    assert_eq!(count(&conn, "periods"), 2);
}

#[test]
fn unknown_reference_rolls_back_the_whole_seed() {
    let conn = open_db_in_memory().unwrap();
    let mut raw = catalog_json();
    raw["classrooms"][1]["course_code"] = json!("CS999");
    let seed: CatalogSeed = serde_json::from_value(raw).unwrap();

    let err = seed_catalog(&conn, &seed).unwrap_err();

    assert!(matches!(err, SeedError::UnknownCourse(code) if code == "CS999"));
    assert_eq!(count(&conn, "periods"), 0);
    assert_eq!(count(&conn, "courses"), 0);
    assert_eq!(count(&conn, "classrooms"), 0);
}

#[test]
fn invalid_course_credits_fail_validation() {
    let conn = open_db_in_memory().unwrap();
    let seed = CatalogSeed::from_json_str(
        r#"{ "courses": [ { "code": "BIG", "name": "Too Big", "credits": 11 } ] }"#,
    )
    .unwrap();

    let err = seed_catalog(&conn, &seed).unwrap_err();
    assert!(matches!(err, SeedError::Repo(_)));
    assert_eq!(count(&conn, "courses"), 0);
}

#[test]
fn seed_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, serde_json::to_string_pretty(&catalog_json()).unwrap()).unwrap();

    let seed = CatalogSeed::load(&path).unwrap();
    assert_eq!(seed.periods.len(), 2);
    assert_eq!(seed.classrooms[1].start_time.to_string(), "13:00:00");

    assert!(matches!(
        CatalogSeed::load(dir.path().join("missing.json")),
        Err(SeedError::Io(_))
    ));
    assert!(matches!(
        CatalogSeed::from_json_str("{ not json"),
        Err(SeedError::Parse(_))
    ));
}
