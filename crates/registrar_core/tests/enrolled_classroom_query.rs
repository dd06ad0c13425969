mod common;

use common::{classroom, enroll, period};
use registrar_core::{
    open_db_in_memory, CatalogRepository, Caller, EnrollmentQueryService, ListQuery, NewCourse,
    QueryServiceError, SortDirection, SqliteCatalogRepository,
};
use rusqlite::Connection;

struct Catalog {
    conn: Connection,
    period_id: i64,
    algorithms_a: i64,
    algorithms_b: i64,
    databases_a: i64,
}

fn catalog() -> Catalog {
    let conn = open_db_in_memory().unwrap();
    let period_id = period(&conn, "20241");
    let other_period = period(&conn, "20232");
    let repo = SqliteCatalogRepository::new(&conn);
    let algorithms = repo
        .create_course(&NewCourse {
            code: "CS201".to_string(),
            name: "Algorithms".to_string(),
            credits: 3,
        })
        .unwrap()
        .id;
    let databases = repo
        .create_course(&NewCourse {
            code: "CS301".to_string(),
            name: "Databases".to_string(),
            credits: 4,
        })
        .unwrap()
        .id;

    let algorithms_a = classroom(&conn, "A", algorithms, period_id, (1, "08:00", "10:00"), 3);
    let algorithms_b = classroom(&conn, "B", algorithms, period_id, (2, "08:00", "10:00"), 3);
    let databases_a = classroom(&conn, "A", databases, period_id, (3, "13:00", "15:00"), 3);
    classroom(&conn, "Z", databases, other_period, (4, "13:00", "15:00"), 3);

    enroll(&conn, 1, algorithms_b, period_id).unwrap();
    enroll(&conn, 2, algorithms_b, period_id).unwrap();
    enroll(&conn, 1, databases_a, period_id).unwrap();

    Catalog {
        conn,
        period_id,
        algorithms_a,
        algorithms_b,
        databases_a,
    }
}

#[test]
fn admin_lists_projection_rows_ordered_by_classroom_id() {
    let catalog = catalog();
    let service = EnrollmentQueryService::new(&catalog.conn);

    let page = service
        .list(&Caller::admin(99), &ListQuery::default())
        .unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.docs.len(), 4);
    assert!(!page.has_next_page && !page.has_prev_page);
    let ids = page.docs.iter().map(|doc| doc.classroom_id).collect::<Vec<_>>();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);

    let row = page
        .docs
        .iter()
        .find(|doc| doc.classroom_id == catalog.algorithms_b)
        .unwrap();
    assert_eq!(row.period, "20241");
    assert_eq!(row.period_name, "Period 20241");
    assert_eq!(row.classroom_code, "B");
    assert_eq!(row.course_name, "Algorithms");
    assert_eq!(row.day, 2);
    assert_eq!(row.start_time.to_string(), "08:00:00");
    assert_eq!(row.participants_count, 2);
    assert_eq!(row.quota, 3);
}

#[test]
fn students_cannot_list() {
    let catalog = catalog();
    let err = EnrollmentQueryService::new(&catalog.conn)
        .list(&Caller::student(1), &ListQuery::default())
        .unwrap_err();

    assert!(matches!(err, QueryServiceError::Forbidden { .. }));
    assert_eq!(err.status_code(), 403);
}

#[test]
fn search_is_case_insensitive_over_period_course_and_code() {
    let catalog = catalog();
    let service = EnrollmentQueryService::new(&catalog.conn);
    let admin = Caller::admin(99);

    let by_course = service
        .list(&admin, &ListQuery::default().with_search("aLgOrIthm"))
        .unwrap();
    assert_eq!(by_course.total, 2);
    assert!(by_course.docs.iter().all(|doc| doc.course_name == "Algorithms"));

    let by_period = service
        .list(&admin, &ListQuery::default().with_search("2023"))
        .unwrap();
    assert_eq!(by_period.total, 1);
    assert_eq!(by_period.docs[0].classroom_code, "Z");

    let wildcard = service
        .list(&admin, &ListQuery::default().with_search("%"))
        .unwrap();
    assert_eq!(wildcard.total, 0);
}

#[test]
fn filters_use_whitelisted_columns_and_ignore_unknown_keys() {
    let catalog = catalog();
    let service = EnrollmentQueryService::new(&catalog.conn);
    let admin = Caller::admin(99);

    let query = ListQuery::from_query_pairs([
        ("filter_classroom_code", "A".to_string()),
        ("filter_period_id", catalog.period_id.to_string()),
        ("filter_password", "hunter2".to_string()),
    ]);
    let page = service.list(&admin, &query).unwrap();

    let ids = page.docs.iter().map(|doc| doc.classroom_id).collect::<Vec<_>>();
    assert_eq!(ids, vec![catalog.algorithms_a, catalog.databases_a]);

    let err = service
        .list(&admin, &ListQuery::default().with_filter("quota", "three"))
        .unwrap_err();
    assert!(matches!(err, QueryServiceError::InvalidFilter { .. }));
}

#[test]
fn sort_applies_direction_with_classroom_id_tie_breaker() {
    let catalog = catalog();
    let service = EnrollmentQueryService::new(&catalog.conn);

    let page = service
        .list(
            &Caller::admin(99),
            &ListQuery::default()
                .with_sort("participants_count", SortDirection::Desc)
                .with_sort("unknown_column", SortDirection::Asc),
        )
        .unwrap();

    let counts = page
        .docs
        .iter()
        .map(|doc| doc.participants_count)
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![2, 1, 0, 0]);
    assert!(page.docs[2].classroom_id < page.docs[3].classroom_id);
}

#[test]
fn pagination_reports_neighbour_pages() {
    let catalog = catalog();
    let service = EnrollmentQueryService::new(&catalog.conn);
    let admin = Caller::admin(99);

    let first = service
        .list(&admin, &ListQuery::default().with_page(1, 3))
        .unwrap();
    assert_eq!(first.docs.len(), 3);
    assert_eq!(first.total, 4);
    assert_eq!((first.has_prev_page, first.has_next_page), (false, true));
    assert_eq!(first.next_page, Some(2));

    let second = service
        .list(&admin, &ListQuery::from_query_pairs([("page", "2"), ("limit", "3")]))
        .unwrap();
    assert_eq!(second.docs.len(), 1);
    assert_eq!((second.has_prev_page, second.has_next_page), (true, false));
    assert_eq!(second.prev_page, Some(1));
    assert_eq!(second.next_page, None);
    assert!(first
        .docs
        .iter()
        .all(|doc| doc.classroom_id != second.docs[0].classroom_id));
}

#[test]
fn soft_deleted_catalog_rows_are_hidden() {
    let catalog = catalog();
    let repo = SqliteCatalogRepository::new(&catalog.conn);
    repo.soft_delete_classroom(catalog.algorithms_a).unwrap();
    let service = EnrollmentQueryService::new(&catalog.conn);

    let page = service
        .list(&Caller::admin(99), &ListQuery::default())
        .unwrap();
    assert_eq!(page.total, 3);
    assert!(page
        .docs
        .iter()
        .all(|doc| doc.classroom_id != catalog.algorithms_a));

    let databases = repo.find_course_by_code("CS301").unwrap().unwrap();
    repo.soft_delete_course(databases.id).unwrap();
    let page = service
        .list(&Caller::admin(99), &ListQuery::default())
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.docs[0].classroom_id, catalog.algorithms_b);
}
