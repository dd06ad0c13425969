//! Enrolled-classroom listing for administrators.
//!
//! # Responsibility
//! - Project classrooms joined with their period and course into flat rows.
//! - Apply search, equality filters, sorting and offset pagination.
//!
//! # Invariants
//! - Read-only; no locks are taken and no transaction is opened.
//! - Soft-deleted classrooms, courses and periods never appear.
//! - Filter and sort keys are checked against a fixed column whitelist;
//!   unknown keys are ignored and never reach SQL text.
//! - Ordering is deterministic: `classroom_id ASC` breaks every tie.

use crate::db::DbError;
use crate::model::classroom::ClassroomId;
use crate::model::clock::WallClock;
use crate::model::identity::{Caller, Role};
use crate::model::period::PeriodId;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

const FILTER_PREFIX: &str = "filter_";
const SORT_PREFIX: &str = "sort_";

const PROJECTION_SQL: &str = "WITH enrolled_classrooms AS (
    SELECT
        c.id AS classroom_id,
        c.period_id AS period_id,
        p.code AS period,
        p.name AS period_name,
        c.code AS classroom_code,
        cr.name AS course_name,
        c.day AS day,
        c.start_time AS start_time,
        c.end_time AS end_time,
        c.quota AS quota,
        c.participants_count AS participants_count
    FROM classrooms c
    JOIN periods p ON p.id = c.period_id AND p.deleted_at IS NULL
    JOIN courses cr ON cr.id = c.course_id AND cr.deleted_at IS NULL
    WHERE c.deleted_at IS NULL
)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Text,
}

const COLUMNS: &[(&str, ColumnKind)] = &[
    ("classroom_id", ColumnKind::Integer),
    ("period_id", ColumnKind::Integer),
    ("period", ColumnKind::Text),
    ("period_name", ColumnKind::Text),
    ("classroom_code", ColumnKind::Text),
    ("course_name", ColumnKind::Text),
    ("day", ColumnKind::Integer),
    ("start_time", ColumnKind::Text),
    ("end_time", ColumnKind::Text),
    ("quota", ColumnKind::Integer),
    ("participants_count", ColumnKind::Integer),
];

const SEARCH_COLUMNS: &[&str] = &["period", "course_name", "classroom_code"];

fn column_kind(name: &str) -> Option<ColumnKind> {
    COLUMNS
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, kind)| *kind)
}

/// Result type for listing APIs.
pub type QueryResult<T> = Result<T, QueryServiceError>;

#[derive(Debug)]
pub enum QueryServiceError {
    /// Caller role may not list enrollments.
    Forbidden { role: Role },
    /// Filter value does not fit the column type.
    InvalidFilter { column: String, value: String },
    Db(DbError),
    /// Projection row cannot be decoded.
    InvalidData(String),
}

impl QueryServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden { .. } => 403,
            Self::InvalidFilter { .. } => 422,
            Self::Db(_) | Self::InvalidData(_) => 500,
        }
    }
}

impl Display for QueryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden { role } => {
                write!(f, "role `{role}` is not allowed to list enrolled classrooms")
            }
            Self::InvalidFilter { column, value } => {
                write!(f, "invalid filter value `{value}` for `{column}`")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid listing row: {message}"),
        }
    }
}

impl Error for QueryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for QueryServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Listing options. Keys outside the projection whitelist are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    /// Equality filters, applied in insertion order.
    pub filters: Vec<(String, String)>,
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortDirection)>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            filters: Vec::new(),
            sort: Vec::new(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListQuery {
    /// Builds options from raw query-string pairs.
    ///
    /// Recognized keys: `search`, `page`, `limit`, `filter_<column>` and
    /// `sort_<column>` (`asc`, anything else sorts descending). Non-positive
    /// or unparsable `page`/`limit` fall back to defaults.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if let Some(column) = key.strip_prefix(FILTER_PREFIX) {
                query.filters.push((column.to_string(), value.to_string()));
            } else if let Some(column) = key.strip_prefix(SORT_PREFIX) {
                let direction = if value.trim().eq_ignore_ascii_case("asc") {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                };
                query.sort.push((column.to_string(), direction));
            } else {
                match key {
                    "search" => query.search = Some(value.to_string()),
                    "page" => query.page = parse_positive(value).unwrap_or(DEFAULT_PAGE),
                    "limit" => query.limit = parse_positive(value).unwrap_or(DEFAULT_LIMIT),
                    _ => {}
                }
            }
        }
        query
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((column.into(), direction));
        self
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = page.max(1);
        self.limit = limit.max(1);
        self
    }
}

fn parse_positive(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|number| *number > 0)
}

/// One listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledClassroomView {
    pub classroom_id: ClassroomId,
    pub period_id: PeriodId,
    pub period: String,
    pub period_name: String,
    pub classroom_code: String,
    pub course_name: String,
    pub day: u8,
    pub start_time: WallClock,
    pub end_time: WallClock,
    pub quota: u32,
    pub participants_count: u32,
}

/// Offset-paginated response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

impl<T> Page<T> {
    fn new(docs: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let has_prev_page = page > 1;
        let has_next_page = u64::from(page) * u64::from(limit) < total;
        Self {
            docs,
            total,
            page,
            limit,
            has_prev_page,
            has_next_page,
            next_page: has_next_page.then(|| page + 1),
            prev_page: has_prev_page.then(|| page - 1),
        }
    }
}

/// Read-only listing service bound to one connection.
pub struct EnrollmentQueryService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> EnrollmentQueryService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Lists classrooms with their enrollment counters. Admin only.
    pub fn list(
        &self,
        caller: &Caller,
        query: &ListQuery,
    ) -> QueryResult<Page<EnrolledClassroomView>> {
        if caller.role != Role::Admin {
            return Err(QueryServiceError::Forbidden { role: caller.role });
        }

        let page = query.page.max(1);
        let limit = query.limit.max(1);
        let (where_sql, mut bind_values) = build_where_clause(query)?;

        let count_sql = format!(
            "{PROJECTION_SQL}
             SELECT COUNT(*) FROM enrolled_classrooms e{where_sql};"
        );
        let total: i64 = self.conn.query_row(
            &count_sql,
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total)
            .map_err(|_| QueryServiceError::InvalidData(format!("invalid total `{total}`")))?;

        let list_sql = format!(
            "{PROJECTION_SQL}
             SELECT * FROM enrolled_classrooms e{where_sql}{order_sql}
             LIMIT ? OFFSET ?;",
            order_sql = build_order_clause(query)
        );
        let offset = i64::from(page - 1) * i64::from(limit);
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&list_sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
            docs.push(parse_listing_row(row)?);
        }

        Ok(Page::new(docs, total, page, limit))
    }
}

fn build_where_clause(query: &ListQuery) -> QueryResult<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut bind_values = Vec::new();

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        let matches = SEARCH_COLUMNS
            .iter()
            .map(|column| format!("e.{column} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        clauses.push(format!("({matches})"));
        for _ in SEARCH_COLUMNS {
            bind_values.push(Value::Text(pattern.clone()));
        }
    }

    for (column, value) in &query.filters {
        let Some(kind) = column_kind(column) else {
            continue;
        };
        let bound = match kind {
            ColumnKind::Text => Value::Text(value.clone()),
            ColumnKind::Integer => value
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| QueryServiceError::InvalidFilter {
                    column: column.clone(),
                    value: value.clone(),
                })?,
        };
        clauses.push(format!("e.{column} = ?"));
        bind_values.push(bound);
    }

    if clauses.is_empty() {
        return Ok((String::new(), bind_values));
    }
    Ok((format!(" WHERE {}", clauses.join(" AND ")), bind_values))
}

fn build_order_clause(query: &ListQuery) -> String {
    let mut terms = Vec::new();
    let mut has_tie_breaker = false;
    for (column, direction) in &query.sort {
        if column_kind(column).is_none() {
            continue;
        }
        if terms.iter().any(|term: &String| term.starts_with(&format!("e.{column} "))) {
            continue;
        }
        has_tie_breaker |= column == "classroom_id";
        terms.push(format!("e.{column} {}", direction.as_sql()));
    }
    if !has_tie_breaker {
        terms.push("e.classroom_id ASC".to_string());
    }
    format!(" ORDER BY {}", terms.join(", "))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_listing_row(row: &Row<'_>) -> QueryResult<EnrolledClassroomView> {
    let day: i64 = row.get("day")?;
    let quota: i64 = row.get("quota")?;
    let participants_count: i64 = row.get("participants_count")?;
    let clock = |column: &str| -> QueryResult<WallClock> {
        let text: String = row.get(column)?;
        text.parse()
            .map_err(|_| QueryServiceError::InvalidData(format!("invalid {column} `{text}`")))
    };
    let unsigned = |value: i64, column: &str| -> QueryResult<u32> {
        u32::try_from(value)
            .map_err(|_| QueryServiceError::InvalidData(format!("invalid {column} `{value}`")))
    };

    Ok(EnrolledClassroomView {
        classroom_id: row.get("classroom_id")?,
        period_id: row.get("period_id")?,
        period: row.get("period")?,
        period_name: row.get("period_name")?,
        classroom_code: row.get("classroom_code")?,
        course_name: row.get("course_name")?,
        day: u8::try_from(day)
            .map_err(|_| QueryServiceError::InvalidData(format!("invalid day `{day}`")))?,
        start_time: clock("start_time")?,
        end_time: clock("end_time")?,
        quota: unsigned(quota, "quota")?,
        participants_count: unsigned(participants_count, "participants_count")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{build_order_clause, escape_like, ListQuery, Page, SortDirection};

    #[test]
    fn query_pairs_map_to_filters_sort_and_paging() {
        let query = ListQuery::from_query_pairs([
            ("filter_period", "2024-1"),
            ("sort_course_name", "asc"),
            ("sort_quota", "DESC"),
            ("page", "3"),
            ("limit", "0"),
            ("search", "algo"),
            ("unrelated", "x"),
        ]);

        assert_eq!(query.filters, vec![("period".to_string(), "2024-1".to_string())]);
        assert_eq!(
            query.sort,
            vec![
                ("course_name".to_string(), SortDirection::Asc),
                ("quota".to_string(), SortDirection::Desc),
            ]
        );
        assert_eq!(query.page, 3);
        assert_eq!(query.limit, 10);
        assert_eq!(query.search.as_deref(), Some("algo"));
    }

    #[test]
    fn order_clause_drops_unknown_columns_and_appends_tie_breaker() {
        let query = ListQuery::default()
            .with_sort("participants_count", SortDirection::Desc)
            .with_sort("password; DROP TABLE x", SortDirection::Asc);
        assert_eq!(
            build_order_clause(&query),
            " ORDER BY e.participants_count DESC, e.classroom_id ASC"
        );
    }

    #[test]
    fn explicit_classroom_id_sort_replaces_tie_breaker() {
        let query = ListQuery::default().with_sort("classroom_id", SortDirection::Desc);
        assert_eq!(build_order_clause(&query), " ORDER BY e.classroom_id DESC");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn page_envelope_computes_neighbours() {
        let middle = Page::new(vec![(); 2], 7, 2, 2);
        assert!(middle.has_prev_page && middle.has_next_page);
        assert_eq!((middle.prev_page, middle.next_page), (Some(1), Some(3)));

        let last = Page::new(vec![(); 1], 7, 4, 2);
        assert!(!last.has_next_page);
        assert_eq!(last.next_page, None);

        let empty = Page::<()>::new(Vec::new(), 0, 1, 10);
        assert!(!empty.has_prev_page && !empty.has_next_page);
    }
}
