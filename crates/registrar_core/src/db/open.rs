//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory connections.
//! - Apply pragmas and the lock-wait bound configured for the process.
//! - Run migrations before handing the connection out.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::StorageConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Lock-wait bound used when no configuration is supplied.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a database file with the default lock timeout.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_file(path.as_ref(), DEFAULT_LOCK_TIMEOUT)
}

/// Opens the database file named by `config.database_path`.
///
/// # Side effects
/// - Emits `db_open` events with mode, duration and outcome.
pub fn open_db_with(config: &StorageConfig) -> DbResult<Connection> {
    open_file(&config.database_path, config.lock_timeout())
}

/// Opens a private in-memory database, mainly for tests.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let conn = Connection::open_in_memory().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode=memory error_code=db_open_failed error={}",
            err
        );
        err
    })?;
    finish_open(conn, DEFAULT_LOCK_TIMEOUT, "memory", started_at)
}

fn open_file(path: &Path, lock_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file path={}",
        path.display()
    );

    let conn = Connection::open(path).map_err(|err| {
        error!(
            "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
        err
    })?;
    finish_open(conn, lock_timeout, "file", started_at)
}

fn finish_open(
    mut conn: Connection,
    lock_timeout: Duration,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    match bootstrap_connection(&mut conn, lock_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} lock_timeout_ms={} duration_ms={}",
                mode,
                lock_timeout.as_millis(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, lock_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(lock_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
