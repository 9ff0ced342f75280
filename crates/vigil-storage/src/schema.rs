//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < SCHEMA_VERSION {
        info!(
            "Running migrations from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        if current_version < 2 {
            migrate_v2(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Migrations complete");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: counter, timestamp, review-flag, and escalation
/// tables.
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Applying migration v1: Initial schema");

    // Per-user aggregate flags and review state.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_flags (
            user_id TEXT PRIMARY KEY,
            total_flags_30d INTEGER NOT NULL DEFAULT 0,
            last_flag_at TEXT,
            flagged_for_review INTEGER NOT NULL DEFAULT 0,
            flag_timestamp TEXT,
            flag_categories TEXT NOT NULL DEFAULT '[]',
            review_priority TEXT
        )",
        [],
    )?;

    // Rolling per-category hit counters. Incremented in place, never
    // read-modify-written.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_counters (
            user_id TEXT NOT NULL,
            category TEXT NOT NULL,
            hits_30d INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, category)
        )",
        [],
    )?;

    // One row per hit; the sweeper deletes rows older than the window.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_timestamps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            category TEXT NOT NULL,
            ts TEXT NOT NULL
        )",
        [],
    )?;

    // Write-once escalation records. Content-free: length only.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS escalations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            categories TEXT NOT NULL,
            severity TEXT NOT NULL,
            content_length INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_escalations_user ON escalations (user_id)",
        [],
    )?;

    Ok(())
}

/// Migration to version 2: covering index for the sweeper's cutoff scans.
fn migrate_v2(conn: &Connection) -> Result<()> {
    info!("Applying migration v2: timestamp cutoff index");

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_timestamps_cutoff
         ON category_timestamps (user_id, category, ts)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_run_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn expected_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "user_flags",
            "category_counters",
            "category_timestamps",
            "escalations",
        ] {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {table}");
        }
    }
}
