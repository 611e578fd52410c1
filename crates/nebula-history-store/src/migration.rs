//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "history schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per instance; rowid order is creation order
        CREATE TABLE instances (
            creation_order INTEGER PRIMARY KEY AUTOINCREMENT,
            instance_id TEXT NOT NULL UNIQUE,
            registration_id TEXT NOT NULL,      -- fixed by the first event
            created_at INTEGER NOT NULL
        );

        -- Append-only history
        CREATE TABLE events (
            instance_id TEXT NOT NULL REFERENCES instances(instance_id),
            seq INTEGER NOT NULL,               -- 1-indexed within the instance
            registration_id TEXT NOT NULL,
            event_type INTEGER NOT NULL,        -- EventType as u16
            payload BLOB NOT NULL,
            recorded_at INTEGER NOT NULL,       -- local time of append (Unix ms)

            PRIMARY KEY (instance_id, seq)
        );

        -- At most one WorkflowScheduled / WorkflowCompleted per instance
        CREATE UNIQUE INDEX idx_events_one_scheduled ON events(instance_id) WHERE event_type = 1;
        CREATE UNIQUE INDEX idx_events_one_completed ON events(instance_id) WHERE event_type = 2;

        CREATE INDEX idx_instances_registration ON instances(registration_id, creation_order);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
