//! Schema migrations for the bookmark store.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::types::bookmark::{PermanentFolder, ROOT_NODE_UUID};

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the applied schema version (0 for a fresh database).
pub fn get_schema_version(conn: &Connection) -> Result<i32, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Runs all pending schema migrations. Safe to call on every open.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn)?;

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "Bookmark node table")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "Seed root and permanent folders")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        params![version, Utc::now().timestamp(), description],
    )?;
    Ok(())
}

/// V1: one row per node; `url IS NULL` marks a folder, `position` is the
/// dense child index within the parent. UUIDs are unique per side of the
/// `managed` flag.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS bookmark_nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL,
            parent_id INTEGER,
            position INTEGER NOT NULL DEFAULT 0,
            title TEXT NOT NULL,
            url TEXT,
            permanent_tag TEXT UNIQUE,
            managed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (uuid, managed),
            FOREIGN KEY (parent_id) REFERENCES bookmark_nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_bookmark_nodes_parent ON bookmark_nodes(parent_id, position);
        ",
    )
}

/// V2: the root (parent NULL) and the permanent folders below it.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    let now = Utc::now().timestamp_millis();
    conn.execute(
        "INSERT OR IGNORE INTO bookmark_nodes (uuid, parent_id, position, title, url, permanent_tag, created_at, updated_at)
         VALUES (?1, NULL, 0, '', NULL, NULL, ?2, ?2)",
        params![ROOT_NODE_UUID.to_string(), now],
    )?;
    let root_id: i64 = conn.query_row(
        "SELECT id FROM bookmark_nodes WHERE uuid = ?1",
        params![ROOT_NODE_UUID.to_string()],
        |row| row.get(0),
    )?;
    for (position, folder) in PermanentFolder::ALL.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO bookmark_nodes (uuid, parent_id, position, title, url, permanent_tag, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?6)",
            params![
                folder.uuid().to_string(),
                root_id,
                position as i64,
                folder.default_title(),
                folder.server_tag(),
                now
            ],
        )?;
    }
    Ok(())
}
