//! SQLite connection management for the bookmark store.
//!
//! Provides the [`Database`] struct that wraps a `rusqlite::Connection`
//! and brings the schema up to date on open.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use super::migrations;

/// Owns the SQLite connection backing a [`SqliteBookmarkTree`](crate::managers::sqlite_tree::SqliteBookmarkTree).
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file at `path` and runs pending migrations.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the file cannot be opened or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        debug!(path = %path.as_ref().display(), "opening bookmark database");
        let conn = Connection::open(path)?;
        let db = Self { conn };
        migrations::run_all(&db.conn)?;
        Ok(db)
    }

    /// Opens a throwaway in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        migrations::run_all(&db.conn)?;
        Ok(db)
    }

    /// `<data dir>/bookmark-sync/bookmarks.db`, or `None` when the platform
    /// has no data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("bookmark-sync").join("bookmarks.db"))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
