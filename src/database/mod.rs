//! Database layer — a shared SQLite handle with its schema applied on open.
//!
//! [`Database`] is constructed once at startup and shared behind an [`Arc`]
//! by every component that needs storage. The underlying [`Connection`] is
//! guarded by a [`Mutex`], so callers may use the handle from any thread.
//!
//! [`Arc`]: std::sync::Arc

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::{debug, info};

/// Schema for the user table.
///
/// `CREATE TABLE IF NOT EXISTS` makes re-applying it on every start a no-op.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY,
    password TEXT,
    name TEXT,
    age INTEGER
);
"#;

/// Shared SQLite connection with the user schema in place.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file at `path` and applies [`SCHEMA`].
    ///
    /// # Errors
    ///
    /// Returns the underlying [`rusqlite::Error`] if the file cannot be opened
    /// or the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "database opened");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database. Every call yields an empty, independent store.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Applies [`SCHEMA`]. Safe to call any number of times.
    pub fn run_migrations(&self) -> Result<(), rusqlite::Error> {
        self.conn.lock().execute_batch(SCHEMA)?;
        debug!("schema applied");
        Ok(())
    }

    /// Locks and returns the connection for the duration of the guard.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
