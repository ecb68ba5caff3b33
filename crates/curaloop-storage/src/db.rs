//! SQLite connection holder for the session store.
//!
//! One connection behind a `Mutex`. File databases run in WAL mode with a
//! busy timeout; both kinds are migrated to the latest schema on open.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use curaloop_core::error::CuraloopError;

use crate::migrations;

/// How long a writer waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn open_err(what: &str) -> impl Fn(rusqlite::Error) -> CuraloopError + '_ {
    move |e| CuraloopError::Storage(format!("{}: {}", what, e))
}

/// Migrated SQLite database shared by the store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file at `path`, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, CuraloopError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(open_err("Failed to open database"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(open_err("Failed to set busy timeout"))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(open_err("Failed to set pragmas"))?;

        let db = Self::migrated(conn)?;
        info!(path = %path.display(), "Session database opened");
        Ok(db)
    }

    /// Private in-memory database, gone when dropped.
    pub fn in_memory() -> Result<Self, CuraloopError> {
        let conn =
            Connection::open_in_memory().map_err(open_err("Failed to open in-memory database"))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, CuraloopError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CuraloopError>
    where
        F: FnOnce(&Connection) -> Result<T, CuraloopError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CuraloopError::Storage("database lock poisoned".to_string()))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(|e| CuraloopError::Storage(e.to_string()))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::new(&path).unwrap();

        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM chatbots", [], |row| row.get(0))
                .map_err(|e| CuraloopError::Storage(e.to_string()))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| CuraloopError::Storage(e.to_string()))?;
            assert_eq!(mode, "wal");
            Ok(())
        })
        .unwrap();
    }
}
