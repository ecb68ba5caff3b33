//! Database schema migrations.
//!
//! Applies the initial schema: the sessions and chatbots tables plus the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use curaloop_core::error::CuraloopError;

/// Run all pending database migrations.
///
/// Future migrations can be added by checking the current version and
/// applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), CuraloopError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CuraloopError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CuraloopError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Session and chatbot bodies are stored as JSON; the indexed columns are
/// copies used for lookups and ordering.
fn apply_v1(conn: &Connection) -> Result<(), CuraloopError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id              TEXT PRIMARY KEY NOT NULL,
            patient_id      TEXT NOT NULL,
            chat_type       TEXT NOT NULL
                            CHECK (chat_type IN ('daily_check_in', 'treatment_progress',
                                                 'cognitive_engagement', 'crisis_support')),
            status          TEXT NOT NULL
                            CHECK (status IN ('active', 'completed')),
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL,
            body            TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_patient_created
            ON sessions (patient_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS chatbots (
            patient_id      TEXT PRIMARY KEY NOT NULL,
            chatbot_id      TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            body            TEXT NOT NULL
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| CuraloopError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        // Running again should be idempotent.
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_sessions_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO sessions (id, patient_id, chat_type, status, created_at, updated_at, body)
             VALUES ('s1', 'p1', 'daily_check_in', 'active', 1, 1, '{}')",
            [],
        )
        .unwrap();

        let patient: String = conn
            .query_row("SELECT patient_id FROM sessions WHERE id = 's1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(patient, "p1");
    }

    #[test]
    fn test_sessions_status_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO sessions (id, patient_id, chat_type, status, created_at, updated_at, body)
             VALUES ('s1', 'p1', 'daily_check_in', 'archived', 1, 1, '{}')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_sessions_chat_type_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO sessions (id, patient_id, chat_type, status, created_at, updated_at, body)
             VALUES ('s1', 'p1', 'karaoke', 'active', 1, 1, '{}')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_chatbots_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO chatbots (patient_id, chatbot_id, created_at, body)
             VALUES ('p1', 'c1', 1, '{}')",
            [],
        )
        .unwrap();
    }
}
