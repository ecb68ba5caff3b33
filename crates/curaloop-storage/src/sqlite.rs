//! SQLite storage backend.
//!
//! Each session row holds the full record as JSON plus the indexed columns
//! used for lookups. Completed rows are never rewritten: updates are guarded
//! by `status = 'active'` in the WHERE clause. Queries run on tokio's
//! blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use curaloop_core::error::{CuraloopError, Result};
use curaloop_core::session::{ChatbotRecord, Session};

use crate::db::Database;
use crate::store::{ChatbotStore, SessionStore};

/// SQLite-backed [`SessionStore`] and [`ChatbotStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::new(path)?)))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }

    /// Run `f` against the connection on the blocking pool so SQLite I/O
    /// never stalls an async worker.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| CuraloopError::Storage(format!("Database task panicked: {}", e)))?
    }
}

fn storage_err(e: rusqlite::Error) -> CuraloopError {
    CuraloopError::Storage(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        let body: Option<String> = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT body FROM sessions WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)
            })
            .await?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, session: &Session) -> Result<()> {
        let body = serde_json::to_string(session)?;
        let id = session.id;
        let patient_id = session.patient_id.clone();
        let chat_type = session.chat_type.as_str();
        let status = session.status.as_str();
        let created_at = session.created_at.timestamp_millis();
        let updated_at = session.last_activity_at.timestamp_millis();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, patient_id, chat_type, status, created_at, updated_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    patient_id,
                    chat_type,
                    status,
                    created_at,
                    updated_at,
                    body,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CuraloopError::Integrity(format!("session {} already exists", id))
                } else {
                    CuraloopError::Storage(format!("Failed to create session: {}", e))
                }
            })?;
            Ok(())
        })
        .await
    }

    async fn put(&self, session: &Session) -> Result<()> {
        let body = serde_json::to_string(session)?;
        let id = session.id;
        let status = session.status.as_str();
        let updated_at = session.last_activity_at.timestamp_millis();

        self.blocking(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions
                     SET status = ?2, updated_at = ?3, body = ?4
                     WHERE id = ?1 AND status = 'active'",
                    rusqlite::params![id.to_string(), status, updated_at, body],
                )
                .map_err(|e| CuraloopError::Storage(format!("Failed to update session: {}", e)))?;

            if changed == 0 {
                return Err(CuraloopError::Integrity(format!(
                    "session {} is missing or completed and cannot be modified",
                    id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn list_by_patient(&self, patient_id: &str, limit: usize) -> Result<Vec<Session>> {
        let patient_id = patient_id.to_string();
        let bodies: Vec<String> = self
            .blocking(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT body FROM sessions
                         WHERE patient_id = ?1
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT ?2",
                    )
                    .map_err(storage_err)?;

                let rows = stmt
                    .query_map(rusqlite::params![patient_id, limit as i64], |row| row.get(0))
                    .map_err(storage_err)?;

                let mut bodies = Vec::new();
                for row in rows {
                    bodies.push(row.map_err(storage_err)?);
                }
                Ok(bodies)
            })
            .await?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(CuraloopError::from))
            .collect()
    }

    async fn count_by_patient(&self, patient_id: &str) -> Result<usize> {
        let patient_id = patient_id.to_string();
        let count: i64 = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sessions WHERE patient_id = ?1",
                    rusqlite::params![patient_id],
                    |row| row.get(0),
                )
                .map_err(storage_err)
            })
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ChatbotStore for SqliteStore {
    async fn get_chatbot(&self, patient_id: &str) -> Result<Option<ChatbotRecord>> {
        let patient_id = patient_id.to_string();
        let body: Option<String> = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT body FROM chatbots WHERE patient_id = ?1",
                    rusqlite::params![patient_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)
            })
            .await?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn put_chatbot(&self, record: &ChatbotRecord) -> Result<()> {
        let body = serde_json::to_string(record)?;
        let patient_id = record.patient_id.clone();
        let chatbot_id = record.chatbot_id.clone();
        let created_at = record.created_at.timestamp_millis();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO chatbots (patient_id, chatbot_id, created_at, body)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(patient_id) DO UPDATE SET
                    chatbot_id = excluded.chatbot_id,
                    created_at = excluded.created_at,
                    body = excluded.body",
                rusqlite::params![patient_id, chatbot_id, created_at, body],
            )
            .map_err(|e| CuraloopError::Storage(format!("Failed to store chatbot: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn count_chatbots(&self) -> Result<usize> {
        let count: i64 = self
            .blocking(|conn| {
                conn.query_row("SELECT COUNT(*) FROM chatbots", [], |row| row.get(0))
                    .map_err(storage_err)
            })
            .await?;
        Ok(count as usize)
    }
}
