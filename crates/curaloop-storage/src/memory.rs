//! Process-local storage backend.
//!
//! Sessions and chatbots live in hash maps behind a `RwLock`. Nothing
//! survives a restart; use [`SqliteStore`](crate::SqliteStore) for that.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use curaloop_core::error::{CuraloopError, Result};
use curaloop_core::session::{ChatbotRecord, Session, SessionStatus};

use crate::store::{ChatbotStore, SessionStore};

#[derive(Debug)]
struct StoredSession {
    /// Insertion order, breaks ties between equal `created_at` values.
    seq: u64,
    session: Session,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uuid, StoredSession>,
    chatbots: HashMap<String, ChatbotRecord>,
    next_seq: u64,
}

/// In-memory [`SessionStore`] and [`ChatbotStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| CuraloopError::Storage(format!("Memory store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| CuraloopError::Storage(format!("Memory store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.read()?.sessions.get(&id).map(|s| s.session.clone()))
    }

    async fn create(&self, session: &Session) -> Result<()> {
        let mut inner = self.write()?;
        if inner.sessions.contains_key(&session.id) {
            return Err(CuraloopError::Integrity(format!(
                "session {} already exists",
                session.id
            )));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.insert(
            session.id,
            StoredSession {
                seq,
                session: session.clone(),
            },
        );
        Ok(())
    }

    async fn put(&self, session: &Session) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner.sessions.get_mut(&session.id).ok_or_else(|| {
            CuraloopError::Integrity(format!("session {} does not exist", session.id))
        })?;
        if stored.session.status == SessionStatus::Completed {
            return Err(CuraloopError::Integrity(format!(
                "session {} is completed and cannot be modified",
                session.id
            )));
        }
        stored.session = session.clone();
        Ok(())
    }

    async fn list_by_patient(&self, patient_id: &str, limit: usize) -> Result<Vec<Session>> {
        let inner = self.read()?;
        let mut matches: Vec<&StoredSession> = inner
            .sessions
            .values()
            .filter(|s| s.session.patient_id == patient_id)
            .collect();
        matches.sort_by(|a, b| {
            b.session
                .created_at
                .cmp(&a.session.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|s| s.session.clone())
            .collect())
    }

    async fn count_by_patient(&self, patient_id: &str) -> Result<usize> {
        Ok(self
            .read()?
            .sessions
            .values()
            .filter(|s| s.session.patient_id == patient_id)
            .count())
    }
}

#[async_trait]
impl ChatbotStore for MemoryStore {
    async fn get_chatbot(&self, patient_id: &str) -> Result<Option<ChatbotRecord>> {
        Ok(self.read()?.chatbots.get(patient_id).cloned())
    }

    async fn put_chatbot(&self, record: &ChatbotRecord) -> Result<()> {
        self.write()?
            .chatbots
            .insert(record.patient_id.clone(), record.clone());
        Ok(())
    }

    async fn count_chatbots(&self) -> Result<usize> {
        Ok(self.read()?.chatbots.len())
    }
}
