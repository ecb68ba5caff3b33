//! Storage traits shared by every backend.

use async_trait::async_trait;
use uuid::Uuid;

use curaloop_core::error::Result;
use curaloop_core::session::{ChatbotRecord, Session};

/// Keyed store of sessions.
///
/// Backends must reject any write to a session whose stored status is
/// already completed with [`CuraloopError::Integrity`], so a closed
/// transcript can never change.
///
/// [`CuraloopError::Integrity`]: curaloop_core::error::CuraloopError::Integrity
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Session>>;

    /// Insert a new session. Fails with an integrity error if the id exists.
    async fn create(&self, session: &Session) -> Result<()>;

    /// Replace an existing, still-active session.
    async fn put(&self, session: &Session) -> Result<()>;

    /// Most recent sessions first, at most `limit`.
    async fn list_by_patient(&self, patient_id: &str, limit: usize) -> Result<Vec<Session>>;

    async fn count_by_patient(&self, patient_id: &str) -> Result<usize>;
}

/// Keyed store of chatbot registrations, one per patient.
#[async_trait]
pub trait ChatbotStore: Send + Sync {
    async fn get_chatbot(&self, patient_id: &str) -> Result<Option<ChatbotRecord>>;

    /// Insert or replace the patient's chatbot.
    async fn put_chatbot(&self, record: &ChatbotRecord) -> Result<()>;

    async fn count_chatbots(&self) -> Result<usize>;
}

/// A backend that stores both sessions and chatbots.
pub trait Store: SessionStore + ChatbotStore {}

impl<T: SessionStore + ChatbotStore> Store for T {}
