//! Language capability: the external model that phrases replies.
//!
//! The engine never calls a [`LanguageModel`] directly. It goes through
//! [`GuardedLanguage`], which bounds every call with a timeout and swaps in a
//! deterministic fallback on any failure, so a turn always completes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use curaloop_core::session::ReplySource;
use tracing::{debug, warn};

/// Failures reported by a language model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LanguageError {
    #[error("rate limited by language service")]
    RateLimited,
    #[error("language service rejected credentials")]
    AuthFailed,
    #[error("language service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("malformed language service response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One generation request: persona, prior turns, then the new user text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRequest {
    pub system: String,
    pub history: Vec<Message>,
    pub user_text: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a reply. Implementations must not retry internally.
    async fn generate(&self, request: &LanguageRequest) -> Result<String, LanguageError>;

    fn name(&self) -> &str;
}

/// A language model wrapped with a timeout and a mandatory fallback.
#[derive(Clone)]
pub struct GuardedLanguage {
    model: Option<Arc<dyn LanguageModel>>,
    timeout: Duration,
}

impl GuardedLanguage {
    pub fn new(model: Option<Arc<dyn LanguageModel>>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// No model configured: every call returns the fallback.
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(10))
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make at most one model call. Returns the raw model result, with a
    /// timeout reported as [`LanguageError::ServiceUnavailable`].
    pub async fn call(&self, request: &LanguageRequest) -> Option<Result<String, LanguageError>> {
        let model = self.model.as_ref()?;
        let result = match tokio::time::timeout(self.timeout, model.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(LanguageError::ServiceUnavailable(format!(
                "no reply within {}s",
                self.timeout.as_secs_f32()
            ))),
        };
        Some(result)
    }

    /// Generate a reply, or return `fallback` if no model is configured, the
    /// call fails, times out, or returns only whitespace.
    pub async fn generate_or(
        &self,
        request: &LanguageRequest,
        fallback: String,
    ) -> (String, ReplySource) {
        match self.call(request).await {
            None => (fallback, ReplySource::Fallback),
            Some(Ok(text)) if !text.trim().is_empty() => {
                debug!(model = self.model_name().unwrap_or("unknown"), "Reply phrased by language model");
                (text.trim().to_string(), ReplySource::LanguageModel)
            }
            Some(Ok(_)) => {
                warn!("Language model returned an empty reply, using fallback");
                (fallback, ReplySource::Fallback)
            }
            Some(Err(e)) => {
                warn!(error = %e, "Language model call failed, using fallback");
                (fallback, ReplySource::Fallback)
            }
        }
    }
}

impl std::fmt::Debug for GuardedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedLanguage")
            .field("model", &self.model_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
