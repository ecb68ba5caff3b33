//! Conversational session engine for Curaloop.
//!
//! Turns a treatment plan into an activity catalog, runs typed chat sessions
//! turn by turn, and summarizes them when they end.

pub mod catalog;
pub mod classifier;
pub mod cues;
pub mod engine;
pub mod error;
pub mod language;
pub mod locks;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod scheduler;
pub mod state_machine;
pub mod summary;
pub mod turn;
pub mod types;

pub use classifier::{Classification, LanguageModelClassifier, LexicalClassifier, TurnClassifier};
pub use cues::CueSet;
pub use engine::{ClassifierMode, EngineOptions, SessionEngine};
pub use error::{EngineError, ErrorKind, Result};
pub use language::{GuardedLanguage, LanguageError, LanguageModel, LanguageRequest, Message, Role};
pub use openai::HttpLanguageModel;
pub use provider::{PlanBundle, PlanProvider};
pub use types::{
    ChatbotInit, ChatbotState, ChatbotStatus, ContextMetadata, History, HistoryEntry, SessionEnd,
    SessionMetrics, SessionStart, TurnReply,
};
