//! Response types returned by [`SessionEngine`](crate::SessionEngine).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use curaloop_core::session::{
    ReplySource, SentimentDistribution, SessionStatus, SessionSummary, TranscriptEntry,
    TurnAnalysis,
};
use curaloop_core::types::{ChatType, ChatTypeMetadata, CognitiveTier};

/// Result of initializeChatbot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotInit {
    pub chatbot_id: String,
    pub patient_id: String,
    pub cognitive_tier: CognitiveTier,
    pub catalog_size: usize,
    /// Activity count per category, in catalog order of first appearance.
    pub categories: Vec<(String, usize)>,
    pub created_at: DateTime<Utc>,
}

/// Context returned with the opening message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(flatten)]
    pub chat_type: ChatTypeMetadata,
    pub activity_count: usize,
    pub activities: Vec<String>,
}

/// Result of startSession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: Uuid,
    pub patient_id: String,
    pub chat_type: ChatType,
    pub opening_message: String,
    pub context: ContextMetadata,
    pub created_at: DateTime<Utc>,
}

/// Result of sendMessage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    pub session_id: Uuid,
    pub chatbot_reply: String,
    pub follow_up_questions: Vec<String>,
    pub activity_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_activity: Option<String>,
    pub conversation_complete: bool,
    pub next_steps: Vec<String>,
    pub analysis: TurnAnalysis,
    pub reply_source: ReplySource,
    pub activities_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub duration_minutes: f64,
    pub activities_completed: usize,
    pub activities_attempted: usize,
    pub total_interactions: usize,
    pub engagement_score: f64,
    pub sentiment_distribution: SentimentDistribution,
}

/// Result of endSession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnd {
    pub summary: SessionSummary,
    pub interaction_log: Vec<TranscriptEntry>,
    pub completed_activities: Vec<String>,
    pub metrics: SessionMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: Uuid,
    pub chat_type: ChatType,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub activities_completed: usize,
    pub total_interactions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

/// Result of getHistory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub patient_id: String,
    pub total_sessions: usize,
    pub sessions: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatbotState {
    Active,
    NotInitialized,
}

/// Result of getChatbotStatus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotStatus {
    pub patient_id: String,
    pub status: ChatbotState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_tier: Option<CognitiveTier>,
    pub catalog_size: usize,
    pub total_sessions: usize,
    pub activities_completed: usize,
    pub treatment_goals: usize,
    pub monitoring_schedule: BTreeMap<String, String>,
}

impl ChatbotStatus {
    pub fn not_initialized(patient_id: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            status: ChatbotState::NotInitialized,
            chatbot_id: None,
            created_at: None,
            cognitive_tier: None,
            catalog_size: 0,
            total_sessions: 0,
            activities_completed: 0,
            treatment_goals: 0,
            monitoring_schedule: BTreeMap::new(),
        }
    }
}
