//! Session records and the values derived from them.
//!
//! A [`Session`] is the only mutable entity in the system. Everything else
//! in this module is computed once and never changed.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Activity, ChatType, ChatbotConfig, CognitiveTier, TreatmentPlan};

// =============================================================================
// Turn analysis
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn is_negative(&self) -> bool {
        matches!(self, Sentiment::Negative)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    /// Weight used when averaging engagement across turns.
    pub fn weight(&self) -> u32 {
        match self {
            EngagementLevel::High => 3,
            EngagementLevel::Medium => 2,
            EngagementLevel::Low => 1,
        }
    }
}

/// Per-message classification, computed fresh each turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAnalysis {
    pub sentiment: Sentiment,
    pub engagement: EngagementLevel,
    pub activity_completed: bool,
    /// Message length in characters.
    pub response_length: usize,
}

/// Where a chatbot reply came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    LanguageModel,
    Fallback,
}

/// One patient-message/chatbot-reply pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub patient_message: String,
    pub chatbot_response: String,
    pub analysis: TurnAnalysis,
    /// Activity at the head of the queue when the message arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub reply_source: ReplySource,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics captured at the moment an activity is completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMetrics {
    pub sentiment: Sentiment,
    pub engagement: EngagementLevel,
    pub response_length: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedActivity {
    pub activity_id: String,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub patient_response: String,
    pub metrics: CompletionMetrics,
}

/// One bounded conversation executing a subset of a patient's activities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub patient_id: String,
    pub chat_type: ChatType,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Snapshot of the activities queued when the session started.
    pub activities: Vec<Activity>,
    pub pending: VecDeque<String>,
    pub completed: Vec<CompletedActivity>,
    pub transcript: Vec<TranscriptEntry>,
    /// Follow-up questions already asked per activity.
    #[serde(default)]
    pub follow_up_attempts: BTreeMap<String, u32>,
    /// Crisis sessions answer a triage question before the queue starts.
    #[serde(default)]
    pub triage_pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

impl Session {
    /// Create an active session queuing `activities` in order.
    pub fn new(
        id: Uuid,
        patient_id: impl Into<String>,
        chat_type: ChatType,
        activities: Vec<Activity>,
        now: DateTime<Utc>,
    ) -> Self {
        let pending = activities.iter().map(|a| a.id.clone()).collect();
        Self {
            id,
            patient_id: patient_id.into(),
            chat_type,
            status: SessionStatus::Active,
            created_at: now,
            last_activity_at: now,
            ended_at: None,
            activities,
            pending,
            completed: Vec::new(),
            transcript: Vec::new(),
            follow_up_attempts: BTreeMap::new(),
            triage_pending: chat_type == ChatType::CrisisSupport,
            summary: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Activity at the head of the pending queue.
    pub fn current_activity(&self) -> Option<&Activity> {
        self.pending.front().and_then(|id| self.activity(id))
    }

    /// Check that every queued activity is in exactly one of pending or
    /// completed.
    pub fn check_invariants(&self) -> Result<(), String> {
        let pending: HashSet<&str> = self.pending.iter().map(String::as_str).collect();
        let completed: HashSet<&str> = self
            .completed
            .iter()
            .map(|c| c.activity_id.as_str())
            .collect();

        if pending.len() != self.pending.len() {
            return Err("duplicate activity in pending queue".to_string());
        }
        if completed.len() != self.completed.len() {
            return Err("activity completed more than once".to_string());
        }
        if let Some(both) = pending.intersection(&completed).next() {
            return Err(format!("activity {} is both pending and completed", both));
        }
        let queued: HashSet<&str> = self.activities.iter().map(|a| a.id.as_str()).collect();
        let tracked: HashSet<&str> = pending.union(&completed).copied().collect();
        if queued != tracked {
            return Err("pending and completed do not cover the queued activities".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentDistribution {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedActivitySummary {
    pub activity_id: String,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub metrics: CompletionMetrics,
}

/// End-of-session report, computed once from the stored transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub patient_id: String,
    pub chat_type: ChatType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub duration_minutes: f64,
    pub activities_attempted: usize,
    pub activities_completed: usize,
    pub completed_activities: Vec<CompletedActivitySummary>,
    pub total_interactions: usize,
    pub sentiment_distribution: SentimentDistribution,
    pub overall_engagement: EngagementLevel,
    pub recommendations: Vec<String>,
}

// =============================================================================
// Chatbot registration
// =============================================================================

/// A patient's chatbot: plan, configuration, and the catalog built from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatbotRecord {
    pub chatbot_id: String,
    pub patient_id: String,
    pub created_at: DateTime<Utc>,
    pub tier: CognitiveTier,
    #[serde(default)]
    pub portfolio: serde_json::Value,
    pub plan: TreatmentPlan,
    pub config: ChatbotConfig,
    pub catalog: Vec<Activity>,
}
