//! Session engine: the six operations exposed to transports.
//!
//! Every operation on one session runs under that session's lock. A turn is
//! applied to a copy of the stored session and written back in one `put`, so
//! a failure at any step leaves the stored session unchanged.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use curaloop_core::config::{CuraloopConfig, EngineConfig};
use curaloop_core::error::CuraloopError;
use curaloop_core::session::{ChatbotRecord, Session, SessionStatus, SessionSummary};
use curaloop_core::types::{ChatbotConfig, CognitiveTier, TreatmentPlan};
use curaloop_storage::Store;

use crate::catalog;
use crate::classifier::{LanguageModelClassifier, TurnClassifier};
use crate::cues::CueSet;
use crate::error::{EngineError, Result};
use crate::language::{GuardedLanguage, LanguageModel};
use crate::locks::SessionLocks;
use crate::openai::HttpLanguageModel;
use crate::provider::PlanProvider;
use crate::scheduler;
use crate::state_machine::validate_transition;
use crate::summary;
use crate::turn::{TurnProcessor, TurnStyle};
use crate::types::{
    ChatbotInit, ChatbotState, ChatbotStatus, ContextMetadata, History, HistoryEntry, SessionEnd,
    SessionMetrics, SessionStart, TurnReply,
};

/// Which strategy labels sentiment and engagement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassifierMode {
    #[default]
    Lexical,
    LanguageModel,
}

impl FromStr for ClassifierMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "lexical" => Ok(ClassifierMode::Lexical),
            "language_model" => Ok(ClassifierMode::LanguageModel),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown sentiment classifier '{}'",
                other
            ))),
        }
    }
}

/// Everything the engine needs besides storage.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub limits: EngineConfig,
    pub cues: CueSet,
    pub classifier: ClassifierMode,
    pub language: GuardedLanguage,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            limits: EngineConfig::default(),
            cues: CueSet::default(),
            classifier: ClassifierMode::Lexical,
            language: GuardedLanguage::disabled(),
        }
    }
}

impl EngineOptions {
    /// Build options from the application config, including the HTTP
    /// language model when one is configured.
    pub fn from_config(config: &CuraloopConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.language.timeout_secs.max(1));
        let model = HttpLanguageModel::from_config(&config.language)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        let language = match model {
            Some(model) => {
                info!(model = %config.language.model, "Language model configured");
                GuardedLanguage::new(Some(Arc::new(model) as Arc<dyn LanguageModel>), timeout)
            }
            None => {
                if config.language.provider != "none" {
                    warn!(
                        env = %config.language.api_key_env,
                        "No API key found, replies will use templates"
                    );
                }
                GuardedLanguage::new(None, timeout)
            }
        };

        Ok(Self {
            limits: config.engine.clone(),
            cues: CueSet::from_config(&config.sentiment.cues),
            classifier: config.sentiment.classifier.parse()?,
            language,
        })
    }
}

type IdGenerator = Box<dyn Fn() -> Uuid + Send + Sync>;

pub struct SessionEngine {
    store: Arc<dyn Store>,
    locks: SessionLocks,
    turns: TurnProcessor,
    limits: EngineConfig,
    next_id: IdGenerator,
}

impl SessionEngine {
    pub fn new(store: Arc<dyn Store>, options: EngineOptions) -> Self {
        let delegated: Option<Arc<dyn TurnClassifier>> = match options.classifier {
            ClassifierMode::Lexical => None,
            ClassifierMode::LanguageModel => Some(Arc::new(LanguageModelClassifier::new(
                options.language.clone(),
            ))),
        };
        let turns = TurnProcessor::new(
            Arc::new(options.cues),
            delegated,
            options.language,
            options.limits.context_turns,
        );
        Self {
            store,
            locks: SessionLocks::new(),
            turns,
            limits: options.limits,
            next_id: Box::new(Uuid::new_v4),
        }
    }

    /// Replace the session id source.
    pub fn with_id_generator(mut self, f: impl Fn() -> Uuid + Send + Sync + 'static) -> Self {
        self.next_id = Box::new(f);
        self
    }

    pub fn language_configured(&self) -> bool {
        self.turns.language().is_configured()
    }

    pub fn classifier_name(&self) -> &'static str {
        self.turns.classifier_name()
    }

    // =========================================================================
    // Chatbot registration
    // =========================================================================

    /// Build and store a patient's activity catalog. Re-initializing replaces
    /// the catalog; running sessions keep their own snapshot.
    pub async fn initialize_chatbot(
        &self,
        patient_id: &str,
        portfolio: serde_json::Value,
        plan: TreatmentPlan,
        config: ChatbotConfig,
    ) -> Result<ChatbotInit> {
        let catalog = catalog::build(&plan, &config)?;
        let tier = config.tier().map_err(EngineError::InvalidConfig)?;

        let mut categories: Vec<(String, usize)> = Vec::new();
        for activity in &catalog {
            let name = activity.category.as_str();
            match categories.iter_mut().find(|(c, _)| c == name) {
                Some((_, n)) => *n += 1,
                None => categories.push((name.to_string(), 1)),
            }
        }

        let record = ChatbotRecord {
            chatbot_id: format!("chatbot_{}", Uuid::new_v4().simple()),
            patient_id: patient_id.to_string(),
            created_at: Utc::now(),
            tier,
            portfolio,
            plan,
            config,
            catalog,
        };
        self.store.put_chatbot(&record).await?;

        info!(
            patient_id,
            chatbot_id = %record.chatbot_id,
            tier = tier.as_str(),
            activities = record.catalog.len(),
            "Chatbot initialized"
        );

        Ok(ChatbotInit {
            chatbot_id: record.chatbot_id,
            patient_id: record.patient_id,
            cognitive_tier: tier,
            catalog_size: record.catalog.len(),
            categories,
            created_at: record.created_at,
        })
    }

    /// Initialize from a one-shot read of the plan provider.
    pub async fn initialize_from_provider(
        &self,
        provider: &dyn PlanProvider,
        patient_id: &str,
    ) -> Result<ChatbotInit> {
        let bundle = provider
            .fetch(patient_id)
            .await?
            .ok_or_else(|| EngineError::PatientNotFound(patient_id.to_string()))?;
        self.initialize_chatbot(patient_id, bundle.portfolio, bundle.plan, bundle.config)
            .await
    }

    pub async fn chatbot_status(&self, patient_id: &str) -> Result<ChatbotStatus> {
        let Some(record) = self.store.get_chatbot(patient_id).await? else {
            return Ok(ChatbotStatus::not_initialized(patient_id));
        };

        let total_sessions = self.store.count_by_patient(patient_id).await?;
        let sessions = self
            .store
            .list_by_patient(patient_id, total_sessions)
            .await?;
        let activities_completed = sessions.iter().map(|s| s.completed.len()).sum();

        Ok(ChatbotStatus {
            patient_id: patient_id.to_string(),
            status: ChatbotState::Active,
            chatbot_id: Some(record.chatbot_id),
            created_at: Some(record.created_at),
            cognitive_tier: Some(record.tier),
            catalog_size: record.catalog.len(),
            total_sessions,
            activities_completed,
            treatment_goals: record.config.treatment_goals.len(),
            monitoring_schedule: if record.config.monitoring_schedule.is_empty() {
                record.plan.monitoring_schedule
            } else {
                record.config.monitoring_schedule
            },
        })
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Open a session of `chat_type` (daily check-in when absent).
    pub async fn start_session(
        &self,
        patient_id: &str,
        chat_type: Option<&str>,
    ) -> Result<SessionStart> {
        let chat_type = scheduler::parse_chat_type(chat_type)?;
        let record = self
            .store
            .get_chatbot(patient_id)
            .await?
            .ok_or_else(|| EngineError::ChatbotNotFound(patient_id.to_string()))?;

        let id = (self.next_id)();
        let planned =
            scheduler::plan_session(id, patient_id, chat_type, &record.catalog, Utc::now());

        self.store.create(&planned.session).await.map_err(|e| match e {
            CuraloopError::Integrity(_) => EngineError::SessionIdCollision(id),
            other => other.into(),
        })?;

        let session = planned.session;
        info!(
            session_id = %session.id,
            patient_id,
            chat_type = %chat_type,
            activities = session.activities.len(),
            "Session started"
        );

        Ok(SessionStart {
            session_id: session.id,
            patient_id: session.patient_id.clone(),
            chat_type,
            opening_message: planned.opening_message,
            context: ContextMetadata {
                chat_type: chat_type.metadata(),
                activity_count: session.activities.len(),
                activities: session.activities.iter().map(|a| a.title.clone()).collect(),
            },
            created_at: session.created_at,
        })
    }

    /// Process one patient message.
    pub async fn send_message(&self, session_id: Uuid, message: &str) -> Result<TurnReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(EngineError::EmptyMessage);
        }
        let max = self.limits.max_message_length;
        if message.chars().count() > max {
            return Err(EngineError::MessageTooLong(max));
        }

        let _guard = self.locks.acquire(session_id).await?;
        self.apply_turn(session_id, message).await
    }

    async fn apply_turn(&self, id: Uuid, message: &str) -> Result<TurnReply> {
        let mut session = self.load(id).await?;
        if session.is_completed() {
            return Err(EngineError::SessionClosed(id));
        }
        validate_transition(session.status, SessionStatus::Active)?;

        let chatbot = self.store.get_chatbot(&session.patient_id).await?;
        let style = TurnStyle {
            tier: chatbot.as_ref().map_or(CognitiveTier::Normal, |c| c.tier),
            personality: chatbot
                .as_ref()
                .and_then(|c| c.config.personality.as_deref()),
        };

        let outcome = self
            .turns
            .process(&mut session, message, style, Utc::now())
            .await;
        session
            .check_invariants()
            .map_err(EngineError::Integrity)?;
        self.store.put(&session).await?;

        Ok(TurnReply {
            session_id: id,
            chatbot_reply: outcome.reply,
            follow_up_questions: outcome.follow_up_questions,
            activity_completed: outcome.analysis.activity_completed,
            completed_activity: outcome.completed_activity,
            conversation_complete: outcome.conversation_complete,
            next_steps: outcome.next_steps,
            analysis: outcome.analysis,
            reply_source: outcome.reply_source,
            activities_remaining: session.pending.len(),
        })
    }

    /// Close a session and store its summary.
    pub async fn end_session(&self, session_id: Uuid) -> Result<SessionEnd> {
        let _guard = self.locks.acquire(session_id).await?;
        self.finish(session_id).await
    }

    async fn finish(&self, id: Uuid) -> Result<SessionEnd> {
        let mut session = self.load(id).await?;
        if session.is_completed() {
            return Err(EngineError::SessionAlreadyEnded(id));
        }
        validate_transition(session.status, SessionStatus::Completed)?;

        let now = Utc::now();
        let summary = summary::summarize(&session, now, self.limits.negative_streak_threshold);
        session.status = SessionStatus::Completed;
        session.ended_at = Some(now);
        session.last_activity_at = now;
        session.summary = Some(summary.clone());
        self.store.put(&session).await?;

        info!(
            session_id = %id,
            patient_id = %session.patient_id,
            completed = summary.activities_completed,
            interactions = summary.total_interactions,
            "Session ended"
        );

        Ok(SessionEnd {
            metrics: SessionMetrics {
                duration_minutes: summary.duration_minutes,
                activities_completed: summary.activities_completed,
                activities_attempted: summary.activities_attempted,
                total_interactions: summary.total_interactions,
                engagement_score: summary::engagement_score(&session.transcript),
                sentiment_distribution: summary.sentiment_distribution,
            },
            completed_activities: session.completed.iter().map(|c| c.title.clone()).collect(),
            interaction_log: session.transcript,
            summary,
        })
    }

    /// Recompute the summary of an ended session from its stored transcript.
    pub async fn recompute_summary(&self, session_id: Uuid) -> Result<SessionSummary> {
        let session = self.load(session_id).await?;
        match session.ended_at {
            Some(ended_at) if session.is_completed() => Ok(summary::summarize(
                &session,
                ended_at,
                self.limits.negative_streak_threshold,
            )),
            _ => Err(EngineError::InvalidTransition {
                from: session.status,
                to: SessionStatus::Completed,
            }),
        }
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        self.load(session_id).await
    }

    /// Past sessions, most recent first. `limit` defaults to the configured
    /// default and is capped at the configured maximum.
    pub async fn get_history(&self, patient_id: &str, limit: Option<usize>) -> Result<History> {
        let limit = limit
            .unwrap_or(self.limits.default_history_limit)
            .min(self.limits.max_history_limit);
        let total_sessions = self.store.count_by_patient(patient_id).await?;
        let sessions = self.store.list_by_patient(patient_id, limit).await?;

        Ok(History {
            patient_id: patient_id.to_string(),
            total_sessions,
            sessions: sessions
                .into_iter()
                .map(|s| HistoryEntry {
                    session_id: s.id,
                    chat_type: s.chat_type,
                    status: s.status,
                    created_at: s.created_at,
                    ended_at: s.ended_at,
                    activities_completed: s.completed.len(),
                    total_interactions: s.transcript.len(),
                    summary: s.summary,
                })
                .collect(),
        })
    }

    async fn load(&self, id: Uuid) -> Result<Session> {
        self.store
            .get(id)
            .await?
            .ok_or(EngineError::SessionNotFound(id))
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("limits", &self.limits)
            .field("classifier", &self.turns.classifier_name())
            .finish()
    }
}
