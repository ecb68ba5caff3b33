//! Chat type selector: picks the catalog subset for a session and its
//! opening message.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use curaloop_core::session::Session;
use curaloop_core::types::{Activity, Category, ChatType, Frequency};

use crate::catalog;
use crate::error::{EngineError, Result};
use crate::prompts;

/// Parse a requested chat type; absent means daily check-in.
pub fn parse_chat_type(requested: Option<&str>) -> Result<ChatType> {
    match requested.map(str::trim) {
        None | Some("") => Ok(ChatType::default()),
        Some(name) => name
            .parse()
            .map_err(EngineError::UnknownChatType),
    }
}

/// Activities a chat type runs, in catalog order.
pub fn select(catalog: &[Activity], chat_type: ChatType) -> Result<Vec<Activity>> {
    let keep = |a: &&Activity| match chat_type {
        ChatType::DailyCheckIn => a.frequency == Frequency::Daily,
        ChatType::TreatmentProgress => a.category.is_progress_relevant(),
        ChatType::CognitiveEngagement => a.category == Category::Cognitive,
        ChatType::CrisisSupport => a.category == Category::Safety,
    };
    let subset: Vec<Activity> = catalog.iter().filter(keep).cloned().collect();
    if subset.is_empty() {
        return Err(EngineError::EmptyCatalog(chat_type.to_string()));
    }
    Ok(subset)
}

/// A freshly planned session and the first message to show.
#[derive(Debug, Clone)]
pub struct PlannedSession {
    pub session: Session,
    pub opening_message: String,
    /// The generic check-in replaced an empty subset.
    pub used_generic_activity: bool,
}

/// Plan a new session. An empty subset falls back to the generic check-in
/// so a session always starts.
pub fn plan_session(
    id: Uuid,
    patient_id: &str,
    chat_type: ChatType,
    catalog: &[Activity],
    now: DateTime<Utc>,
) -> PlannedSession {
    let (activities, used_generic_activity) = match select(catalog, chat_type) {
        Ok(subset) => (subset, false),
        Err(e) => {
            warn!(patient_id, chat_type = %chat_type, error = %e, "Using generic check-in activity");
            (vec![catalog::generic_activity()], true)
        }
    };

    let session = Session::new(id, patient_id, chat_type, activities, now);
    let opening_message = if session.triage_pending {
        prompts::CRISIS_TRIAGE_PROMPT.to_string()
    } else {
        session
            .current_activity()
            .map(|a| a.chat_prompt.clone())
            .unwrap_or_else(|| prompts::GENERIC_PROMPT.to_string())
    };

    PlannedSession {
        session,
        opening_message,
        used_generic_activity,
    }
}
