//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path, query and body parameters, calls the session
//! engine, and returns its result as JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use curaloop_core::types::{ChatbotConfig, TreatmentPlan};
use curaloop_engine::{ChatbotInit, ChatbotStatus, History, SessionEnd, SessionStart, TurnReply};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Request body for POST /api/patient/{patient_id}/chatbot/initialize.
#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    /// Opaque patient portfolio, stored alongside the chatbot.
    #[serde(default)]
    pub portfolio: serde_json::Value,
    pub treatment_plan: TreatmentPlan,
    #[serde(default)]
    pub chatbot_config: ChatbotConfig,
}

/// Request body for POST /api/patient/{patient_id}/chat/start. The body may
/// be omitted entirely.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub chat_type: Option<String>,
}

/// Request body for POST /api/patient/chat/message.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub session_id: Uuid,
    pub message: String,
}

/// Request body for POST /api/patient/chat/end.
#[derive(Debug, Deserialize)]
pub struct EndRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub classifier: String,
    pub language_model: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness, version and uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        classifier: state.engine.classifier_name().to_string(),
        language_model: state.engine.language_configured(),
    })
}

/// POST /api/patient/{patient_id}/chatbot/initialize
pub async fn initialize_chatbot(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> Result<Json<ChatbotInit>, ApiError> {
    let Json(body) = payload?;
    let init = state
        .engine
        .initialize_chatbot(
            &patient_id,
            body.portfolio,
            body.treatment_plan,
            body.chatbot_config,
        )
        .await?;
    Ok(Json(init))
}

/// GET /api/patient/{patient_id}/chatbot/status
pub async fn chatbot_status(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<ChatbotStatus>, ApiError> {
    Ok(Json(state.engine.chatbot_status(&patient_id).await?))
}

/// POST /api/patient/{patient_id}/chat/start
pub async fn start_session(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<SessionStart>, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => StartRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let start = state
        .engine
        .start_session(&patient_id, body.chat_type.as_deref())
        .await?;
    Ok(Json(start))
}

/// POST /api/patient/chat/message
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<TurnReply>, ApiError> {
    let Json(body) = payload?;
    let reply = state
        .engine
        .send_message(body.session_id, &body.message)
        .await?;
    Ok(Json(reply))
}

/// POST /api/patient/chat/end
pub async fn end_session(
    State(state): State<AppState>,
    payload: Result<Json<EndRequest>, JsonRejection>,
) -> Result<Json<SessionEnd>, ApiError> {
    let Json(body) = payload?;
    Ok(Json(state.engine.end_session(body.session_id).await?))
}

/// GET /api/patient/{patient_id}/chat/history?limit=
pub async fn history(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<History>, ApiError> {
    Ok(Json(
        state.engine.get_history(&patient_id, params.limit).await?,
    ))
}
