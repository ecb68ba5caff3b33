//! Plan provider boundary.
//!
//! The diagnosis and planning service lives outside the engine. It is read
//! once per chatbot initialization.

use async_trait::async_trait;

use curaloop_core::types::{ChatbotConfig, TreatmentPlan};

use crate::error::Result;

/// Everything needed to initialize a chatbot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanBundle {
    pub plan: TreatmentPlan,
    pub config: ChatbotConfig,
    pub portfolio: serde_json::Value,
}

#[async_trait]
pub trait PlanProvider: Send + Sync {
    /// Fetch the current plan for a patient. `Ok(None)` when the provider
    /// knows nothing about the patient.
    async fn fetch(&self, patient_id: &str) -> Result<Option<PlanBundle>>;
}
