use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Care category that a plan section and its activities belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Medication,
    Lifestyle,
    PhysicalActivity,
    Nutrition,
    Sleep,
    Cognitive,
    Social,
    Medical,
    Safety,
    General,
}

impl Category {
    /// All categories in declaration order.
    pub const ALL: [Category; 10] = [
        Category::Medication,
        Category::Lifestyle,
        Category::PhysicalActivity,
        Category::Nutrition,
        Category::Sleep,
        Category::Cognitive,
        Category::Social,
        Category::Medical,
        Category::Safety,
        Category::General,
    ];

    /// Snake-case name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Medication => "medication",
            Category::Lifestyle => "lifestyle",
            Category::PhysicalActivity => "physical_activity",
            Category::Nutrition => "nutrition",
            Category::Sleep => "sleep",
            Category::Cognitive => "cognitive",
            Category::Social => "social",
            Category::Medical => "medical",
            Category::Safety => "safety",
            Category::General => "general",
        }
    }

    /// Whether activities of this category are reviewed in a treatment
    /// progress session. Safety is handled by crisis support and general
    /// check-ins carry no treatment goal.
    pub fn is_progress_relevant(&self) -> bool {
        !matches!(self, Category::Safety | Category::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str() == s.trim())
            .copied()
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// How often an activity should come up in conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    AsNeeded,
}

/// Effort an activity asks of the patient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Cognitive tier derived from an MMSE-like score.
///
/// Gates how many activities each category contributes to the catalog and
/// how complex the generated prompts may be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveTier {
    /// Score below 18.
    Severe,
    /// Score from 18 up to (not including) 24.
    Mild,
    /// Score of 24 or above.
    Normal,
}

impl CognitiveTier {
    /// Highest score an MMSE-like scale can report.
    pub const MAX_SCORE: u8 = 30;

    /// Map a score to its tier. Returns `None` for scores above the scale.
    pub fn from_score(score: u8) -> Option<Self> {
        match score {
            0..=17 => Some(CognitiveTier::Severe),
            18..=23 => Some(CognitiveTier::Mild),
            24..=Self::MAX_SCORE => Some(CognitiveTier::Normal),
            _ => None,
        }
    }

    /// Maximum activities per category, `None` when unbounded.
    pub fn activity_cap(&self) -> Option<usize> {
        match self {
            CognitiveTier::Severe => Some(3),
            CognitiveTier::Mild => Some(5),
            CognitiveTier::Normal => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CognitiveTier::Severe => "severe",
            CognitiveTier::Mild => "mild",
            CognitiveTier::Normal => "normal",
        }
    }
}

impl FromStr for CognitiveTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "severe" => Ok(CognitiveTier::Severe),
            "mild" => Ok(CognitiveTier::Mild),
            "normal" => Ok(CognitiveTier::Normal),
            other => Err(format!("unrecognized cognitive tier '{}'", other)),
        }
    }
}

/// Kind of conversation a session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    #[default]
    DailyCheckIn,
    TreatmentProgress,
    CognitiveEngagement,
    CrisisSupport,
}

impl ChatType {
    pub const ALL: [ChatType; 4] = [
        ChatType::DailyCheckIn,
        ChatType::TreatmentProgress,
        ChatType::CognitiveEngagement,
        ChatType::CrisisSupport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::DailyCheckIn => "daily_check_in",
            ChatType::TreatmentProgress => "treatment_progress",
            ChatType::CognitiveEngagement => "cognitive_engagement",
            ChatType::CrisisSupport => "crisis_support",
        }
    }

    /// Descriptive metadata returned to the client when a session opens.
    pub fn metadata(&self) -> ChatTypeMetadata {
        let (purpose, duration, topics): (&str, &str, &[&str]) = match self {
            ChatType::DailyCheckIn => (
                "Daily wellness and treatment adherence check",
                "5-10 minutes",
                &[
                    "Mood and energy level",
                    "Medication adherence",
                    "Sleep quality",
                    "Physical activity",
                    "Safety concerns",
                ],
            ),
            ChatType::TreatmentProgress => (
                "Weekly treatment plan progress review",
                "15-20 minutes",
                &[
                    "Treatment adherence",
                    "Symptom changes",
                    "Lifestyle modifications",
                    "Challenges and successes",
                    "Goal adjustments",
                ],
            ),
            ChatType::CognitiveEngagement => (
                "Cognitive stimulation and memory exercises",
                "10-15 minutes",
                &[
                    "Memory exercises",
                    "Orientation questions",
                    "Problem-solving activities",
                    "Reminiscence therapy",
                    "Attention training",
                ],
            ),
            ChatType::CrisisSupport => (
                "Emergency support and crisis intervention",
                "variable",
                &[
                    "Immediate safety concerns",
                    "Severe symptom changes",
                    "Emergency contacts",
                    "Caregiver notification",
                    "Medical intervention needs",
                ],
            ),
        };
        ChatTypeMetadata {
            purpose: purpose.to_string(),
            expected_duration: duration.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChatType::ALL
            .iter()
            .find(|t| t.as_str() == s.trim())
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

/// Static description of a chat type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTypeMetadata {
    pub purpose: String,
    pub expected_duration: String,
    pub topics: Vec<String>,
}

// =============================================================================
// Plan inputs
// =============================================================================

/// A single care intervention inside a plan category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    /// Free-text description, used as the activity title.
    pub description: String,
    /// Explicit schedule. Inferred from the description when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
}

impl Intervention {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            frequency: None,
        }
    }
}

/// One ordered section of a treatment plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCategory {
    pub category: Category,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

/// Treatment plan produced by the diagnosis/planning service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    #[serde(default)]
    pub categories: Vec<PlanCategory>,
    /// Named schedules, e.g. `cognitive_assessment = "Every 6 months"`.
    #[serde(default)]
    pub monitoring_schedule: BTreeMap<String, String>,
}

/// Chatbot configuration produced alongside the plan.
///
/// The cognitive tier is either given directly or derived from `mmse_score`.
/// An explicit tier wins when both are present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatbotConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mmse_score: Option<u8>,
    /// Overrides the default companion persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default)]
    pub treatment_goals: Vec<String>,
    #[serde(default)]
    pub monitoring_schedule: BTreeMap<String, String>,
}

impl ChatbotConfig {
    /// Resolve the cognitive tier.
    ///
    /// With neither field set the patient is treated as normal, matching a
    /// full-score assessment.
    pub fn tier(&self) -> Result<CognitiveTier, String> {
        if let Some(ref tier) = self.cognitive_tier {
            return tier.parse();
        }
        match self.mmse_score {
            Some(score) => CognitiveTier::from_score(score).ok_or_else(|| {
                format!(
                    "mmse_score {} is outside 0..={}",
                    score,
                    CognitiveTier::MAX_SCORE
                )
            }),
            None => Ok(CognitiveTier::Normal),
        }
    }
}

// =============================================================================
// Activity
// =============================================================================

/// One conversational unit derived from an intervention.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Stable identifier: `<category>:<slug of title>`.
    pub id: String,
    pub category: Category,
    pub title: String,
    pub chat_prompt: String,
    pub frequency: Frequency,
    pub difficulty: Difficulty,
    /// Human-readable completion criterion.
    pub success_metric: String,
    pub follow_up_questions: Vec<String>,
}
