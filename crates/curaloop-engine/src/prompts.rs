//! Conversation text: per-category templates, persona, and deterministic
//! reply templates used when no language model is available.

use curaloop_core::types::{Category, CognitiveTier};

/// Opening prompt for crisis support sessions, asked before any activity.
pub const CRISIS_TRIAGE_PROMPT: &str = "I'm here to help. Are you safe right now?";

/// Sent once the pending queue is empty.
pub const CLOSING_MESSAGE: &str =
    "Great job! We've covered everything for today. Is there anything else you'd like to discuss?";

/// Prompt of the generic activity used when a chat type matches nothing.
pub const GENERIC_PROMPT: &str = "How are you feeling today?";

const COMPANION_PERSONA: &str = "You are a warm, patient and empathetic care companion \
talking with a person who is following a treatment plan. Keep replies short, kind and \
encouraging. Never give medical diagnoses. If the person mentions danger or an emergency, \
encourage them to contact their caregiver or emergency services.";

/// Static text attached to one category.
#[derive(Debug)]
pub struct CategoryTemplate {
    /// Full question used at normal and mild tiers.
    pub question: &'static str,
    /// Single-clause question used at the severe tier.
    pub simple_question: &'static str,
    pub success_metric: &'static str,
    pub follow_ups: [&'static str; 3],
    /// Title of the activity generated for a category with no interventions.
    pub default_title: &'static str,
}

static MEDICATION: CategoryTemplate = CategoryTemplate {
    question: "Have you taken your medication today?",
    simple_question: "Did you take your medicine today?",
    success_metric: "Patient confirms medication taken",
    follow_ups: [
        "How are you feeling after taking your medication?",
        "Are you experiencing any side effects?",
        "Do you need help remembering to take your medication?",
    ],
    default_title: "Medication check",
};

static LIFESTYLE: CategoryTemplate = CategoryTemplate {
    question: "How has your daily routine been going?",
    simple_question: "Did you keep your routine today?",
    success_metric: "Patient reports following the routine",
    follow_ups: [
        "What part of your routine went well?",
        "Is anything making your routine harder?",
        "Would a small change make it easier?",
    ],
    default_title: "Daily routine",
};

static PHYSICAL_ACTIVITY: CategoryTemplate = CategoryTemplate {
    question: "Have you been able to stay active this week?",
    simple_question: "Did you go for a walk today?",
    success_metric: "Patient reports physical activity",
    follow_ups: [
        "How did the exercise make you feel?",
        "What was the most challenging part?",
        "Would you like to try a different type of activity?",
    ],
    default_title: "Staying active",
};

static NUTRITION: CategoryTemplate = CategoryTemplate {
    question: "How has your eating been lately?",
    simple_question: "Did you eat a meal today?",
    success_metric: "Patient reports regular meals",
    follow_ups: [
        "How did the meal taste?",
        "Are you feeling satisfied?",
        "Would you like suggestions for similar healthy meals?",
    ],
    default_title: "Healthy eating",
};

static SLEEP: CategoryTemplate = CategoryTemplate {
    question: "How has your sleep been recently?",
    simple_question: "Did you sleep well?",
    success_metric: "Patient reports restful sleep",
    follow_ups: [
        "How did you sleep last night?",
        "Do you feel rested?",
        "Is there anything keeping you awake?",
    ],
    default_title: "Sleep routine",
};

static COGNITIVE: CategoryTemplate = CategoryTemplate {
    question: "Would you like to try a memory exercise?",
    simple_question: "Shall we play a memory game?",
    success_metric: "Patient completes the exercise",
    follow_ups: [
        "How did that exercise feel?",
        "Was it too easy or too difficult?",
        "Would you like to try something different?",
    ],
    default_title: "Memory exercise",
};

static SOCIAL: CategoryTemplate = CategoryTemplate {
    question: "Have you been spending time with loved ones?",
    simple_question: "Did you talk to someone today?",
    success_metric: "Patient reports social contact",
    follow_ups: [
        "How did the interaction go?",
        "Do you feel more connected?",
        "Would you like to plan more social activities?",
    ],
    default_title: "Staying connected",
};

static MEDICAL: CategoryTemplate = CategoryTemplate {
    question: "Do you have any upcoming medical appointments?",
    simple_question: "Did you see your doctor?",
    success_metric: "Patient confirms appointments are on track",
    follow_ups: [
        "How did the appointment go?",
        "Do you have any questions about your health?",
        "Is there anything you'd like to discuss with your doctor?",
    ],
    default_title: "Health appointments",
};

static SAFETY: CategoryTemplate = CategoryTemplate {
    question: "Do you feel safe at home?",
    simple_question: "Do you feel safe?",
    success_metric: "Patient confirms feeling safe",
    follow_ups: [
        "Do you feel safe and secure?",
        "Are there any concerns you'd like to discuss?",
        "Do you need help with any safety measures?",
    ],
    default_title: "Home safety",
};

static GENERAL: CategoryTemplate = CategoryTemplate {
    question: "How are you feeling about this today?",
    simple_question: "How are you feeling today?",
    success_metric: "Patient responds to the check-in",
    follow_ups: [
        "How are you feeling about this?",
        "Is there anything you'd like help with?",
        "What would make today a little easier?",
    ],
    default_title: "General wellbeing",
};

pub fn template(category: Category) -> &'static CategoryTemplate {
    match category {
        Category::Medication => &MEDICATION,
        Category::Lifestyle => &LIFESTYLE,
        Category::PhysicalActivity => &PHYSICAL_ACTIVITY,
        Category::Nutrition => &NUTRITION,
        Category::Sleep => &SLEEP,
        Category::Cognitive => &COGNITIVE,
        Category::Social => &SOCIAL,
        Category::Medical => &MEDICAL,
        Category::Safety => &SAFETY,
        Category::General => &GENERAL,
    }
}

/// Opening prompt for an activity, phrased for the patient's tier.
///
/// Severe prompts are a single short question and omit the title so the
/// same words come back every session.
pub fn chat_prompt(category: Category, title: &str, tier: CognitiveTier) -> String {
    let t = template(category);
    match tier {
        CognitiveTier::Severe => t.simple_question.to_string(),
        CognitiveTier::Mild => format!("It's time for {}, and I'm here to help. {}", title, t.question),
        CognitiveTier::Normal => format!("Let's talk about {}. {}", title, t.question),
    }
}

/// Follow-up questions for an activity. The severe tier repeats one question.
pub fn follow_up_questions(category: Category, tier: CognitiveTier) -> Vec<String> {
    let t = template(category);
    match tier {
        CognitiveTier::Severe => vec![t.follow_ups[0].to_string()],
        _ => t.follow_ups.iter().map(|q| q.to_string()).collect(),
    }
}

/// System persona sent to the language model.
pub fn persona(personality: Option<&str>, tier: CognitiveTier) -> String {
    let base = personality
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(COMPANION_PERSONA);
    let style = match tier {
        CognitiveTier::Severe => {
            "Use very short sentences with one idea each. Ask one simple question at a time."
        }
        CognitiveTier::Mild => "Use simple words and at most two short sentences.",
        CognitiveTier::Normal => "Use natural, friendly language.",
    };
    format!("{} {}", base, style)
}

// =============================================================================
// Fallback replies
// =============================================================================

/// Acknowledge a completed activity and move to the next prompt.
pub fn acknowledge(title: &str, next_prompt: &str, tier: CognitiveTier) -> String {
    match tier {
        CognitiveTier::Severe => format!("Well done! {}", next_prompt),
        _ => format!("Thank you for sharing that. Great work on {}! {}", title, next_prompt),
    }
}

/// Closing reply, acknowledging the last activity when one was just finished.
pub fn closing(completed_title: Option<&str>) -> String {
    match completed_title {
        Some(title) => format!("Great work on {}! {}", title, CLOSING_MESSAGE),
        None => CLOSING_MESSAGE.to_string(),
    }
}

/// Empathetic framing around a follow-up question.
pub fn follow_up(question: &str, negative: bool) -> String {
    if negative {
        format!("I'm sorry to hear that. It's okay if this is hard. {}", question)
    } else {
        format!("Thank you for telling me. {}", question)
    }
}

/// Reply to the crisis triage answer.
pub fn triage_reply(negative: bool, next_prompt: &str) -> String {
    if negative {
        format!(
            "Thank you for telling me. If you are in danger, please contact your caregiver \
             or emergency services right away. {}",
            next_prompt
        )
    } else {
        format!("I'm glad you're here. {}", next_prompt)
    }
}
