//! Activity catalog builder.
//!
//! Turns a treatment plan into a flat, deduplicated list of activities,
//! capped per category by the patient's cognitive tier. Pure: no I/O, no
//! clock, same inputs always give the same catalog.

use std::collections::{HashMap, HashSet};

use curaloop_core::types::{
    Activity, Category, ChatbotConfig, CognitiveTier, Difficulty, Frequency, TreatmentPlan,
};

use crate::error::{EngineError, Result};
use crate::prompts;

/// Build the activity catalog for a plan and configuration.
///
/// Categories keep their plan order and interventions keep their order
/// within a category. Each category is truncated to the tier's cap after
/// duplicates (same category and title) are removed.
pub fn build(plan: &TreatmentPlan, config: &ChatbotConfig) -> Result<Vec<Activity>> {
    if plan.categories.is_empty() {
        return Err(EngineError::InvalidPlan(
            "treatment plan has no categories".to_string(),
        ));
    }
    let tier = config.tier().map_err(EngineError::InvalidConfig)?;
    let cap = tier.activity_cap().unwrap_or(usize::MAX);

    let mut catalog = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut per_category: HashMap<Category, usize> = HashMap::new();

    for section in &plan.categories {
        let mut titles: Vec<(&str, Option<Frequency>)> = Vec::new();
        for (idx, intervention) in section.interventions.iter().enumerate() {
            let title = intervention.description.trim();
            if title.is_empty() {
                return Err(EngineError::InvalidPlan(format!(
                    "intervention {} in category {} has an empty description",
                    idx, section.category
                )));
            }
            titles.push((title, intervention.frequency));
        }
        if titles.is_empty() && !per_category.contains_key(&section.category) {
            titles.push((prompts::template(section.category).default_title, None));
        }

        for (title, frequency) in titles {
            let count = per_category.entry(section.category).or_insert(0);
            if *count >= cap {
                break;
            }
            let id = activity_id(section.category, title, count_hint(&seen, section.category));
            if !seen.insert(id.clone()) {
                continue;
            }
            *count += 1;
            catalog.push(make_activity(id, section.category, title, frequency, tier));
        }
    }

    Ok(catalog)
}

/// The single activity used when a chat type selects nothing.
pub fn generic_activity() -> Activity {
    let t = prompts::template(Category::General);
    Activity {
        id: "general:check-in".to_string(),
        category: Category::General,
        title: "Check-in".to_string(),
        chat_prompt: prompts::GENERIC_PROMPT.to_string(),
        frequency: Frequency::Daily,
        difficulty: Difficulty::Easy,
        success_metric: t.success_metric.to_string(),
        follow_up_questions: t.follow_ups.iter().map(|q| q.to_string()).collect(),
    }
}

fn make_activity(
    id: String,
    category: Category,
    title: &str,
    frequency: Option<Frequency>,
    tier: CognitiveTier,
) -> Activity {
    let frequency = match tier {
        CognitiveTier::Severe => Frequency::Daily,
        _ => frequency.unwrap_or_else(|| infer_frequency(title, category)),
    };
    let difficulty = match (tier, infer_difficulty(title)) {
        (CognitiveTier::Severe, _) => Difficulty::Easy,
        (CognitiveTier::Mild, Difficulty::Hard) => Difficulty::Easy,
        (_, d) => d,
    };

    Activity {
        id,
        category,
        title: title.to_string(),
        chat_prompt: prompts::chat_prompt(category, title, tier),
        frequency,
        difficulty,
        success_metric: prompts::template(category).success_metric.to_string(),
        follow_up_questions: prompts::follow_up_questions(category, tier),
    }
}

/// Stable id `<category>:<slug>`. Titles with no usable characters fall back
/// to a positional slug.
fn activity_id(category: Category, title: &str, position: usize) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}:item-{}", category, position + 1)
    } else {
        format!("{}:{}", category, slug)
    }
}

fn count_hint(seen: &HashSet<String>, category: Category) -> usize {
    let prefix = format!("{}:", category);
    seen.iter().filter(|id| id.starts_with(&prefix)).count()
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn infer_frequency(title: &str, category: Category) -> Frequency {
    let lower = title.to_lowercase();
    if contains_any(&lower, &["daily", "every day", "routine", "medication"]) {
        Frequency::Daily
    } else if contains_any(&lower, &["weekly", "exercise", "appointment"]) {
        Frequency::Weekly
    } else if contains_any(&lower, &["monthly", "review", "assessment"]) {
        Frequency::Monthly
    } else if contains_any(&lower, &["urgent", "immediate", "emergency"]) {
        Frequency::AsNeeded
    } else {
        match category {
            Category::Medication | Category::Sleep => Frequency::Daily,
            _ => Frequency::Weekly,
        }
    }
}

fn infer_difficulty(title: &str) -> Difficulty {
    let lower = title.to_lowercase();
    if contains_any(&lower, &["simple", "basic", "easy", "reminder"]) {
        Difficulty::Easy
    } else if contains_any(&lower, &["complex", "comprehensive", "detailed", "evaluation"]) {
        Difficulty::Hard
    } else {
        Difficulty::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curaloop_core::types::{Intervention, PlanCategory};

    fn plan(sections: Vec<(Category, Vec<&str>)>) -> TreatmentPlan {
        TreatmentPlan {
            categories: sections
                .into_iter()
                .map(|(category, items)| PlanCategory {
                    category,
                    interventions: items.into_iter().map(Intervention::new).collect(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn config(tier: &str) -> ChatbotConfig {
        ChatbotConfig {
            cognitive_tier: Some(tier.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_medication_intervention() {
        let plan = plan(vec![(Category::Medication, vec!["Take donepezil 5mg"])]);
        let catalog = build(&plan, &config("normal")).unwrap();

        assert_eq!(catalog.len(), 1);
        let activity = &catalog[0];
        assert_eq!(activity.category, Category::Medication);
        assert_eq!(activity.id, "medication:take-donepezil-5mg");
        assert_eq!(activity.frequency, Frequency::Daily);
        assert_eq!(
            activity.chat_prompt,
            "Let's talk about Take donepezil 5mg. Have you taken your medication today?"
        );
        assert_eq!(activity.follow_up_questions.len(), 3);
    }

    #[test]
    fn test_empty_plan_is_invalid() {
        let err = build(&TreatmentPlan::default(), &config("normal")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[test]
    fn test_unknown_tier_is_invalid_config() {
        let plan = plan(vec![(Category::Sleep, vec!["Sleep by 10pm"])]);
        let err = build(&plan, &config("moderate")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_blank_description_is_invalid() {
        let plan = plan(vec![(Category::Sleep, vec!["Sleep by 10pm", "  "])]);
        assert!(matches!(
            build(&plan, &config("normal")),
            Err(EngineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_caps_per_category_preserve_order() {
        let items: Vec<String> = (1..=7).map(|i| format!("Memory task {}", i)).collect();
        let items: Vec<&str> = items.iter().map(String::as_str).collect();
        let plan = plan(vec![
            (Category::Cognitive, items.clone()),
            (Category::Social, vec!["Call a friend"]),
        ]);

        let severe = build(&plan, &config("severe")).unwrap();
        let cognitive: Vec<&str> = severe
            .iter()
            .filter(|a| a.category == Category::Cognitive)
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(cognitive, vec!["Memory task 1", "Memory task 2", "Memory task 3"]);
        assert_eq!(severe.len(), 4);

        let mild = build(&plan, &config("mild")).unwrap();
        assert_eq!(mild.len(), 6);

        let normal = build(&plan, &config("normal")).unwrap();
        assert_eq!(normal.len(), 8);
    }

    #[test]
    fn test_cap_counts_repeated_category_sections() {
        let plan = plan(vec![
            (Category::Sleep, vec!["Sleep a", "Sleep b"]),
            (Category::Sleep, vec!["Sleep c", "Sleep d"]),
        ]);
        let catalog = build(&plan, &config("severe")).unwrap();
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_duplicates_removed() {
        let plan = plan(vec![
            (Category::Medication, vec!["Take aspirin", "Take Aspirin!", "Take vitamin D"]),
            (Category::Social, vec!["Take aspirin"]),
        ]);
        let catalog = build(&plan, &config("normal")).unwrap();
        let ids: Vec<&str> = catalog.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "medication:take-aspirin",
                "medication:take-vitamin-d",
                "social:take-aspirin"
            ]
        );
    }

    #[test]
    fn test_empty_category_gets_default_activity() {
        let plan = plan(vec![(Category::Safety, vec![])]);
        let catalog = build(&plan, &config("normal")).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id, "safety:home-safety");
    }

    #[test]
    fn test_severe_forces_daily_easy() {
        let plan = plan(vec![(
            Category::PhysicalActivity,
            vec!["Comprehensive weekly exercise program"],
        )]);
        let severe = build(&plan, &config("severe")).unwrap();
        assert_eq!(severe[0].frequency, Frequency::Daily);
        assert_eq!(severe[0].difficulty, Difficulty::Easy);
        assert_eq!(severe[0].chat_prompt, "Did you go for a walk today?");

        let mild = build(&plan, &config("mild")).unwrap();
        assert_eq!(mild[0].frequency, Frequency::Weekly);
        assert_eq!(mild[0].difficulty, Difficulty::Easy);

        let normal = build(&plan, &config("normal")).unwrap();
        assert_eq!(normal[0].difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_explicit_frequency_wins() {
        let mut plan = plan(vec![(Category::Social, vec!["Call your daughter"])]);
        plan.categories[0].interventions[0].frequency = Some(Frequency::Daily);
        let catalog = build(&plan, &config("normal")).unwrap();
        assert_eq!(catalog[0].frequency, Frequency::Daily);
    }

    #[test]
    fn test_frequency_inference() {
        assert_eq!(infer_frequency("Monthly review", Category::Medical), Frequency::Monthly);
        assert_eq!(
            infer_frequency("Emergency contact list", Category::Safety),
            Frequency::AsNeeded
        );
        assert_eq!(infer_frequency("Walk in the park", Category::PhysicalActivity), Frequency::Weekly);
        assert_eq!(infer_frequency("Lights out at 10", Category::Sleep), Frequency::Daily);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Take Donepezil, 5mg!  "), "take-donepezil-5mg");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_build_is_deterministic() {
        let plan = plan(vec![
            (Category::Medication, vec!["Take donepezil"]),
            (Category::Sleep, vec!["Sleep by 10pm"]),
        ]);
        let cfg = config("mild");
        assert_eq!(build(&plan, &cfg).unwrap(), build(&plan, &cfg).unwrap());
    }
}
