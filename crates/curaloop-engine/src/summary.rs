//! Session summarizer.
//!
//! Aggregates the analyses already recorded in a transcript. Nothing is
//! reclassified, so summarizing the same session twice gives the same result.

use chrono::{DateTime, Utc};

use curaloop_core::session::{
    CompletedActivitySummary, EngagementLevel, Session, SentimentDistribution, SessionSummary,
    TranscriptEntry,
};

pub const CAREGIVER_FOLLOW_UP: &str = "Suggest caregiver follow-up";
pub const SHORTER_CHECK_INS: &str = "Consider shorter, more frequent check-ins";
pub const SIMPLER_LANGUAGE: &str = "Use more visual cues and simple language";
pub const DISTRESS_REVIEW: &str = "Review recent distress signals with the care team";
pub const FEWER_ACTIVITIES: &str = "Focus on fewer activities per session";
pub const MORE_ENCOURAGEMENT: &str = "Provide more encouragement and positive reinforcement";
pub const CAREGIVER_CHALLENGES: &str = "Follow up with caregiver about challenges";
pub const ADJUST_DIFFICULTY: &str = "Consider adjusting treatment plan difficulty";

/// Fewer completions than this, with activities left over, suggests a
/// lighter session.
pub const FEW_COMPLETIONS_BELOW: usize = 3;
/// More negative turns than this suggests the plan is too hard.
pub const MANY_NEGATIVE_ABOVE: usize = 2;

/// Mean engagement weight across turns (high=3, medium=2, low=1), rounded to
/// two decimals. Zero turns score zero.
pub fn engagement_score(transcript: &[TranscriptEntry]) -> f64 {
    if transcript.is_empty() {
        return 0.0;
    }
    let total: u32 = transcript.iter().map(|t| t.analysis.engagement.weight()).sum();
    round2(f64::from(total) / transcript.len() as f64)
}

pub fn overall_engagement(transcript: &[TranscriptEntry]) -> EngagementLevel {
    let score = engagement_score(transcript);
    if score >= 2.5 {
        EngagementLevel::High
    } else if score >= 1.5 {
        EngagementLevel::Medium
    } else {
        EngagementLevel::Low
    }
}

/// Longest run of consecutive negative turns.
pub fn longest_negative_streak(transcript: &[TranscriptEntry]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for entry in transcript {
        if entry.analysis.sentiment.is_negative() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Summarize a session as of `ended_at`.
pub fn summarize(
    session: &Session,
    ended_at: DateTime<Utc>,
    negative_streak_threshold: usize,
) -> SessionSummary {
    let duration_secs = (ended_at - session.created_at).num_seconds().max(0);

    let mut distribution = SentimentDistribution::default();
    for entry in &session.transcript {
        distribution.record(entry.analysis.sentiment);
    }

    let attempted = session.activities.len();
    let completed = session.completed.len();
    let turns = session.transcript.len();
    let engagement = overall_engagement(&session.transcript);

    let mut recommendations = Vec::new();
    if distribution.negative * 2 > turns || completed * 2 < attempted {
        recommendations.push(CAREGIVER_FOLLOW_UP.to_string());
    }
    if turns > 0 && engagement == EngagementLevel::Low {
        recommendations.push(SHORTER_CHECK_INS.to_string());
        recommendations.push(SIMPLER_LANGUAGE.to_string());
    }
    if completed < FEW_COMPLETIONS_BELOW && completed < attempted {
        recommendations.push(FEWER_ACTIVITIES.to_string());
        recommendations.push(MORE_ENCOURAGEMENT.to_string());
    }
    if distribution.negative > MANY_NEGATIVE_ABOVE {
        recommendations.push(CAREGIVER_CHALLENGES.to_string());
        recommendations.push(ADJUST_DIFFICULTY.to_string());
    }
    if negative_streak_threshold > 0
        && longest_negative_streak(&session.transcript) >= negative_streak_threshold
    {
        recommendations.push(DISTRESS_REVIEW.to_string());
    }

    SessionSummary {
        session_id: session.id,
        patient_id: session.patient_id.clone(),
        chat_type: session.chat_type,
        started_at: session.created_at,
        ended_at,
        duration_secs,
        duration_minutes: round2(duration_secs as f64 / 60.0),
        activities_attempted: attempted,
        activities_completed: completed,
        completed_activities: session
            .completed
            .iter()
            .map(|c| CompletedActivitySummary {
                activity_id: c.activity_id.clone(),
                title: c.title.clone(),
                completed_at: c.completed_at,
                metrics: c.metrics,
            })
            .collect(),
        total_interactions: turns,
        sentiment_distribution: distribution,
        overall_engagement: engagement,
        recommendations,
    }
}
