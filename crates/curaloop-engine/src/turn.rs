//! Turn processor.
//!
//! Applies one patient message to a session: classify, decide completion,
//! pick the next prompt or a follow-up, phrase the reply, append the turn.
//!
//! A turn makes at most one language model call. With a delegated
//! classifier that call is the classification, and the reply comes from
//! the deterministic template.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use curaloop_core::session::{
    CompletedActivity, CompletionMetrics, ReplySource, Session, TranscriptEntry, TurnAnalysis,
};
use curaloop_core::types::{Activity, CognitiveTier};

use crate::classifier::{Classification, LexicalClassifier, TurnClassifier};
use crate::cues::CueSet;
use crate::language::{GuardedLanguage, LanguageRequest, Message};
use crate::prompts;

/// How many follow-up questions to surface alongside a new prompt.
const NEXT_FOLLOW_UPS: usize = 2;

/// Patient-level settings that shape the reply.
#[derive(Debug, Clone, Copy)]
pub struct TurnStyle<'a> {
    pub tier: CognitiveTier,
    pub personality: Option<&'a str>,
}

/// Result of applying one message.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub analysis: TurnAnalysis,
    pub reply: String,
    pub reply_source: ReplySource,
    pub follow_up_questions: Vec<String>,
    /// Title of the activity completed by this message.
    pub completed_activity: Option<String>,
    pub conversation_complete: bool,
    pub next_steps: Vec<String>,
}

/// What the reply has to accomplish, before phrasing.
struct Plan {
    fallback: String,
    guidance: String,
    follow_up_questions: Vec<String>,
    completed_activity: Option<String>,
    conversation_complete: bool,
    next_steps: Vec<String>,
}

fn steps(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn closing_steps() -> Vec<String> {
    steps(&["End conversation", "Review progress"])
}

fn next_follow_ups(activity: &Activity) -> Vec<String> {
    activity
        .follow_up_questions
        .iter()
        .take(NEXT_FOLLOW_UPS)
        .cloned()
        .collect()
}

pub struct TurnProcessor {
    cues: Arc<CueSet>,
    lexical: LexicalClassifier,
    delegated: Option<Arc<dyn TurnClassifier>>,
    language: GuardedLanguage,
    context_turns: usize,
}

impl TurnProcessor {
    pub fn new(
        cues: Arc<CueSet>,
        delegated: Option<Arc<dyn TurnClassifier>>,
        language: GuardedLanguage,
        context_turns: usize,
    ) -> Self {
        Self {
            lexical: LexicalClassifier::new(cues.clone()),
            cues,
            delegated,
            language,
            context_turns,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.delegated.as_ref().map_or("lexical", |c| c.name())
    }

    pub fn language(&self) -> &GuardedLanguage {
        &self.language
    }

    async fn classify(&self, message: &str) -> Classification {
        if let Some(ref delegated) = self.delegated {
            match delegated.classify(message).await {
                Ok(c) => return c,
                Err(e) => warn!(error = %e, "Delegated classification failed, using lexical cues"),
            }
        }
        self.lexical.analyze(message)
    }

    /// Apply `message` to `session`. The caller owns persistence; on return
    /// the session holds the new transcript entry and queue state.
    pub async fn process(
        &self,
        session: &mut Session,
        message: &str,
        style: TurnStyle<'_>,
        now: DateTime<Utc>,
    ) -> TurnOutcome {
        let c = self.classify(message).await;
        let head = session.current_activity().cloned();
        let negative = c.sentiment.is_negative();

        let completed = !session.triage_pending
            && !negative
            && head
                .as_ref()
                .is_some_and(|a| self.cues.mentions_category(a.category, message));

        let analysis = TurnAnalysis {
            sentiment: c.sentiment,
            engagement: c.engagement,
            activity_completed: completed,
            response_length: message.chars().count(),
        };

        let plan = if session.triage_pending {
            session.triage_pending = false;
            self.plan_triage(session, negative)
        } else {
            match head {
                None => Plan {
                    fallback: prompts::closing(None),
                    guidance: "Thank the person warmly and close the conversation.".to_string(),
                    follow_up_questions: Vec::new(),
                    completed_activity: None,
                    conversation_complete: true,
                    next_steps: closing_steps(),
                },
                Some(ref activity) if completed => {
                    self.complete(session, activity, message, analysis, now, style.tier)
                }
                Some(ref activity) => self.follow_up(session, activity, negative),
            }
        };

        let (reply, reply_source) = if self.delegated.is_some() {
            (plan.fallback, ReplySource::Fallback)
        } else {
            let request = self.request(session, message, &plan, style);
            self.language.generate_or(&request, plan.fallback).await
        };

        session.transcript.push(TranscriptEntry {
            timestamp: now,
            patient_message: message.to_string(),
            chatbot_response: reply.clone(),
            analysis,
            activity_id: head.map(|a| a.id),
            reply_source,
        });
        session.last_activity_at = now;

        debug!(
            session_id = %session.id,
            sentiment = ?analysis.sentiment,
            completed,
            remaining = session.pending.len(),
            "Turn processed"
        );

        TurnOutcome {
            analysis,
            reply,
            reply_source,
            follow_up_questions: plan.follow_up_questions,
            completed_activity: plan.completed_activity,
            conversation_complete: plan.conversation_complete,
            next_steps: plan.next_steps,
        }
    }

    fn plan_triage(&self, session: &Session, negative: bool) -> Plan {
        let mut next_steps = if negative {
            steps(&["Contact caregiver or emergency services", "Provide support"])
        } else {
            steps(&["Continue check-in"])
        };
        match session.current_activity() {
            Some(next) => Plan {
                fallback: prompts::triage_reply(negative, &next.chat_prompt),
                guidance: format!(
                    "The person just answered whether they are safe. {}Then ask: \"{}\"",
                    if negative {
                        "Urge them to contact their caregiver or emergency services now. "
                    } else {
                        ""
                    },
                    next.chat_prompt
                ),
                follow_up_questions: next_follow_ups(next),
                completed_activity: None,
                conversation_complete: false,
                next_steps,
            },
            None => {
                next_steps.extend(closing_steps());
                Plan {
                    fallback: prompts::triage_reply(negative, prompts::CLOSING_MESSAGE),
                    guidance: "The person just answered whether they are safe. Close the conversation kindly.".to_string(),
                    follow_up_questions: Vec::new(),
                    completed_activity: None,
                    conversation_complete: true,
                    next_steps,
                }
            }
        }
    }

    fn complete(
        &self,
        session: &mut Session,
        activity: &Activity,
        message: &str,
        analysis: TurnAnalysis,
        now: DateTime<Utc>,
        tier: CognitiveTier,
    ) -> Plan {
        session.pending.pop_front();
        session.completed.push(CompletedActivity {
            activity_id: activity.id.clone(),
            title: activity.title.clone(),
            completed_at: now,
            patient_response: message.to_string(),
            metrics: CompletionMetrics {
                sentiment: analysis.sentiment,
                engagement: analysis.engagement,
                response_length: analysis.response_length,
            },
        });

        match session.current_activity() {
            Some(next) => Plan {
                fallback: prompts::acknowledge(&activity.title, &next.chat_prompt, tier),
                guidance: format!(
                    "The person has just finished \"{}\". Praise them briefly, then ask: \"{}\"",
                    activity.title, next.chat_prompt
                ),
                follow_up_questions: next_follow_ups(next),
                completed_activity: Some(activity.title.clone()),
                conversation_complete: false,
                next_steps: steps(&["Move to next activity", "Continue check-in"]),
            },
            None => Plan {
                fallback: prompts::closing(Some(&activity.title)),
                guidance: format!(
                    "The person has just finished \"{}\", the last item for today. Praise them and \
                     close the conversation, asking if there is anything else they want to discuss.",
                    activity.title
                ),
                follow_up_questions: Vec::new(),
                completed_activity: Some(activity.title.clone()),
                conversation_complete: true,
                next_steps: closing_steps(),
            },
        }
    }

    fn follow_up(&self, session: &mut Session, activity: &Activity, negative: bool) -> Plan {
        let attempts = session
            .follow_up_attempts
            .entry(activity.id.clone())
            .or_insert(0);
        let question = if activity.follow_up_questions.is_empty() {
            format!("Can you tell me more about {}?", activity.title)
        } else {
            let idx = *attempts as usize % activity.follow_up_questions.len();
            activity.follow_up_questions[idx].clone()
        };
        *attempts += 1;

        Plan {
            fallback: prompts::follow_up(&question, negative),
            guidance: format!(
                "You are discussing \"{}\" and it is not finished yet. {}Then ask: \"{}\"",
                activity.title,
                if negative {
                    "Acknowledge their feelings with empathy. "
                } else {
                    "Thank them for sharing. "
                },
                question
            ),
            follow_up_questions: vec![question],
            completed_activity: None,
            conversation_complete: false,
            next_steps: if negative {
                steps(&["Discuss challenges", "Adjust activity", "Provide support"])
            } else {
                steps(&["Continue discussion", "Clarify activity"])
            },
        }
    }

    fn request(
        &self,
        session: &Session,
        message: &str,
        plan: &Plan,
        style: TurnStyle<'_>,
    ) -> LanguageRequest {
        let skip = session.transcript.len().saturating_sub(self.context_turns);
        let mut history = Vec::with_capacity(self.context_turns * 2);
        for entry in session.transcript.iter().skip(skip) {
            history.push(Message::user(entry.patient_message.clone()));
            history.push(Message::assistant(entry.chatbot_response.clone()));
        }
        LanguageRequest {
            system: format!(
                "{}\n\nConversation type: {}. {}",
                prompts::persona(style.personality, style.tier),
                session.chat_type,
                plan.guidance
            ),
            history,
            user_text: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::testing::{FailingModel, ScriptedModel};
    use crate::language::LanguageError;
    use curaloop_core::session::Sentiment;
    use curaloop_core::types::{Category, ChatType, Difficulty, Frequency};
    use std::time::Duration;
    use uuid::Uuid;

    const NORMAL: TurnStyle<'static> = TurnStyle {
        tier: CognitiveTier::Normal,
        personality: None,
    };

    fn activity(id: &str, category: Category, follow_ups: &[&str]) -> Activity {
        Activity {
            id: id.to_string(),
            category,
            title: id.to_string(),
            chat_prompt: format!("Prompt for {}", id),
            frequency: Frequency::Daily,
            difficulty: Difficulty::Easy,
            success_metric: String::new(),
            follow_up_questions: follow_ups.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn session(chat_type: ChatType) -> Session {
        Session::new(
            Uuid::new_v4(),
            "p1",
            chat_type,
            vec![
                activity("med", Category::Medication, &["Q1?", "Q2?"]),
                activity("walk", Category::PhysicalActivity, &[]),
            ],
            Utc::now(),
        )
    }

    fn processor(language: GuardedLanguage) -> TurnProcessor {
        TurnProcessor::new(Arc::new(CueSet::default()), None, language, 10)
    }

    #[tokio::test]
    async fn test_completion_moves_activity() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);

        let out = p
            .process(&mut s, "I took my medicine this morning", NORMAL, Utc::now())
            .await;

        assert_eq!(out.analysis.sentiment, Sentiment::Positive);
        assert!(out.analysis.activity_completed);
        assert_eq!(out.completed_activity.as_deref(), Some("med"));
        assert!(!out.conversation_complete);
        assert!(out.reply.contains("Prompt for walk"));
        assert_eq!(out.next_steps, vec!["Move to next activity", "Continue check-in"]);
        assert_eq!(s.pending, vec!["walk".to_string()]);
        assert_eq!(s.completed[0].activity_id, "med");
        assert_eq!(s.transcript.len(), 1);
        assert_eq!(s.transcript[0].activity_id.as_deref(), Some("med"));
        assert!(s.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_uncertain_reply_gets_follow_up() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);

        let out = p.process(&mut s, "I don't know", NORMAL, Utc::now()).await;
        assert!(!out.analysis.activity_completed);
        assert_eq!(out.follow_up_questions, vec!["Q1?".to_string()]);
        assert!(out.reply.ends_with("Q1?"));
        assert_eq!(out.next_steps, vec!["Continue discussion", "Clarify activity"]);
        assert_eq!(s.pending.front().map(String::as_str), Some("med"));
        assert!(s.completed.is_empty());
    }

    #[tokio::test]
    async fn test_follow_ups_cycle() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);
        let mut asked = Vec::new();
        for _ in 0..3 {
            let out = p.process(&mut s, "hmm", NORMAL, Utc::now()).await;
            asked.push(out.follow_up_questions[0].clone());
        }
        assert_eq!(asked, vec!["Q1?", "Q2?", "Q1?"]);
    }

    #[tokio::test]
    async fn test_default_follow_up_without_questions() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);
        p.process(&mut s, "took my pills", NORMAL, Utc::now()).await;
        let out = p.process(&mut s, "it rained", NORMAL, Utc::now()).await;
        assert_eq!(
            out.follow_up_questions,
            vec!["Can you tell me more about walk?".to_string()]
        );
    }

    #[tokio::test]
    async fn test_negative_reply_never_completes() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);
        let out = p
            .process(&mut s, "I forgot my medicine, I feel terrible", NORMAL, Utc::now())
            .await;
        assert_eq!(out.analysis.sentiment, Sentiment::Negative);
        assert!(!out.analysis.activity_completed);
        assert!(out.reply.starts_with("I'm sorry to hear that."));
        assert_eq!(
            out.next_steps,
            vec!["Discuss challenges", "Adjust activity", "Provide support"]
        );
    }

    #[tokio::test]
    async fn test_last_completion_closes() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);
        p.process(&mut s, "took my pills", NORMAL, Utc::now()).await;
        let out = p.process(&mut s, "yes I walked today", NORMAL, Utc::now()).await;
        assert!(out.conversation_complete);
        assert!(out.reply.ends_with(prompts::CLOSING_MESSAGE));
        assert!(s.pending.is_empty());

        let out = p.process(&mut s, "bye", NORMAL, Utc::now()).await;
        assert!(out.conversation_complete);
        assert!(!out.analysis.activity_completed);
        assert_eq!(out.reply, prompts::CLOSING_MESSAGE);
        assert_eq!(s.transcript.len(), 3);
        assert!(s.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_crisis_triage_completes_nothing() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::CrisisSupport);

        let out = p
            .process(&mut s, "No, I'm scared, I took my pills twice", NORMAL, Utc::now())
            .await;
        assert!(!out.analysis.activity_completed);
        assert!(s.completed.is_empty());
        assert!(!s.triage_pending);
        assert!(out.reply.contains("emergency services"));
        assert!(out.reply.ends_with("Prompt for med"));
        assert_eq!(out.next_steps[0], "Contact caregiver or emergency services");

        let out = p.process(&mut s, "I took my medicine", NORMAL, Utc::now()).await;
        assert!(out.analysis.activity_completed);
    }

    #[tokio::test]
    async fn test_model_phrasing_with_context() {
        let model = Arc::new(ScriptedModel::new("Wonderful, well done!"));
        let p = processor(GuardedLanguage::new(Some(model.clone()), Duration::from_secs(1)));
        let mut s = session(ChatType::DailyCheckIn);

        p.process(&mut s, "hmm", NORMAL, Utc::now()).await;
        let out = p.process(&mut s, "I took my medicine", NORMAL, Utc::now()).await;

        assert_eq!(out.reply, "Wonderful, well done!");
        assert_eq!(out.reply_source, ReplySource::LanguageModel);
        assert_eq!(s.transcript[1].reply_source, ReplySource::LanguageModel);
        assert_eq!(model.calls(), 2);

        let requests = model.requests.lock().unwrap();
        let last = &requests[1];
        assert_eq!(last.user_text, "I took my medicine");
        assert_eq!(last.history.len(), 2);
        assert!(last.system.contains("Prompt for walk"));
        assert!(last.system.contains("daily_check_in"));
    }

    #[tokio::test]
    async fn test_context_window_is_bounded() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let p = TurnProcessor::new(
            Arc::new(CueSet::default()),
            None,
            GuardedLanguage::new(Some(model.clone()), Duration::from_secs(1)),
            2,
        );
        let mut s = session(ChatType::DailyCheckIn);
        for _ in 0..5 {
            p.process(&mut s, "hmm", NORMAL, Utc::now()).await;
        }
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[4].history.len(), 4);
    }

    #[tokio::test]
    async fn test_model_failure_still_completes_turn() {
        let p = processor(GuardedLanguage::new(
            Some(Arc::new(FailingModel::new(LanguageError::RateLimited))),
            Duration::from_secs(1),
        ));
        let mut s = session(ChatType::DailyCheckIn);
        let out = p.process(&mut s, "I took my medicine", NORMAL, Utc::now()).await;
        assert_eq!(out.reply_source, ReplySource::Fallback);
        assert!(out.reply.contains("Prompt for walk"));
        assert!(out.analysis.activity_completed);
    }

    #[tokio::test]
    async fn test_delegated_classifier_replaces_lexical() {
        let classifier_model = Arc::new(ScriptedModel::new(
            r#"{"sentiment": "negative", "engagement": "medium"}"#,
        ));
        let delegated = crate::classifier::LanguageModelClassifier::new(GuardedLanguage::new(
            Some(classifier_model.clone()),
            Duration::from_secs(1),
        ));
        let p = TurnProcessor::new(
            Arc::new(CueSet::default()),
            Some(Arc::new(delegated)),
            GuardedLanguage::disabled(),
            10,
        );
        assert_eq!(p.classifier_name(), "language_model");

        let mut s = session(ChatType::DailyCheckIn);
        let out = p.process(&mut s, "I took my medicine", NORMAL, Utc::now()).await;
        assert_eq!(out.analysis.sentiment, Sentiment::Negative);
        assert_eq!(out.analysis.engagement, curaloop_core::session::EngagementLevel::Medium);
        assert!(!out.analysis.activity_completed);
        assert_eq!(classifier_model.calls(), 1);
    }

    #[tokio::test]
    async fn test_delegated_turn_skips_phrasing_call() {
        let classifier_model = Arc::new(ScriptedModel::new(
            r#"{"sentiment": "positive", "engagement": "low"}"#,
        ));
        let phrasing_model = Arc::new(ScriptedModel::new("Wonderful!"));
        let delegated = crate::classifier::LanguageModelClassifier::new(GuardedLanguage::new(
            Some(classifier_model.clone()),
            Duration::from_secs(1),
        ));
        let p = TurnProcessor::new(
            Arc::new(CueSet::default()),
            Some(Arc::new(delegated)),
            GuardedLanguage::new(Some(phrasing_model.clone()), Duration::from_secs(1)),
            10,
        );

        let mut s = session(ChatType::DailyCheckIn);
        let out = p.process(&mut s, "I took my medicine", NORMAL, Utc::now()).await;
        assert!(out.analysis.activity_completed);
        assert_eq!(out.reply_source, ReplySource::Fallback);
        assert!(out.reply.contains("Prompt for walk"));
        assert_eq!(classifier_model.calls(), 1);
        assert_eq!(phrasing_model.calls(), 0);
    }

    #[tokio::test]
    async fn test_delegated_failure_falls_back_to_lexical() {
        let delegated = crate::classifier::LanguageModelClassifier::new(GuardedLanguage::new(
            Some(Arc::new(FailingModel::new(LanguageError::ServiceUnavailable(
                "down".to_string(),
            )))),
            Duration::from_secs(1),
        ));
        let p = TurnProcessor::new(
            Arc::new(CueSet::default()),
            Some(Arc::new(delegated)),
            GuardedLanguage::disabled(),
            10,
        );
        let mut s = session(ChatType::DailyCheckIn);
        let out = p.process(&mut s, "I took my medicine", NORMAL, Utc::now()).await;
        assert_eq!(out.analysis.sentiment, Sentiment::Positive);
        assert!(out.analysis.activity_completed);
    }

    #[tokio::test]
    async fn test_severe_acknowledgement_is_short() {
        let p = processor(GuardedLanguage::disabled());
        let mut s = session(ChatType::DailyCheckIn);
        let style = TurnStyle {
            tier: CognitiveTier::Severe,
            personality: None,
        };
        let out = p.process(&mut s, "took my pills", style, Utc::now()).await;
        assert_eq!(out.reply, "Well done! Prompt for walk");
    }
}
