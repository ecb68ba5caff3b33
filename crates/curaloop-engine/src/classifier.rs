//! Turn classification strategies.
//!
//! [`LexicalClassifier`] is deterministic and needs no external call.
//! [`LanguageModelClassifier`] delegates both labels to the language model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use curaloop_core::session::{EngagementLevel, Sentiment};

use crate::cues::{CueCounts, CueSet};
use crate::language::{GuardedLanguage, LanguageError, LanguageRequest};

/// Fewer tokens than this is low engagement.
pub const LOW_ENGAGEMENT_BELOW: usize = 10;
/// More tokens than this is high engagement.
pub const HIGH_ENGAGEMENT_ABOVE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub engagement: EngagementLevel,
}

#[async_trait]
pub trait TurnClassifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<Classification, LanguageError>;

    fn name(&self) -> &'static str;
}

/// Resolve cue counts to a label.
///
/// Ties between positive and negative are neutral, and explicit hedging
/// ("not sure") wins whenever it is at least as frequent as either side.
pub fn sentiment_from_counts(counts: CueCounts) -> Sentiment {
    if counts.positive == counts.negative {
        return Sentiment::Neutral;
    }
    if counts.neutral >= counts.positive.max(counts.negative) {
        return Sentiment::Neutral;
    }
    if counts.positive > counts.negative {
        Sentiment::Positive
    } else {
        Sentiment::Negative
    }
}

/// Engagement from whitespace token count.
pub fn engagement_for(message: &str) -> EngagementLevel {
    let n = message.split_whitespace().count();
    if n < LOW_ENGAGEMENT_BELOW {
        EngagementLevel::Low
    } else if n <= HIGH_ENGAGEMENT_ABOVE {
        EngagementLevel::Medium
    } else {
        EngagementLevel::High
    }
}

#[derive(Debug, Clone)]
pub struct LexicalClassifier {
    cues: Arc<CueSet>,
}

impl LexicalClassifier {
    pub fn new(cues: Arc<CueSet>) -> Self {
        Self { cues }
    }

    pub fn analyze(&self, message: &str) -> Classification {
        Classification {
            sentiment: sentiment_from_counts(self.cues.count(message)),
            engagement: engagement_for(message),
        }
    }
}

#[async_trait]
impl TurnClassifier for LexicalClassifier {
    async fn classify(&self, message: &str) -> Result<Classification, LanguageError> {
        Ok(self.analyze(message))
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

const CLASSIFIER_PROMPT: &str = "You label messages from a patient talking to a care \
companion. Reply with JSON only, no prose, in the form \
{\"sentiment\": \"positive|negative|neutral\", \"engagement\": \"high|medium|low\"}.";

/// Delegates classification to the language model.
#[derive(Debug, Clone)]
pub struct LanguageModelClassifier {
    language: GuardedLanguage,
}

impl LanguageModelClassifier {
    pub fn new(language: GuardedLanguage) -> Self {
        Self { language }
    }
}

/// Extract the first JSON object from a model reply.
pub fn parse_classification(reply: &str) -> Result<Classification, LanguageError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(LanguageError::Malformed("no JSON object in reply".to_string())),
    };
    let lowered = json.to_lowercase();
    serde_json::from_str(&lowered).map_err(|e| LanguageError::Malformed(e.to_string()))
}

#[async_trait]
impl TurnClassifier for LanguageModelClassifier {
    async fn classify(&self, message: &str) -> Result<Classification, LanguageError> {
        let request = LanguageRequest {
            system: CLASSIFIER_PROMPT.to_string(),
            history: Vec::new(),
            user_text: message.to_string(),
        };
        match self.language.call(&request).await {
            Some(reply) => parse_classification(&reply?),
            None => Err(LanguageError::ServiceUnavailable(
                "no language model configured".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "language_model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::testing::{FailingModel, ScriptedModel};
    use std::time::Duration;

    fn lexical() -> LexicalClassifier {
        LexicalClassifier::new(Arc::new(CueSet::default()))
    }

    #[test]
    fn test_positive_medication_reply() {
        let c = lexical().analyze("I took my medicine this morning");
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.engagement, EngagementLevel::Low);
    }

    #[test]
    fn test_uncertain_reply_is_neutral() {
        assert_eq!(lexical().analyze("I don't know").sentiment, Sentiment::Neutral);
        assert_eq!(lexical().analyze("I'm not sure").sentiment, Sentiment::Neutral);
        assert_eq!(lexical().analyze("The weather").sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_negative_reply() {
        let c = lexical().analyze("I forgot again and I feel terrible");
        assert_eq!(c.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_engagement_buckets() {
        let words = |n: usize| vec!["word"; n].join(" ");
        assert_eq!(engagement_for(&words(9)), EngagementLevel::Low);
        assert_eq!(engagement_for(&words(10)), EngagementLevel::Medium);
        assert_eq!(engagement_for(&words(30)), EngagementLevel::Medium);
        assert_eq!(engagement_for(&words(31)), EngagementLevel::High);
    }

    #[test]
    fn test_sentiment_from_counts() {
        let c = |positive, negative, neutral| CueCounts {
            positive,
            negative,
            neutral,
        };
        assert_eq!(sentiment_from_counts(c(0, 0, 0)), Sentiment::Neutral);
        assert_eq!(sentiment_from_counts(c(2, 1, 0)), Sentiment::Positive);
        assert_eq!(sentiment_from_counts(c(1, 3, 1)), Sentiment::Negative);
        assert_eq!(sentiment_from_counts(c(2, 1, 2)), Sentiment::Neutral);
    }

    #[test]
    fn test_parse_classification() {
        let c = parse_classification(
            "Sure! {\"sentiment\": \"Negative\", \"engagement\": \"high\"} hope that helps",
        )
        .unwrap();
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.engagement, EngagementLevel::High);

        assert!(matches!(
            parse_classification("positive, high"),
            Err(LanguageError::Malformed(_))
        ));
        assert!(matches!(
            parse_classification("{\"sentiment\": \"ecstatic\", \"engagement\": \"low\"}"),
            Err(LanguageError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_delegated_classifier_uses_model_labels() {
        // The lexical path would call this positive.
        let model = Arc::new(ScriptedModel::new(
            r#"{"sentiment": "negative", "engagement": "high"}"#,
        ));
        let classifier = LanguageModelClassifier::new(GuardedLanguage::new(
            Some(model.clone()),
            Duration::from_secs(1),
        ));
        let c = classifier.classify("yes I took it").await.unwrap();
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.engagement, EngagementLevel::High);
        assert_eq!(model.calls(), 1);
        assert_eq!(classifier.name(), "language_model");
    }

    #[tokio::test]
    async fn test_delegated_classifier_errors() {
        let classifier = LanguageModelClassifier::new(GuardedLanguage::new(
            Some(Arc::new(FailingModel::new(LanguageError::AuthFailed))),
            Duration::from_secs(1),
        ));
        assert_eq!(
            classifier.classify("hi").await.unwrap_err(),
            LanguageError::AuthFailed
        );

        let classifier = LanguageModelClassifier::new(GuardedLanguage::disabled());
        assert!(matches!(
            classifier.classify("hi").await,
            Err(LanguageError::ServiceUnavailable(_))
        ));
    }
}
