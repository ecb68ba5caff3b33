//! Cue vocabulary compiled from configuration.
//!
//! Single words are matched against whole tokens; entries containing a space
//! are matched as phrases against the normalized message.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use curaloop_core::config::CueConfig;
use curaloop_core::types::Category;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+(?:'[a-z]+)?").expect("valid token regex"));

/// Lowercase a message and fold typographic apostrophes.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// Word tokens of an already normalized message.
pub fn tokens(normalized: &str) -> Vec<&str> {
    TOKEN.find_iter(normalized).map(|m| m.as_str()).collect()
}

#[derive(Debug, Clone, Default)]
struct CueList {
    words: HashSet<String>,
    phrases: Vec<String>,
}

impl CueList {
    fn new(entries: &[String]) -> Self {
        let mut list = CueList::default();
        for entry in entries {
            let entry = normalize(entry.trim());
            if entry.is_empty() {
                continue;
            }
            if entry.contains(' ') {
                list.phrases.push(entry);
            } else {
                list.words.insert(entry);
            }
        }
        list
    }

    fn has_word(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    fn phrase_hits(&self, normalized: &str) -> usize {
        self.phrases
            .iter()
            .filter(|p| normalized.contains(p.as_str()))
            .count()
    }

    fn matches(&self, normalized: &str, tokens: &[&str]) -> bool {
        tokens.iter().any(|t| self.has_word(t)) || self.phrase_hits(normalized) > 0
    }
}

/// Raw cue counts for one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CueCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Sentiment and completion cues.
#[derive(Debug, Clone)]
pub struct CueSet {
    positive: CueList,
    negative: CueList,
    neutral: CueList,
    categories: HashMap<Category, CueList>,
}

impl CueSet {
    pub fn from_config(config: &CueConfig) -> Self {
        let mut categories = HashMap::new();
        for (name, entries) in &config.category {
            match Category::from_str(name) {
                Ok(category) => {
                    categories.insert(category, CueList::new(entries));
                }
                Err(e) => warn!("Ignoring completion cues: {}", e),
            }
        }
        Self {
            positive: CueList::new(&config.positive),
            negative: CueList::new(&config.negative),
            neutral: CueList::new(&config.neutral),
            categories,
        }
    }

    /// Count sentiment cues in a message.
    ///
    /// A positive word directly after a negative one ("not good") is absorbed
    /// by the negative and not counted.
    pub fn count(&self, message: &str) -> CueCounts {
        let normalized = normalize(message);
        let toks = tokens(&normalized);
        let mut counts = CueCounts {
            neutral: self.neutral.phrase_hits(&normalized),
            ..Default::default()
        };

        let mut prev_negative = false;
        for tok in &toks {
            if self.negative.has_word(tok) {
                counts.negative += 1;
                prev_negative = true;
                continue;
            }
            if self.positive.has_word(tok) && !prev_negative {
                counts.positive += 1;
            }
            if self.neutral.has_word(tok) {
                counts.neutral += 1;
            }
            prev_negative = false;
        }
        counts.positive += self.positive.phrase_hits(&normalized);
        counts.negative += self.negative.phrase_hits(&normalized);
        counts
    }

    /// Whether the message mentions a completion cue for `category`.
    pub fn mentions_category(&self, category: Category, message: &str) -> bool {
        let Some(list) = self.categories.get(&category) else {
            return false;
        };
        let normalized = normalize(message);
        list.matches(&normalized, &tokens(&normalized))
    }
}

impl Default for CueSet {
    fn default() -> Self {
        Self::from_config(&CueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_keep_contractions() {
        let n = normalize("I DON\u{2019}T know, can't say!");
        assert_eq!(tokens(&n), vec!["i", "don't", "know", "can't", "say"]);
    }

    #[test]
    fn test_counts() {
        let cues = CueSet::default();
        let c = cues.count("I took my medicine this morning");
        assert_eq!(c.positive, 1);
        assert_eq!(c.negative, 0);

        let c = cues.count("I don't know");
        assert_eq!(c.negative, 1);
        assert_eq!(c.neutral, 1);
    }

    #[test]
    fn test_negated_positive_is_absorbed() {
        let cues = CueSet::default();
        let c = cues.count("I am not well today");
        assert_eq!(c, CueCounts { positive: 0, negative: 1, neutral: 0 });
    }

    #[test]
    fn test_category_mentions() {
        let cues = CueSet::default();
        assert!(cues.mentions_category(Category::Medication, "Took the pills at 8"));
        assert!(!cues.mentions_category(Category::Medication, "I went for a walk"));
        assert!(cues.mentions_category(Category::PhysicalActivity, "I went for a walk"));
    }

    #[test]
    fn test_unknown_category_key_is_ignored() {
        let mut config = CueConfig::default();
        config
            .category
            .insert("astrology".to_string(), vec!["stars".to_string()]);
        let cues = CueSet::from_config(&config);
        assert!(cues.mentions_category(Category::Sleep, "slept fine"));
    }

    #[test]
    fn test_phrase_cues() {
        let config = CueConfig {
            positive: vec!["feeling great".to_string()],
            negative: vec![],
            neutral: vec![],
            category: Default::default(),
        };
        let cues = CueSet::from_config(&config);
        assert_eq!(cues.count("Honestly feeling great").positive, 1);
        assert!(!cues.mentions_category(Category::Medication, "took it"));
    }
}
