use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CuraloopError, Result};

/// Top-level configuration for the Curaloop service.
///
/// Loaded from `~/.curaloop/config.toml` by default. Each section
/// corresponds to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuraloopConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

impl CuraloopConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CuraloopConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !["sqlite", "memory"].contains(&self.storage.backend.as_str()) {
            return Err(CuraloopError::Config(format!(
                "storage.backend must be 'sqlite' or 'memory', got '{}'",
                self.storage.backend
            )));
        }
        if !["none", "openai"].contains(&self.language.provider.as_str()) {
            return Err(CuraloopError::Config(format!(
                "language.provider must be 'none' or 'openai', got '{}'",
                self.language.provider
            )));
        }
        if !["lexical", "language_model"].contains(&self.sentiment.classifier.as_str()) {
            return Err(CuraloopError::Config(format!(
                "sentiment.classifier must be 'lexical' or 'language_model', got '{}'",
                self.sentiment.classifier
            )));
        }
        if self.language.timeout_secs == 0 {
            return Err(CuraloopError::Config(
                "language.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.engine.max_message_length == 0 {
            return Err(CuraloopError::Config(
                "engine.max_message_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.curaloop/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests allowed per second across all rate-limited routes.
    pub rate_limit_per_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit_per_sec: 100,
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "sqlite" or "memory".
    pub backend: String,
    /// Database file name inside `general.data_dir`.
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            db_file: "curaloop.db".to_string(),
        }
    }
}

/// Conversation engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest accepted patient message, in characters.
    pub max_message_length: usize,
    pub default_history_limit: usize,
    pub max_history_limit: usize,
    /// Transcript turns passed to the language model as context.
    pub context_turns: usize,
    /// Consecutive negative turns that trigger a distress recommendation.
    pub negative_streak_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            default_history_limit: 10,
            max_history_limit: 100,
            context_turns: 10,
            negative_streak_threshold: 3,
        }
    }
}

/// Language model settings used to phrase replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// "none" (template replies only) or "openai" (any compatible endpoint).
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Upper bound on a single model call.
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 10,
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

/// Turn classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// "lexical" or "language_model".
    pub classifier: String,
    #[serde(default)]
    pub cues: CueConfig,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            classifier: "lexical".to_string(),
            cues: CueConfig::default(),
        }
    }
}

/// Cue vocabulary for lexical sentiment and activity completion.
///
/// Entries are lowercase words, or phrases when they contain a space.
/// `category` maps a category name (e.g. `medication`) to the words that
/// show the patient engaged with that activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub neutral: Vec<String>,
    pub category: BTreeMap<String, Vec<String>>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for CueConfig {
    fn default() -> Self {
        let mut category = BTreeMap::new();
        category.insert(
            "medication".to_string(),
            words(&[
                "took", "taken", "take", "taking", "medicine", "medicines", "medication",
                "medications", "pill", "pills", "tablet", "tablets", "dose",
            ]),
        );
        category.insert(
            "lifestyle".to_string(),
            words(&[
                "routine", "walk", "walked", "ate", "cooked", "diet", "exercise", "exercised",
                "slept", "rested", "did",
            ]),
        );
        category.insert(
            "physical_activity".to_string(),
            words(&[
                "walk", "walked", "walking", "exercise", "exercised", "stretch", "stretched",
                "moved", "active", "swim", "swam", "garden", "gardening",
            ]),
        );
        category.insert(
            "nutrition".to_string(),
            words(&[
                "ate", "eat", "eaten", "meal", "breakfast", "lunch", "dinner", "food", "fruit",
                "vegetables", "water", "drank",
            ]),
        );
        category.insert(
            "sleep".to_string(),
            words(&["slept", "sleep", "sleeping", "rested", "nap", "bed", "night"]),
        );
        category.insert(
            "cognitive".to_string(),
            words(&[
                "remember", "remembered", "puzzle", "game", "memory", "read", "reading",
                "played", "crossword", "think",
            ]),
        );
        category.insert(
            "social".to_string(),
            words(&[
                "family", "friend", "friends", "daughter", "son", "called", "visited",
                "talked", "neighbor", "together",
            ]),
        );
        category.insert(
            "medical".to_string(),
            words(&[
                "doctor", "appointment", "clinic", "nurse", "checkup", "visit", "visited",
            ]),
        );
        category.insert(
            "safety".to_string(),
            words(&["safe", "secure", "okay", "fine", "home", "help", "emergency", "contact"]),
        );
        category.insert(
            "general".to_string(),
            words(&["fine", "good", "okay", "well", "better", "great", "yes"]),
        );

        Self {
            positive: words(&[
                "yes", "good", "great", "fine", "okay", "ok", "sure", "done", "completed",
                "finished", "took", "taken", "better", "happy", "well", "wonderful", "enjoyed",
                "nice", "glad", "safe",
            ]),
            negative: words(&[
                "no", "not", "bad", "difficult", "hard", "can't", "cannot", "won't", "didn't",
                "don't", "haven't", "isn't", "wasn't", "never", "sad", "tired", "pain", "worse", "forgot", "scared",
                "afraid", "lonely", "confused", "upset", "terrible", "awful",
            ]),
            neutral: words(&[
                "maybe", "perhaps", "unsure", "don't know", "not sure", "i guess", "kind of",
                "sort of",
            ]),
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = CuraloopConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.engine.max_message_length, 2000);
        assert_eq!(config.language.provider, "none");
        assert_eq!(config.language.timeout_secs, 10);
        assert_eq!(config.sentiment.classifier, "lexical");
        assert!(config.sentiment.cues.category.contains_key("medication"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "debug"

[language]
provider = "openai"
timeout_secs = 5
"#;
        let file = create_temp_config(content);
        let config = CuraloopConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.language.provider, "openai");
        assert_eq!(config.language.timeout_secs, 5);
        assert_eq!(config.language.model, "gpt-4o-mini");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_custom_cues() {
        let content = r#"
[sentiment]
classifier = "language_model"

[sentiment.cues]
positive = ["grand"]
negative = ["poorly"]
neutral = []

[sentiment.cues.category]
medication = ["tablets"]
"#;
        let file = create_temp_config(content);
        let config = CuraloopConfig::load(file.path()).unwrap();
        assert_eq!(config.sentiment.classifier, "language_model");
        assert_eq!(config.sentiment.cues.positive, vec!["grand".to_string()]);
        assert_eq!(
            config.sentiment.cues.category.get("medication"),
            Some(&vec!["tablets".to_string()])
        );
        assert!(!config.sentiment.cues.category.contains_key("sleep"));
    }

    #[test]
    fn test_load_rejects_unknown_backend() {
        let content = r#"
[storage]
backend = "postgres"
"#;
        let file = create_temp_config(content);
        let err = CuraloopConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, CuraloopError::Config(_)));
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = CuraloopConfig::default();
        config.language.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = CuraloopConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.curaloop/data");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[general\nlog_level = ");
        assert!(CuraloopConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CuraloopConfig::default();
        config.server.port = 9191;
        config.save(&path).unwrap();

        let reloaded = CuraloopConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 9191);
        assert_eq!(reloaded.sentiment.cues, config.sentiment.cues);
    }
}
