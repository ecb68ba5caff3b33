//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use curaloop_core::config::LanguageConfig;

use crate::language::{LanguageError, LanguageModel, LanguageRequest};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Language model backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpLanguageModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpLanguageModel {
    pub fn new(config: &LanguageConfig, api_key: String) -> Result<Self, LanguageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| LanguageError::ServiceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build a client when `provider = "openai"` and the key variable is set.
    /// Returns `Ok(None)` when no model is configured.
    pub fn from_config(config: &LanguageConfig) -> Result<Option<Self>, LanguageError> {
        if config.provider != "openai" {
            return Ok(None);
        }
        let key = std::env::var(&config.api_key_env).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        Self::new(config, key.to_string()).map(Some)
    }

    fn body<'a>(&'a self, request: &'a LanguageRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: &request.system,
        });
        for m in &request.history {
            messages.push(ChatMessage {
                role: m.role.as_str(),
                content: &m.content,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.user_text,
        });
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Map a non-success HTTP status to a language error.
pub fn status_error(status: reqwest::StatusCode) -> LanguageError {
    match status.as_u16() {
        429 => LanguageError::RateLimited,
        401 | 403 => LanguageError::AuthFailed,
        code => LanguageError::ServiceUnavailable(format!("HTTP {}", code)),
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn generate(&self, request: &LanguageRequest) -> Result<String, LanguageError> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| LanguageError::ServiceUnavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(status_error(res.status()));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| LanguageError::Malformed(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LanguageError::Malformed("response has no choices".to_string()))?;

        debug!(model = %self.model, chars = text.len(), "Language model replied");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Message;

    fn config() -> LanguageConfig {
        LanguageConfig {
            provider: "openai".to_string(),
            base_url: "http://localhost:9/v1/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS),
            LanguageError::RateLimited
        );
        assert_eq!(
            status_error(reqwest::StatusCode::UNAUTHORIZED),
            LanguageError::AuthFailed
        );
        assert_eq!(
            status_error(reqwest::StatusCode::FORBIDDEN),
            LanguageError::AuthFailed
        );
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_GATEWAY),
            LanguageError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn test_request_body_order() {
        let model = HttpLanguageModel::new(&config(), "key".to_string()).unwrap();
        assert_eq!(model.endpoint, "http://localhost:9/v1/chat/completions");

        let request = LanguageRequest {
            system: "persona".to_string(),
            history: vec![Message::assistant("Did you sleep well?"), Message::user("yes")],
            user_text: "and I ate".to_string(),
        };
        let body = serde_json::to_value(model.body(&request)).unwrap();
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "assistant", "user", "user"]);
        assert_eq!(body["messages"][3]["content"], "and I ate");
    }

    #[test]
    fn test_provider_none_disables_model() {
        let config = LanguageConfig::default();
        assert!(HttpLanguageModel::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let model = HttpLanguageModel::new(&config(), "key".to_string()).unwrap();
        let request = LanguageRequest {
            system: String::new(),
            history: vec![],
            user_text: "hi".to_string(),
        };
        let err = model.generate(&request).await.unwrap_err();
        assert!(matches!(err, LanguageError::ServiceUnavailable(_)));
    }
}
