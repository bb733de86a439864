//! OpenAI-compatible `/chat/completions` provider (Groq, OpenRouter, OpenAI).

use std::time::Duration;

use async_trait::async_trait;
use komo_core::ProviderSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::provider::ReplyProvider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    rank: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            name: name.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            rank: 0,
            timeout: crate::provider::DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_settings(settings: &ProviderSettings) -> LlmResult<Self> {
        let api_key = settings
            .resolve_api_key()
            .ok_or_else(|| LlmError::NotConfigured {
                provider: settings.name.clone(),
                reason: "no API key".to_string(),
            })?;

        let mut provider = Self::new(&settings.name, api_key, settings.model.clone())
            .with_rank(settings.rank.unwrap_or(0))
            .with_timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(base_url) = &settings.base_url {
            provider = provider.with_base_url(base_url);
        }
        Ok(provider)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ReplyProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, text: &str, instruction: &str) -> LlmResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: instruction.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
        };

        debug!("Requesting {} from {}", self.model, self.name);
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatResponse = response.json().await.map_err(|e| LlmError::MalformedPayload {
            provider: self.name.clone(),
            message: e.to_string(),
        })?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyReply {
                provider: self.name.clone(),
            })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use komo_core::ProviderKind;

    #[test]
    fn test_default_model_and_endpoint() {
        let provider = OpenAiCompatProvider::new("openai", "key", None);
        assert_eq!(provider.model(), "gpt-4o-mini");
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_from_settings() {
        let mut settings = ProviderSettings::new("groq", ProviderKind::OpenaiCompatible);
        settings.api_key = Some("q-key".to_string());
        settings.base_url = Some("https://api.groq.com/openai/v1/".to_string());
        settings.model = Some("llama-3.3-70b-versatile".to_string());
        settings.timeout_secs = 12;

        let provider = OpenAiCompatProvider::from_settings(&settings).unwrap();
        assert_eq!(provider.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(provider.model(), "llama-3.3-70b-versatile");
        assert_eq!(provider.timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let settings = ProviderSettings::new("groq", ProviderKind::OpenaiCompatible);
        let err = OpenAiCompatProvider::from_settings(&settings).err().unwrap();
        assert!(matches!(err, LlmError::NotConfigured { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_response_without_content_parses() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
