//! Google Generative Language `generateContent` provider.

use std::time::Duration;

use async_trait::async_trait;
use komo_core::ProviderSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::provider::ReplyProvider;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini provider. The character instruction is sent as the system instruction.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    rank: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            name: "gemini".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.trim_start_matches("models/").to_string(),
            rank: 0,
            timeout: crate::provider::DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> LlmResult<Self> {
        let api_key = settings
            .resolve_api_key()
            .ok_or_else(|| LlmError::NotConfigured {
                provider: settings.name.clone(),
                reason: "no API key".to_string(),
            })?;

        let mut provider = Self::new(api_key, settings.model.clone());
        provider.name = settings.name.clone();
        provider.rank = settings.rank.unwrap_or(0);
        provider.timeout = Duration::from_secs(settings.timeout_secs);
        if let Some(base_url) = &settings.base_url {
            provider.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(provider)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ReplyProvider for GeminiProvider {
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
        let request = GenerateRequest {
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
        };

        debug!("Requesting {} from {}", self.model, self.name);
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
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

        let result: GenerateResponse = response.json().await.map_err(|e| LlmError::MalformedPayload {
            provider: self.name.clone(),
            message: e.to_string(),
        })?;

        let text = result.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyReply {
                provider: self.name.clone(),
            });
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_prefix_stripped() {
        let provider = GeminiProvider::new("key", Some("models/gemini-1.5-pro".to_string()));
        assert_eq!(provider.model(), "gemini-1.5-pro");
        assert!(provider
            .endpoint()
            .ends_with("/v1beta/models/gemini-1.5-pro:generateContent"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"こん"},{"text":"にちは"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), "こんにちは");

        let blocked: GenerateResponse = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert_eq!(blocked.text(), "");
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: "be kind".to_string(),
                }],
            }),
            contents: vec![],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system_instruction"]["parts"][0]["text"], "be kind");
        assert!(value["system_instruction"].get("role").is_none());
    }
}
