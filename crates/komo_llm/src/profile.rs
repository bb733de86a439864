//! Profile extraction: emotion inference and persisted user memory.
//!
//! Extraction runs after a reply has been broadcast and never blocks or fails
//! the conversation. Its only visible effects are an expression-changed event
//! and an updated memory file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use komo_core::{Event, Expression, HookBus, ModeGuard, ProfileSettings};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{LlmError, LlmResult};
use crate::openai::OpenAiCompatProvider;
use crate::provider::ReplyProvider;

/// Keywords that mark an upbeat emotion label.
const UPBEAT_KEYWORDS: &[&str] = &["song", "sing", "20", "happy", "excite", "joy", "楽"];

const ANALYZER_INSTRUCTION: &str = "You are an emotion analyzer. Respond with a single JSON object only.";

/// Seam for anything that learns from a finished exchange.
#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    /// Text appended to the character instruction for the next request.
    fn summary(&self) -> String;

    /// Learn from one user utterance and the reply it received.
    async fn extract(&self, user_text: &str, reply: &str) -> LlmResult<()>;
}

/// Run extraction in the background, logging any failure.
pub fn spawn_extraction(
    extractor: Arc<dyn ProfileExtractor>,
    user_text: String,
    reply: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = extractor.extract(&user_text, &reply).await {
            warn!("Profile extraction failed: {}", e);
        }
    })
}

/// Map a model-chosen emotion label to an avatar expression.
///
/// Upbeat labels become the singing expression while a performance runs and
/// the excited one otherwise. The singing expression is never chosen outside
/// a performance. Anything unparseable is neutral.
pub fn resolve_expression(raw: &Value, singing: bool) -> Expression {
    let label = match raw {
        Value::String(s) => s.to_lowercase(),
        Value::Null => return Expression::NEUTRAL,
        other => other.to_string().to_lowercase(),
    };

    if UPBEAT_KEYWORDS.iter().any(|k| label.contains(k)) {
        return if singing {
            Expression::SINGING
        } else {
            Expression::EXCITED
        };
    }

    match label.trim().parse::<u32>() {
        Ok(id) if id == Expression::SINGING.id() && !singing => Expression::EXCITED,
        Ok(id) => Expression(id),
        Err(_) => Expression::NEUTRAL,
    }
}

/// Structured answer expected from the analyzer model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmotionReading {
    #[serde(default)]
    pub emotion_stats: Option<Value>,
    #[serde(default)]
    pub emotion_id: Value,
    #[serde(default)]
    pub inner_monologue: String,
    /// Lasting facts the user revealed, keyed by topic.
    #[serde(default)]
    pub user_facts: Map<String, Value>,
}

impl EmotionReading {
    /// Parse a reading out of model output, tolerating code fences and prose
    /// around the JSON object.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let body = match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if start < end => &content[start..=end],
            _ => content,
        };
        serde_json::from_str(body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Memory {
    #[serde(default)]
    user_data: Map<String, Value>,
    #[serde(default = "default_emotion")]
    last_emotion: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

fn default_emotion() -> Value {
    json!({"joy": 50, "trust": 50, "tension": 20})
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            user_data: Map::new(),
            last_emotion: default_emotion(),
            updated_at: None,
        }
    }
}

/// JSON file holding what has been learned about the user.
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    memory: RwLock<Memory>,
}

impl MemoryStore {
    /// Open the store, starting fresh when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let memory = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Memory file {:?} is corrupt, starting fresh: {}", path, e);
                Memory::default()
            }),
            Err(_) => Memory::default(),
        };
        Self {
            path,
            memory: RwLock::new(memory),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_emotion(&self) -> Value {
        self.memory.read().last_emotion.clone()
    }

    /// Remember a user fact. Call [`MemoryStore::save`] to persist.
    pub fn remember(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.memory.write().user_data.insert(key.into(), value.into());
    }

    /// Replace the last emotion state and persist.
    pub fn record_emotion(&self, stats: Value) -> LlmResult<()> {
        {
            let mut memory = self.memory.write();
            memory.last_emotion = stats;
            memory.updated_at = Some(Utc::now());
        }
        self.save()
    }

    pub fn save(&self) -> LlmResult<()> {
        let content = serde_json::to_string_pretty(&*self.memory.read())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        debug!("Memory saved to {:?}", self.path);
        Ok(())
    }

    /// Short plain-text profile for the character instruction.
    pub fn summary(&self) -> String {
        let memory = self.memory.read();
        let mut lines = Vec::new();
        if !memory.user_data.is_empty() {
            lines.push("[ユーザー情報]".to_string());
            for (key, value) in &memory.user_data {
                let value = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                lines.push(format!("- {}: {}", key, value));
            }
        }
        lines.push(format!("[現在の感情] {}", memory.last_emotion));
        lines.join("\n")
    }
}

/// Emotion analyzer backed by an OpenAI-compatible endpoint.
pub struct EmotionAnalyzer {
    provider: Arc<dyn ReplyProvider>,
    bus: Arc<HookBus>,
    modes: Arc<ModeGuard>,
    memory: MemoryStore,
}

impl EmotionAnalyzer {
    pub fn new(
        provider: Arc<dyn ReplyProvider>,
        bus: Arc<HookBus>,
        modes: Arc<ModeGuard>,
        memory: MemoryStore,
    ) -> Self {
        Self {
            provider,
            bus,
            modes,
            memory,
        }
    }

    pub fn from_settings(
        settings: &ProfileSettings,
        bus: Arc<HookBus>,
        modes: Arc<ModeGuard>,
    ) -> LlmResult<Self> {
        let api_key = settings.resolve_api_key().ok_or_else(|| LlmError::NotConfigured {
            provider: "profile".to_string(),
            reason: "no OpenRouter API key".to_string(),
        })?;

        let provider = OpenAiCompatProvider::new("profile", api_key, Some(settings.model.clone()))
            .with_base_url(&settings.base_url)
            .with_timeout(Duration::from_secs(settings.timeout_secs));

        info!("Emotion analyzer using {}", settings.model);
        Ok(Self::new(
            Arc::new(provider),
            bus,
            modes,
            MemoryStore::open(&settings.memory_path),
        ))
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    fn prompt(user_text: &str, reply: &str) -> String {
        format!(
            concat!(
                "Extract dialogue data into JSON for the character \"Komomo\".\n",
                "User: \"{}\"\nKomomo: \"{}\"\n\n",
                "emotion_id must be exactly one of:\n",
                "- \"13\": music, singing or very excited\n",
                "- \"17\": happy or joyful\n",
                "- \"12\": normal, calm conversation\n\n",
                "user_facts holds lasting facts the user stated about themselves ",
                "(name, likes, plans), keyed by topic; use {{}} when there are none.\n\n",
                "Format: {{\"emotion_stats\": {{\"joy\": 50, \"trust\": 50, \"tension\": 20}}, ",
                "\"emotion_id\": \"12\", \"inner_monologue\": \"text\", \"user_facts\": {{}}}}"
            ),
            user_text, reply
        )
    }
}

#[async_trait]
impl ProfileExtractor for EmotionAnalyzer {
    fn summary(&self) -> String {
        self.memory.summary()
    }

    async fn extract(&self, user_text: &str, reply: &str) -> LlmResult<()> {
        let limit = self.provider.timeout();
        let prompt = Self::prompt(user_text, reply);
        let content = tokio::time::timeout(limit, self.provider.generate(&prompt, ANALYZER_INSTRUCTION))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.provider.name().to_string(),
                seconds: limit.as_secs(),
            })??;

        let reading = EmotionReading::parse(&content).map_err(|e| LlmError::MalformedPayload {
            provider: self.provider.name().to_string(),
            message: e.to_string(),
        })?;

        let expression = resolve_expression(&reading.emotion_id, self.modes.is_singing());
        info!("Emotion {} -> expression {}", reading.emotion_id, expression);
        if !reading.inner_monologue.is_empty() {
            debug!("Inner monologue: {}", reading.inner_monologue);
        }

        self.bus.dispatch(&Event::expression(expression)).await;

        let mut learned = false;
        for (key, value) in reading.user_facts {
            if value.is_null() || value.as_str().is_some_and(str::is_empty) {
                continue;
            }
            debug!("Learned user fact {}", key);
            self.memory.remember(key, value);
            learned = true;
        }

        // Persisting is best effort; the expression already went out
        let saved = match reading.emotion_stats {
            Some(stats) => self.memory.record_emotion(stats),
            None if learned => self.memory.save(),
            None => Ok(()),
        };
        if let Err(e) = saved {
            warn!("Failed to save memory: {}", e);
        }
        Ok(())
    }
}
