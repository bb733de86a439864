//! Configuration store.
//!
//! Settings are read once at startup from a JSON (default), TOML or YAML file
//! into a `serde_json::Value`. Failing to read or parse the file, or the
//! character file beside it, is the only fatal error of the assistant;
//! everything else degrades at runtime.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

const DEFAULT_USER_NAME: &str = "あなた";
const DEFAULT_CHARACTER_NAME: &str = "こもも";
const DEFAULT_CHARACTER_FILE: &str = "character.txt";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Kind of remote reply provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Generative Language API.
    Gemini,
    /// Any `/chat/completions` endpoint (Groq, OpenRouter, OpenAI).
    OpenaiCompatible,
}

/// One entry of the ordered provider list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    #[serde(default)]
    pub kind: Option<ProviderKind>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the key, used when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// Fixed rank; lower runs first. Defaults to the position in the list.
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_provider_timeout() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

impl ProviderSettings {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            model: None,
            api_key: None,
            api_key_env: None,
            base_url: None,
            timeout_secs: default_provider_timeout(),
            rank: None,
            enabled: true,
        }
    }

    /// Explicit kind, or inferred from the provider name.
    pub fn kind(&self) -> ProviderKind {
        self.kind.unwrap_or_else(|| {
            if self.name.to_lowercase().contains("gemini") {
                ProviderKind::Gemini
            } else {
                ProviderKind::OpenaiCompatible
            }
        })
    }

    /// API key from the config, falling back to the named environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.is_empty())
            })
    }
}

/// One row of the app-launch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub command: String,
}

impl AppEntry {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// Phrases and messages used by the input router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Suffixes appended to an app name to form a launch intent.
    pub launch_suffixes: Vec<String>,
    /// Confirmation reply; `{name}` is replaced by the app name.
    pub launch_confirmation: String,
    pub thinking_status: String,
    pub exhausted_status: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            launch_suffixes: vec!["を起動".to_string(), "を開いて".to_string()],
            launch_confirmation: "はい、{name}を起動しますね。".to_string(),
            thinking_status: "思考中...".to_string(),
            exhausted_status: "全API接続失敗".to_string(),
        }
    }
}

/// Performance (singing/concert) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub songs_dir: PathBuf,
    pub concert_min: usize,
    pub concert_max: usize,
    pub concert_phrases: Vec<String>,
    pub sing_phrases: Vec<String>,
    pub concert_intro: String,
    pub single_intro: String,
    pub closing_remark: String,
    pub announce_settle_ms: u64,
    pub track_buffer_ms: u64,
    pub closing_pause_ms: u64,
    pub closing_settle_ms: u64,
    pub fallback_track_secs: u64,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            songs_dir: PathBuf::from("songs"),
            concert_min: 3,
            concert_max: 5,
            concert_phrases: vec!["コンサート".to_string(), "ライブ".to_string()],
            sing_phrases: vec![
                "歌って".to_string(),
                "うたって".to_string(),
                "歌唱".to_string(),
            ],
            concert_intro: "コンサート、始めちゃうよ！".to_string(),
            single_intro: "私の歌、聴いてほしいな。".to_string(),
            closing_remark: "聴いてくれてありがとう。".to_string(),
            announce_settle_ms: 2500,
            track_buffer_ms: 1500,
            closing_pause_ms: 1000,
            closing_settle_ms: 2500,
            fallback_track_secs: 180,
        }
    }
}

/// External transcription command used by the capture controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_capture_limit")]
    pub max_duration_secs: u64,
}

fn default_poll_interval() -> u64 {
    100
}

fn default_capture_limit() -> u64 {
    15
}

/// Emotion/fact extraction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub model: String,
    pub base_url: String,
    pub memory_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            model: "meta-llama/llama-3.3-70b-instruct".to_string(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            memory_path: PathBuf::from("memory.json"),
            timeout_secs: 15,
        }
    }
}

impl ProfileSettings {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

/// File formats accepted by [`ConfigStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Read-only view over the loaded settings.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    base_dir: PathBuf,
    settings: Value,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::from_value(Value::Object(Default::default()))
    }
}

impl ConfigStore {
    /// Load settings from disk. Relative paths inside the settings resolve
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_err = |message: String| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message,
        };
        let settings: Value = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        };

        if !settings.is_object() {
            return Err(parse_err("top level must be a table/object".to_string()));
        }

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        debug!("Loaded configuration from {:?}", path);
        Ok(Self { base_dir, settings })
    }

    /// Build a store from an in-memory value (relative paths resolve against `.`).
    pub fn from_value(settings: Value) -> Self {
        Self {
            base_dir: PathBuf::from("."),
            settings,
        }
    }

    /// Override the directory relative paths resolve against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Raw value for a key.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Typed value for a key, or `default` when missing or of the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.settings.get(key) {
            None | Some(Value::Null) => default,
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Ignoring invalid value for '{}': {}", key, e);
                    default
                }
            },
        }
    }

    /// Typed value for a key that must be present and well formed.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> CoreResult<T> {
        let value = self.settings.get(key).ok_or_else(|| CoreError::ConfigValue {
            key: key.to_string(),
            message: "missing".to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| CoreError::ConfigValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    /// Resolve a possibly relative path against the config directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn user_name(&self) -> String {
        self.get("user_name", DEFAULT_USER_NAME.to_string())
    }

    pub fn character_name(&self) -> String {
        self.get("character_name", DEFAULT_CHARACTER_NAME.to_string())
    }

    /// Character instruction from the character file with placeholders filled in.
    ///
    /// The character file is required; a missing or unreadable file is a
    /// configuration error.
    pub fn instruction(&self) -> CoreResult<String> {
        let file = self.get("character_file", DEFAULT_CHARACTER_FILE.to_string());
        let path = self.resolve_path(file);
        let content = fs::read_to_string(&path).map_err(|source| CoreError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded character file {:?}", path);
        Ok(content
            .replace("{{user}}", &self.user_name())
            .replace("{{char}}", &self.character_name()))
    }

    /// Ordered app-launch table.
    ///
    /// Reads `apps` (a list of `{name, command}`), falling back to `apps_raw`
    /// (one `name:command` per line).
    pub fn app_launch_table(&self) -> Vec<AppEntry> {
        let apps: Vec<AppEntry> = self.get("apps", Vec::new());
        if !apps.is_empty() {
            return apps;
        }

        self.get_str("apps_raw")
            .unwrap_or_default()
            .lines()
            .filter_map(|line| {
                let (name, command) = line.split_once(':')?;
                let (name, command) = (name.trim(), command.trim());
                if name.is_empty() || command.is_empty() {
                    None
                } else {
                    Some(AppEntry::new(name, command))
                }
            })
            .collect()
    }

    /// Enabled providers in rank order.
    ///
    /// Reads `models`; when that yields nothing, builds Gemini and Groq
    /// entries from `google_api_key` / `groq_api_key`.
    pub fn enabled_providers(&self) -> Vec<ProviderSettings> {
        let models: Vec<ProviderSettings> = self.get("models", Vec::new());
        let mut enabled: Vec<ProviderSettings> = models.into_iter().filter(|m| m.enabled).collect();

        if enabled.is_empty() {
            enabled = self.legacy_providers();
        }

        for (index, provider) in enabled.iter_mut().enumerate() {
            if provider.rank.is_none() {
                provider.rank = Some(index as u32);
            }
        }
        enabled.sort_by_key(|p| p.rank);
        enabled
    }

    fn legacy_providers(&self) -> Vec<ProviderSettings> {
        let mut providers = Vec::new();

        if let Some(key) = self.get_str("google_api_key").filter(|k| !k.is_empty()) {
            let model = self
                .get("gemini_model", "gemini-2.0-flash".to_string())
                .trim_start_matches("models/")
                .to_string();
            let mut gemini = ProviderSettings::new("gemini", ProviderKind::Gemini);
            gemini.api_key = Some(key.to_string());
            gemini.model = Some(model);
            providers.push(gemini);
        }

        if let Some(key) = self.get_str("groq_api_key").filter(|k| !k.is_empty()) {
            let mut groq = ProviderSettings::new("groq", ProviderKind::OpenaiCompatible);
            groq.api_key = Some(key.to_string());
            groq.base_url = Some(GROQ_BASE_URL.to_string());
            groq.model = Some(self.get("groq_model", "llama-3.3-70b-versatile".to_string()));
            providers.push(groq);
        }

        providers
    }

    pub fn router(&self) -> RouterSettings {
        self.get("router", RouterSettings::default())
    }

    /// Performance settings with `songs_dir` resolved against the config directory.
    pub fn performance(&self) -> PerformanceSettings {
        let mut settings = self.get("performance", PerformanceSettings::default());
        settings.songs_dir = self.resolve_path(&settings.songs_dir);
        settings
    }

    /// Capture settings, if a transcription command is configured.
    pub fn capture(&self) -> Option<CaptureSettings> {
        self.get("capture", None)
    }

    /// Profile extraction settings, if an API key is available.
    pub fn profile(&self) -> Option<ProfileSettings> {
        let mut settings = self.get("profile", ProfileSettings::default());
        if settings.api_key.is_none() {
            settings.api_key = self.get_str("openrouter_api_key").map(str::to_string);
        }
        settings.memory_path = self.resolve_path(&settings.memory_path);
        settings.resolve_api_key().map(|_| settings)
    }
}
