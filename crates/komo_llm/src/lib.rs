//! # komo_llm
//!
//! Reply generation for the Komomo assistant.
//!
//! - **Providers**: Gemini and OpenAI-compatible endpoints behind [`ReplyProvider`]
//! - **Chain**: [`FallbackChain`] tries providers in rank order with per-provider timeouts
//! - **Cleaner**: strips reasoning blocks, control tags and markup from replies
//! - **Profile**: emotion inference and user memory, run after each reply

pub mod chain;
pub mod cleaner;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod profile;
pub mod provider;

pub use chain::{FallbackChain, ReplyEnvelope};
pub use cleaner::clean_reply;
pub use error::{LlmError, LlmResult};
pub use gemini::GeminiProvider;
pub use mock::{CapturedRequest, MockBehavior, MockProvider};
pub use openai::OpenAiCompatProvider;
pub use profile::{
    resolve_expression, spawn_extraction, EmotionAnalyzer, EmotionReading, MemoryStore,
    ProfileExtractor,
};
pub use provider::{build_provider, providers_from_config, ReplyProvider, DEFAULT_TIMEOUT};
