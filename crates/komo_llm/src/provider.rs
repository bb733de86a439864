//! Reply provider seam and construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use komo_core::{ConfigStore, ProviderKind, ProviderSettings};
use tracing::{info, warn};

use crate::error::LlmResult;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiCompatProvider;

/// Per-provider timeout applied when the configuration does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// A remote service able to produce a reply for one user utterance.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// Name reported in logs, status lines and the reply envelope.
    fn name(&self) -> &str;

    /// Fixed rank; lower ranks are tried first.
    fn rank(&self) -> u32 {
        0
    }

    /// Upper bound for a single `generate` call.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Produce raw reply text for `text` under the given character instruction.
    async fn generate(&self, text: &str, instruction: &str) -> LlmResult<String>;
}

/// Build a provider from one configured entry.
pub fn build_provider(settings: &ProviderSettings) -> LlmResult<Arc<dyn ReplyProvider>> {
    let provider: Arc<dyn ReplyProvider> = match settings.kind() {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_settings(settings)?),
        ProviderKind::OpenaiCompatible => Arc::new(OpenAiCompatProvider::from_settings(settings)?),
    };
    Ok(provider)
}

/// Build every enabled provider, skipping entries that cannot be constructed.
pub fn providers_from_config(config: &ConfigStore) -> Vec<Arc<dyn ReplyProvider>> {
    config
        .enabled_providers()
        .iter()
        .filter_map(|settings| match build_provider(settings) {
            Ok(provider) => {
                info!("Provider {} ready (rank {})", provider.name(), provider.rank());
                Some(provider)
            }
            Err(e) => {
                warn!("Skipping provider {}: {}", settings.name, e);
                None
            }
        })
        .collect()
}
