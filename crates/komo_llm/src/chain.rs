//! Provider fallback chain.
//!
//! Providers are tried one at a time in rank order, each bounded by its own
//! timeout. Any failure moves on to the next provider; nothing is retried
//! within one request. The first non-empty cleaned reply wins.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cleaner::clean_reply;
use crate::error::{LlmError, LlmResult};
use crate::provider::ReplyProvider;

/// A successful reply and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyEnvelope {
    pub raw: String,
    pub cleaned: String,
    pub provider: String,
}

/// Ordered list of reply providers.
#[derive(Clone, Default)]
pub struct FallbackChain {
    providers: Vec<Arc<dyn ReplyProvider>>,
}

impl FallbackChain {
    /// Build a chain. Providers are stable-sorted by rank, so equal ranks keep
    /// the given order.
    pub fn new(mut providers: Vec<Arc<dyn ReplyProvider>>) -> Self {
        providers.sort_by_key(|p| p.rank());
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Provider names in the order they will be tried.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Ask each provider in turn until one produces a usable reply.
    pub async fn invoke(&self, text: &str, instruction: &str) -> LlmResult<ReplyEnvelope> {
        let mut attempted = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name().to_string();
            attempted.push(name.clone());

            let limit = provider.timeout();
            let result = match tokio::time::timeout(limit, provider.generate(text, instruction)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    provider: name.clone(),
                    seconds: limit.as_secs(),
                }),
            };

            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Provider {} failed, trying next: {}", name, e);
                    continue;
                }
            };

            let cleaned = clean_reply(&raw);
            if cleaned.is_empty() {
                warn!("Provider {} reply was empty after cleaning, trying next", name);
                continue;
            }

            info!("Reply generated by {}", name);
            return Ok(ReplyEnvelope {
                raw,
                cleaned,
                provider: name,
            });
        }

        Err(LlmError::AllProvidersExhausted { attempted })
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}
