//! Integration tests for the provider fallback chain.

use std::sync::Arc;
use std::time::Duration;

use komo_core::ConfigStore;
use komo_llm::{
    providers_from_config, FallbackChain, LlmError, MockBehavior, MockProvider, ReplyProvider,
};
use serde_json::json;

/// Providers built from configuration keep their configured order.
#[test]
fn test_chain_order_follows_config() {
    let config = ConfigStore::from_value(json!({
        "models": [
            {"name": "gemini", "api_key": "g", "model": "gemini-2.0-flash"},
            {"name": "groq", "api_key": "q", "base_url": "https://api.groq.com/openai/v1"},
            {"name": "openai", "api_key": "o", "enabled": false}
        ]
    }));

    let chain = FallbackChain::new(providers_from_config(&config));
    assert_eq!(chain.provider_names(), vec!["gemini", "groq"]);
}

/// Legacy keys produce the Gemini then Groq order.
#[test]
fn test_legacy_keys_build_chain() {
    let config = ConfigStore::from_value(json!({
        "google_api_key": "g",
        "groq_api_key": "q"
    }));

    let chain = FallbackChain::new(providers_from_config(&config));
    assert_eq!(chain.provider_names(), vec!["gemini", "groq"]);
}

/// A provider recovers on the next request; the chain keeps no memory of failures.
#[tokio::test]
async fn test_each_request_starts_from_the_top() {
    let primary = MockProvider::new("primary")
        .then(MockBehavior::Fail("503".to_string()))
        .then(MockBehavior::Reply("back online".to_string()));
    let backup = MockProvider::replying("backup", "backup reply");
    let chain = FallbackChain::new(vec![
        Arc::new(primary.clone()) as Arc<dyn ReplyProvider>,
        Arc::new(backup.clone()),
    ]);

    let first = chain.invoke("hi", "").await.unwrap();
    assert_eq!(first.provider, "backup");

    let second = chain.invoke("hi", "").await.unwrap();
    assert_eq!(second.provider, "primary");
    assert_eq!(second.cleaned, "back online");
    assert_eq!(backup.call_count(), 1);
}

/// Every provider timing out is exhaustion, reported with all names.
#[tokio::test(start_paused = true)]
async fn test_all_timeouts_exhaust() {
    let chain = FallbackChain::new(vec![
        Arc::new(MockProvider::hanging("a").with_timeout(Duration::from_secs(10))) as Arc<dyn ReplyProvider>,
        Arc::new(MockProvider::hanging("b").with_timeout(Duration::from_secs(20))),
    ]);

    let started = tokio::time::Instant::now();
    let err = chain.invoke("hi", "").await.unwrap_err();

    assert!(started.elapsed() >= Duration::from_secs(30));
    match err {
        LlmError::AllProvidersExhausted { attempted } => assert_eq!(attempted, vec!["a", "b"]),
        other => panic!("unexpected error: {}", other),
    }
}
