//! Scripted reply provider for tests.
//!
//! Each call consumes the next scripted behavior; once the script runs out
//! the last behavior repeats. Calls are captured for verification.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{LlmError, LlmResult};
use crate::provider::{ReplyProvider, DEFAULT_TIMEOUT};

/// What the mock does on a call.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this text.
    Reply(String),
    /// Fail with a transport error carrying this message.
    Fail(String),
    /// Never complete; only a timeout gets past this.
    Hang,
}

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub text: String,
    pub instruction: String,
}

/// Mock provider for testing.
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    rank: u32,
    timeout: Duration,
    script: Arc<RwLock<Vec<MockBehavior>>>,
    call_index: Arc<AtomicUsize>,
    captured: Arc<RwLock<Vec<CapturedRequest>>>,
}

impl MockProvider {
    /// Create a mock that replies with an empty string until scripted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rank: 0,
            timeout: DEFAULT_TIMEOUT,
            script: Arc::new(RwLock::new(Vec::new())),
            call_index: Arc::new(AtomicUsize::new(0)),
            captured: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Shorthand for a mock that always replies with `text`.
    pub fn replying(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).then(MockBehavior::Reply(text.into()))
    }

    /// Shorthand for a mock that always fails.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name).then(MockBehavior::Fail(message.into()))
    }

    /// Shorthand for a mock that never answers.
    pub fn hanging(name: impl Into<String>) -> Self {
        Self::new(name).then(MockBehavior::Hang)
    }

    /// Append a behavior to the script.
    pub fn then(self, behavior: MockBehavior) -> Self {
        self.script.write().push(behavior);
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

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_index.load(Ordering::SeqCst)
    }

    /// All captured requests, in call order.
    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.captured.read().clone()
    }

    fn next_behavior(&self) -> MockBehavior {
        let index = self.call_index.fetch_add(1, Ordering::SeqCst);
        let script = self.script.read();
        script
            .get(index)
            .or_else(|| script.last())
            .cloned()
            .unwrap_or_else(|| MockBehavior::Reply(String::new()))
    }
}

#[async_trait]
impl ReplyProvider for MockProvider {
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
        self.captured.write().push(CapturedRequest {
            text: text.to_string(),
            instruction: instruction.to_string(),
        });

        match self.next_behavior() {
            MockBehavior::Reply(reply) if reply.trim().is_empty() => Err(LlmError::EmptyReply {
                provider: self.name.clone(),
            }),
            MockBehavior::Reply(reply) => Ok(reply),
            MockBehavior::Fail(message) => Err(LlmError::Transport {
                provider: self.name.clone(),
                message,
            }),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_repeat_last() {
        let mock = MockProvider::new("mock")
            .then(MockBehavior::Fail("boom".to_string()))
            .then(MockBehavior::Reply("hi".to_string()));

        assert!(mock.generate("a", "i").await.is_err());
        assert_eq!(mock.generate("b", "i").await.unwrap(), "hi");
        assert_eq!(mock.generate("c", "i").await.unwrap(), "hi");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.captured_requests()[1].text, "b");
    }

    #[tokio::test]
    async fn test_unscripted_mock_is_empty_reply() {
        let mock = MockProvider::new("mock");
        let err = mock.generate("a", "i").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyReply { .. }));
    }
}
