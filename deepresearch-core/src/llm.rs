//! LLM provider abstraction.
//!
//! Defines the `LlmProvider` trait for model-agnostic generation calls and a
//! mock implementation with queued responses for tests. Every pipeline stage
//! that talks to the generation backend goes through this trait; provider
//! construction happens once at process start (see [`crate::providers`]).

use crate::config::RetryConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, TokenUsage};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the configured model name.
    fn model_name(&self) -> &str;
}

/// Perform a completion under a stage-scoped retry policy.
///
/// Only transient transport errors are retried (see [`LlmError::is_transient`]);
/// backoff doubles per attempt starting from `retry.backoff_ms`. With the
/// default policy of one attempt this is a plain `complete` call.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    request: CompletionRequest,
    retry: &RetryConfig,
) -> Result<CompletionResponse, LlmError> {
    let attempts = retry.max_attempts.max(1);
    let mut backoff = Duration::from_millis(retry.backoff_ms);

    for attempt in 1..=attempts {
        match provider.complete(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(attempt, error = %e, "transient LLM error, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("retry loop always returns")
}

/// A mock LLM provider for testing and development.
///
/// Returns queued outcomes in FIFO order; an empty queue yields a canned
/// placeholder response.
pub struct MockLlmProvider {
    model: String,
    responses: std::sync::Mutex<Vec<Result<CompletionResponse, LlmError>>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that always returns the given text.
    ///
    /// Queues multiple copies of the response so it can handle multiple calls.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_response(Self::text_response(text));
        }
        provider
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push(Ok(response));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push(Err(error));
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(MockLlmProvider::text_response(
                "Mock LLM: no queued responses available.",
            ))
        } else {
            responses.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_queued_responses_in_order() {
        let provider = MockLlmProvider::new();
        provider.queue_response(MockLlmProvider::text_response("first"));
        provider.queue_response(MockLlmProvider::text_response("second"));

        let r1 = provider.complete(CompletionRequest::default()).await.unwrap();
        let r2 = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "second");
    }

    #[tokio::test]
    async fn test_mock_fallback_when_empty() {
        let provider = MockLlmProvider::new();
        let r = provider.complete(CompletionRequest::default()).await.unwrap();
        assert!(r.text.contains("no queued responses"));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let provider = MockLlmProvider::new();
        provider.queue_error(LlmError::Connection {
            message: "reset by peer".into(),
        });
        provider.queue_response(MockLlmProvider::text_response("recovered"));

        let retry = RetryConfig {
            max_attempts: 2,
            backoff_ms: 1,
        };
        let r = complete_with_retry(&provider, CompletionRequest::default(), &retry)
            .await
            .unwrap();
        assert_eq!(r.text, "recovered");
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let provider = MockLlmProvider::new();
        provider.queue_error(LlmError::Connection {
            message: "reset by peer".into(),
        });
        provider.queue_response(MockLlmProvider::text_response("never reached"));

        let result =
            complete_with_retry(&provider, CompletionRequest::default(), &RetryConfig::default())
                .await;
        assert!(matches!(result, Err(LlmError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_non_transient_error_not_retried() {
        let provider = MockLlmProvider::new();
        provider.queue_error(LlmError::ResponseParse {
            message: "bad json".into(),
        });
        provider.queue_response(MockLlmProvider::text_response("never reached"));

        let retry = RetryConfig {
            max_attempts: 3,
            backoff_ms: 1,
        };
        let result = complete_with_retry(&provider, CompletionRequest::default(), &retry).await;
        assert!(matches!(result, Err(LlmError::ResponseParse { .. })));
    }
}
