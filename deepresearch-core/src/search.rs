//! Web search capability: retrieval plus summarization.
//!
//! The pipeline's search workers hand this capability a combined
//! query+rationale text (see [`crate::pipeline::searcher`]) and get back one
//! bounded summary, or a failure. The default implementation fetches
//! DuckDuckGo instant answers (no API key required) and distills them with
//! the LLM; tests use [`MockSearchBackend`] with scripted outcomes.

use crate::error::SearchError;
use crate::llm::LlmProvider;
use crate::types::CompletionRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Prefix the search worker puts before the raw search term.
///
/// Both sides of the capability boundary rely on this wire format: the
/// worker composes `"Search term: <query>\nReason for searching: <reason>"`
/// and a backend may recover the bare term from the first line.
pub const SEARCH_TERM_PREFIX: &str = "Search term: ";

const SUMMARY_INSTRUCTIONS: &str = "You are a research assistant. Given a search term and raw \
search results, produce a concise summary of the results. The summary must be 2-3 paragraphs \
and less than 300 words. Capture the main points succinctly, without unnecessary text.";

/// The external search/summarization capability.
///
/// Input is the combined query+rationale text; output is a bounded summary
/// suitable for direct inclusion in the evaluation and report stages.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, input: &str) -> Result<String, SearchError>;
}

/// Recover the bare search term from a combined worker input.
///
/// Falls back to the full input when the wire-format prefix is absent.
pub(crate) fn leading_term(input: &str) -> &str {
    input
        .lines()
        .next()
        .and_then(|line| line.strip_prefix(SEARCH_TERM_PREFIX))
        .unwrap_or(input)
}

/// Search backend over DuckDuckGo instant answers with LLM summarization.
pub struct WebSearchBackend {
    client: reqwest::Client,
    llm: Arc<dyn LlmProvider>,
    max_results: usize,
}

impl WebSearchBackend {
    pub fn new(
        config: &crate::config::SearchConfig,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Request {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            llm,
            max_results: config.max_results,
        })
    }

    /// Fetch instant answers for a term and flatten them into one text block.
    async fn fetch_raw_results(&self, term: &str) -> Result<String, SearchError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(term)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: format!("search request failed: {}", e),
            })?;

        let body: serde_json::Value =
            response.json().await.map_err(|e| SearchError::ResponseParse {
                message: format!("failed to parse search response: {}", e),
            })?;

        let mut results = Vec::new();

        if let Some(abstract_text) = body.get("AbstractText").and_then(|v| v.as_str())
            && !abstract_text.is_empty()
        {
            let source = body
                .get("AbstractSource")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            let url = body
                .get("AbstractURL")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            results.push(format!("[{}] {}\n  URL: {}", source, abstract_text, url));
        }

        if let Some(topics) = body.get("RelatedTopics").and_then(|v| v.as_array()) {
            for topic in topics
                .iter()
                .take(self.max_results.saturating_sub(results.len()))
            {
                if let Some(text) = topic.get("Text").and_then(|v| v.as_str()) {
                    let url = topic.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
                    results.push(format!("- {}\n  URL: {}", text, url));
                }
            }
        }

        if let Some(res_array) = body.get("Results").and_then(|v| v.as_array()) {
            for result in res_array
                .iter()
                .take(self.max_results.saturating_sub(results.len()))
            {
                if let Some(text) = result.get("Text").and_then(|v| v.as_str()) {
                    let url = result.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
                    results.push(format!("- {}\n  URL: {}", text, url));
                }
            }
        }

        if results.is_empty() {
            Ok(format!("No instant answers found for \"{}\".", term))
        } else {
            Ok(results.join("\n\n"))
        }
    }
}

#[async_trait]
impl SearchBackend for WebSearchBackend {
    async fn search(&self, input: &str) -> Result<String, SearchError> {
        let term = leading_term(input);
        let raw = self.fetch_raw_results(term).await?;

        let request = CompletionRequest::from_instructions(
            SUMMARY_INSTRUCTIONS,
            format!("{}\n\nRaw search results:\n{}", input, raw),
        );
        let response = self.llm.complete(request).await.map_err(SearchError::from)?;
        Ok(response.text)
    }
}

/// One scripted outcome for [`MockSearchBackend`].
pub struct MockSearchOutcome {
    /// Artificial latency before the outcome resolves.
    pub delay: Duration,
    pub result: Result<String, SearchError>,
}

impl MockSearchOutcome {
    pub fn ok(summary: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(summary.to_string()),
        }
    }

    pub fn ok_after(summary: &str, delay: Duration) -> Self {
        Self {
            delay,
            result: Ok(summary.to_string()),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(SearchError::Request {
                message: message.to_string(),
            }),
        }
    }

    pub fn err_after(message: &str, delay: Duration) -> Self {
        Self {
            delay,
            result: Err(SearchError::Request {
                message: message.to_string(),
            }),
        }
    }

    /// An outcome that never resolves; exercises the worker-side timeout.
    pub fn hang() -> Self {
        Self {
            delay: Duration::from_secs(86_400),
            result: Err(SearchError::Request {
                message: "hung task resolved".to_string(),
            }),
        }
    }
}

/// A mock search backend with per-term scripted outcomes.
///
/// Outcomes are keyed by the bare search term so concurrent workers get
/// deterministic responses regardless of scheduling order. Terms without a
/// scripted outcome resolve to a generic summary.
#[derive(Default)]
pub struct MockSearchBackend {
    outcomes: std::sync::Mutex<HashMap<String, MockSearchOutcome>>,
    calls: std::sync::Mutex<Vec<String>>,
}

impl MockSearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for one search term.
    pub fn respond(self, term: &str, outcome: MockSearchOutcome) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(term.to_string(), outcome);
        self
    }

    /// The combined inputs this backend has been called with, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    async fn search(&self, input: &str) -> Result<String, SearchError> {
        self.calls.lock().unwrap().push(input.to_string());

        let term = leading_term(input).to_string();
        let outcome = self.outcomes.lock().unwrap().remove(&term);
        match outcome {
            Some(outcome) => {
                if !outcome.delay.is_zero() {
                    tokio::time::sleep(outcome.delay).await;
                }
                outcome.result
            }
            None => Ok(format!("Summary for \"{}\".", term)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_term_strips_prefix() {
        let input = "Search term: rust async\nReason for searching: find docs";
        assert_eq!(leading_term(input), "rust async");
    }

    #[test]
    fn test_leading_term_fallback() {
        assert_eq!(leading_term("plain query"), "plain query");
    }

    #[tokio::test]
    async fn test_mock_scripted_outcomes() {
        let backend = MockSearchBackend::new()
            .respond("a", MockSearchOutcome::ok("summary a"))
            .respond("b", MockSearchOutcome::err("boom"));

        let ok = backend.search("Search term: a\nReason for searching: x").await;
        assert_eq!(ok.unwrap(), "summary a");

        let err = backend.search("Search term: b\nReason for searching: x").await;
        assert!(matches!(err, Err(SearchError::Request { .. })));
    }

    #[tokio::test]
    async fn test_mock_default_summary() {
        let backend = MockSearchBackend::new();
        let out = backend
            .search("Search term: unscripted\nReason for searching: x")
            .await
            .unwrap();
        assert!(out.contains("unscripted"));
        assert_eq!(backend.calls().len(), 1);
    }
}
