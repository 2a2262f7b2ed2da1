//! Evaluation stage: judge whether the collected findings are sufficient.
//!
//! The verdict is advisory: the orchestrator never branches on it, it is
//! passed through to the report writer as context. An empty result set is
//! still evaluated; "insufficient" is a verdict, not a pipeline failure.

use super::parse_structured;
use super::searcher::SearchResultSet;
use crate::config::RetryConfig;
use crate::error::{ResearchError, Stage};
use crate::llm::{LlmProvider, complete_with_retry};
use crate::types::CompletionRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const EVALUATOR_INSTRUCTIONS: &str = "You are an evaluation agent that assesses the quality of \
research results. Evaluate whether the search results are comprehensive, relevant, and \
sufficient to answer the research query. Consider relevance to the original query, breadth and \
depth of information, quality and reliability of sources, and completeness of coverage. Respond \
with a JSON object of the form {\"is_good\": true/false, \"reason\": \"...\"}.";

/// A structured sufficiency verdict over the collected findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    /// Whether the results are good enough to proceed with report writing.
    pub is_good: bool,
    /// Reasoning for the verdict, including strengths and weaknesses.
    pub reason: String,
}

/// The evaluation stage adapter.
pub struct Evaluator {
    llm: Arc<dyn LlmProvider>,
    retry: RetryConfig,
}

impl Evaluator {
    pub fn new(retry: RetryConfig, llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm, retry }
    }

    /// Compose the evaluation input from the collected summaries.
    fn compose_input(results: &SearchResultSet) -> String {
        let mut input = String::from("Search results to evaluate:\n");
        input.push_str(&results.iter().collect::<Vec<_>>().join("\n\n"));
        input
    }

    /// Judge the sufficiency of the collected findings.
    pub async fn evaluate(
        &self,
        results: &SearchResultSet,
    ) -> Result<EvaluationVerdict, ResearchError> {
        let request = CompletionRequest::from_instructions(
            EVALUATOR_INSTRUCTIONS,
            Self::compose_input(results),
        )
        .json();

        let response = complete_with_retry(self.llm.as_ref(), request, &self.retry)
            .await
            .map_err(|e| ResearchError::stage(Stage::Evaluator, e))?;

        parse_structured("evaluation verdict", &response.text)
            .map_err(|e| ResearchError::stage(Stage::Evaluator, e))
    }
}
