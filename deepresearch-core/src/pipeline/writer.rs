//! Report writing stage.
//!
//! Composes the query, the collected summaries, and the evaluation verdict
//! into one input block with a stable layout, and parses the structured
//! report out of the completion.

use super::evaluator::EvaluationVerdict;
use super::parse_structured;
use super::searcher::SearchResultSet;
use crate::config::RetryConfig;
use crate::error::{ResearchError, Stage};
use crate::llm::{LlmProvider, complete_with_retry};
use crate::types::CompletionRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const WRITER_INSTRUCTIONS: &str = "You are a senior research writer tasked with creating a \
cohesive and insightful report for a research query. You will receive the original query along \
with summarized research findings and an evaluation of those findings. Begin by outlining the \
report structure, then generate a detailed markdown-formatted document. The report must be \
factual, well-organized, and comprehensive, covering all relevant findings in 5-10 pages (at \
least 1000 words). Respond with a JSON object of the form {\"short_summary\": \"...\", \
\"markdown_report\": \"...\", \"follow_up_questions\": [\"...\"]}.";

/// The terminal data artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// A short 2-3 sentence summary of the findings.
    pub short_summary: String,
    /// The final, full research report in markdown format.
    pub markdown_report: String,
    /// Suggested topics for further investigation.
    pub follow_up_questions: Vec<String>,
}

/// The report writing stage adapter.
pub struct ReportWriter {
    llm: Arc<dyn LlmProvider>,
    retry: RetryConfig,
}

impl ReportWriter {
    pub fn new(retry: RetryConfig, llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm, retry }
    }

    /// Compose the writer's input block.
    ///
    /// The layout is fixed so identical inputs always compose byte-identical
    /// prompts:
    ///
    /// ```text
    /// Original query: <query>
    /// Summarized search results:
    /// 1. <summary>
    /// ...
    /// Evaluation: is_good=<bool>; reason=<reason>
    /// ```
    ///
    /// Summaries are numbered in collection order; the numbering is a
    /// rendering detail, not a ranking.
    pub fn compose_input(
        query: &str,
        results: &SearchResultSet,
        verdict: &EvaluationVerdict,
    ) -> String {
        let mut input = format!("Original query: {}\nSummarized search results:\n", query);
        for (i, summary) in results.iter().enumerate() {
            input.push_str(&format!("{}. {}\n", i + 1, summary));
        }
        input.push_str(&format!(
            "Evaluation: is_good={}; reason={}",
            verdict.is_good, verdict.reason
        ));
        input
    }

    /// Draft the report from the query, the findings, and the verdict.
    pub async fn write(
        &self,
        query: &str,
        results: &SearchResultSet,
        verdict: &EvaluationVerdict,
    ) -> Result<Report, ResearchError> {
        let request = CompletionRequest::from_instructions(
            WRITER_INSTRUCTIONS,
            Self::compose_input(query, results, verdict),
        )
        .json();

        let response = complete_with_retry(self.llm.as_ref(), request, &self.retry)
            .await
            .map_err(|e| ResearchError::stage(Stage::Writer, e))?;

        parse_structured("report", &response.text)
            .map_err(|e| ResearchError::stage(Stage::Writer, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmProvider;
    use pretty_assertions::assert_eq;

    fn verdict() -> EvaluationVerdict {
        EvaluationVerdict {
            is_good: true,
            reason: "solid coverage".into(),
        }
    }

    #[test]
    fn test_compose_input_is_deterministic_and_documented() {
        let results = SearchResultSet::from_summaries(vec!["first".into(), "second".into()]);
        let a = ReportWriter::compose_input("my query", &results, &verdict());
        let b = ReportWriter::compose_input("my query", &results, &verdict());
        assert_eq!(a, b);
        assert_eq!(
            a,
            "Original query: my query\n\
             Summarized search results:\n\
             1. first\n\
             2. second\n\
             Evaluation: is_good=true; reason=solid coverage"
        );
    }

    #[tokio::test]
    async fn test_write_parses_report() {
        let llm = MockLlmProvider::with_response(
            r#"{
                "short_summary": "Findings in brief.",
                "markdown_report": "# Report\n\nBody.",
                "follow_up_questions": ["What next?"]
            }"#,
        );
        let writer = ReportWriter::new(RetryConfig::default(), Arc::new(llm));
        let report = writer
            .write("q", &SearchResultSet::default(), &verdict())
            .await
            .unwrap();
        assert_eq!(report.short_summary, "Findings in brief.");
        assert!(report.markdown_report.starts_with("# Report"));
        assert_eq!(report.follow_up_questions.len(), 1);
    }

    #[tokio::test]
    async fn test_write_malformed_report_is_stage_failure() {
        let llm = MockLlmProvider::with_response(r#"{"short_summary": "only this"}"#);
        let writer = ReportWriter::new(RetryConfig::default(), Arc::new(llm));
        let err = writer
            .write("q", &SearchResultSet::default(), &verdict())
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(Stage::Writer));
    }
}
