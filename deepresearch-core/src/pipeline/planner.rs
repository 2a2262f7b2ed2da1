//! Search planning stage.
//!
//! Turns the research query into an ordered set of planned searches, each
//! with its rationale. The plan's order carries no meaning downstream: the
//! search stage executes items concurrently and collects whatever finishes.

use super::parse_structured;
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::{ResearchError, Stage};
use crate::llm::{LlmProvider, complete_with_retry};
use crate::types::CompletionRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const PLANNER_INSTRUCTIONS: &str = "You are a helpful research assistant. Given a query, come up \
with a set of web searches to perform to best answer the query. For each search give the exact \
term to search for and your reasoning for why this search is important to the query. Respond \
with a JSON object of the form {\"searches\": [{\"query\": \"...\", \"reason\": \"...\"}]}.";

/// One planned search unit with its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// The search term to use for the web search.
    pub query: String,
    /// Why this search is important to the overall query.
    pub reason: String,
}

/// An ordered set of planned searches. A zero-item plan is valid and simply
/// yields no results downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub searches: Vec<SearchItem>,
}

impl SearchPlan {
    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }
}

/// The planning stage adapter.
pub struct Planner {
    llm: Arc<dyn LlmProvider>,
    retry: RetryConfig,
    plan_size: usize,
}

impl Planner {
    pub fn new(config: &PipelineConfig, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            retry: config.retry.clone(),
            plan_size: config.plan_size,
        }
    }

    /// Plan the searches for a query.
    ///
    /// A capability error or a response that fails structural validation is
    /// a stage failure naming the planner.
    pub async fn plan(&self, query: &str) -> Result<SearchPlan, ResearchError> {
        let instructions = format!(
            "{} Output {} terms to query for.",
            PLANNER_INSTRUCTIONS, self.plan_size
        );
        let request =
            CompletionRequest::from_instructions(instructions, format!("Query: {}", query)).json();

        let response = complete_with_retry(self.llm.as_ref(), request, &self.retry)
            .await
            .map_err(|e| ResearchError::stage(Stage::Planner, e))?;

        let plan: SearchPlan = parse_structured("search plan", &response.text)
            .map_err(|e| ResearchError::stage(Stage::Planner, e))?;

        info!(searches = plan.len(), "search plan ready");
        Ok(plan)
    }
}
