//! Deep-research pipeline — multi-stage research orchestration.
//!
//! Sequences a 5-stage research run:
//! 1. **Plan** — turn the query into a set of web searches
//! 2. **Search** — execute the searches concurrently, tolerate failures
//! 3. **Evaluate** — judge whether the findings are sufficient
//! 4. **Write** — draft a structured markdown report
//! 5. **Deliver** — hand the report to the delivery capability
//!
//! The whole run is exposed as a lazy stream of progress events terminating
//! in the rendered report; see [`orchestrator::ResearchPipeline`].

pub mod deliverer;
pub mod evaluator;
pub mod orchestrator;
pub mod planner;
pub mod searcher;
pub mod writer;

pub use deliverer::Deliverer;
pub use evaluator::{EvaluationVerdict, Evaluator};
pub use orchestrator::{ProgressStream, ResearchPipeline};
pub use planner::{Planner, SearchItem, SearchPlan};
pub use searcher::{LogProgress, SearchProgress, SearchResultSet, Searcher};
pub use writer::{Report, ReportWriter};

use crate::error::StageError;
use serde::de::DeserializeOwned;

/// One increment of observable pipeline progress.
///
/// A run emits exactly six `Status` events in the order of [`StageStatus`],
/// then one terminal `Report` carrying the rendered markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A stage finished (or, for [`StageStatus::Started`], the run began).
    Status(StageStatus),
    /// Terminal event: the completed report's markdown text.
    Report(String),
}

/// The fixed status milestones of a run, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Started,
    PlanReady,
    SearchesComplete,
    EvaluationComplete,
    ReportDrafted,
    DeliveryComplete,
}

impl StageStatus {
    /// The human-readable status line for this milestone.
    pub fn message(&self) -> &'static str {
        match self {
            StageStatus::Started => "research started",
            StageStatus::PlanReady => "search plan ready",
            StageStatus::SearchesComplete => "searches complete",
            StageStatus::EvaluationComplete => "evaluation complete",
            StageStatus::ReportDrafted => "report drafted",
            StageStatus::DeliveryComplete => "delivery complete",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Parse a structured artifact out of completion text.
///
/// Tolerates markdown code fences around the JSON body; anything that does
/// not deserialize into `T` is a structural validation failure for the
/// calling stage.
pub(crate) fn parse_structured<T: DeserializeOwned>(
    artifact: &'static str,
    text: &str,
) -> Result<T, StageError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(body).map_err(|e| StageError::MalformedOutput {
        artifact,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Dummy {
        value: u32,
    }

    #[test]
    fn test_status_messages_in_order() {
        let statuses = [
            StageStatus::Started,
            StageStatus::PlanReady,
            StageStatus::SearchesComplete,
            StageStatus::EvaluationComplete,
            StageStatus::ReportDrafted,
            StageStatus::DeliveryComplete,
        ];
        let messages: Vec<&str> = statuses.iter().map(|s| s.message()).collect();
        assert_eq!(
            messages,
            vec![
                "research started",
                "search plan ready",
                "searches complete",
                "evaluation complete",
                "report drafted",
                "delivery complete",
            ]
        );
    }

    #[test]
    fn test_parse_structured_plain_json() {
        let parsed: Dummy = parse_structured("dummy", r#"{"value": 7}"#).unwrap();
        assert_eq!(parsed.value, 7);
    }

    #[test]
    fn test_parse_structured_fenced_json() {
        let parsed: Dummy =
            parse_structured("dummy", "```json\n{\"value\": 7}\n```").unwrap();
        assert_eq!(parsed.value, 7);
    }

    #[test]
    fn test_parse_structured_rejects_garbage() {
        let err = parse_structured::<Dummy>("dummy", "not json").unwrap_err();
        match err {
            StageError::MalformedOutput { artifact, .. } => assert_eq!(artifact, "dummy"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
