//! Pipeline orchestration: sequencing, streaming, abort policy.
//!
//! `ResearchPipeline::run` exposes one research run as a lazy stream of
//! progress events. Polling the stream is what drives the pipeline: nothing
//! happens until the consumer asks for the next event, each stage is fully
//! awaited before its status event is emitted, and the stream must not be
//! iterated concurrently or replayed.

use super::deliverer::Deliverer;
use super::evaluator::Evaluator;
use super::planner::Planner;
use super::searcher::{LogProgress, SearchProgress, Searcher};
use super::writer::ReportWriter;
use super::{ProgressEvent, StageStatus};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::llm::LlmProvider;
use crate::mail::Mailer;
use crate::search::SearchBackend;
use async_stream::try_stream;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A single research run's event stream.
///
/// Single-pass and non-restartable; a consumer observes either all six
/// status events followed by the terminal report, or a prefix of status
/// events followed by one stage-identified error.
pub type ProgressStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ProgressEvent, ResearchError>> + Send + 'a>>;

/// The pipeline orchestrator: owns the five stage adapters and sequences
/// them into a run.
///
/// Holds no per-run state, so one pipeline can serve any number of
/// sequential or concurrent `run` invocations; each invocation's state lives
/// entirely inside its own stream.
pub struct ResearchPipeline {
    planner: Planner,
    searcher: Searcher,
    evaluator: Evaluator,
    writer: ReportWriter,
    deliverer: Deliverer,
}

impl ResearchPipeline {
    /// Assemble a pipeline from configuration and the three capabilities.
    pub fn new(
        config: &ResearchConfig,
        llm: Arc<dyn LlmProvider>,
        backend: Arc<dyn SearchBackend>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let retry = config.pipeline.retry.clone();
        Self {
            planner: Planner::new(&config.pipeline, llm.clone()),
            searcher: Searcher::new(
                backend,
                Duration::from_secs(config.pipeline.search_timeout_secs),
            ),
            evaluator: Evaluator::new(retry.clone(), llm.clone()),
            writer: ReportWriter::new(retry, llm),
            deliverer: Deliverer::new(mailer, config.delivery.to_address.clone()),
        }
    }

    /// Run the pipeline for a query, logging search progress.
    pub fn run(&self, query: impl Into<String>) -> ProgressStream<'_> {
        self.run_with_observer(query, Arc::new(LogProgress))
    }

    /// Run the pipeline with a caller-supplied search progress observer.
    ///
    /// The observer is called after every search task settles with the
    /// number settled so far and the plan size ("k of N done").
    pub fn run_with_observer(
        &self,
        query: impl Into<String>,
        observer: Arc<dyn SearchProgress>,
    ) -> ProgressStream<'_> {
        let query = query.into();
        Box::pin(try_stream! {
            let query = validate_query(&query)?;

            info!(query = %query, "research started");
            yield ProgressEvent::Status(StageStatus::Started);

            let plan = self.planner.plan(&query).await?;
            yield ProgressEvent::Status(StageStatus::PlanReady);

            let results = self.searcher.perform(&plan, observer.as_ref()).await;
            info!(
                collected = results.len(),
                planned = plan.len(),
                "searches complete"
            );
            yield ProgressEvent::Status(StageStatus::SearchesComplete);

            let verdict = self.evaluator.evaluate(&results).await?;
            info!(is_good = verdict.is_good, "evaluation complete");
            yield ProgressEvent::Status(StageStatus::EvaluationComplete);

            let report = self.writer.write(&query, &results, &verdict).await?;
            yield ProgressEvent::Status(StageStatus::ReportDrafted);

            self.deliverer.deliver(&report).await?;
            yield ProgressEvent::Status(StageStatus::DeliveryComplete);

            yield ProgressEvent::Report(report.markdown_report);
        })
    }
}

/// Reject empty or whitespace-only queries before stage 1 begins.
fn validate_query(query: &str) -> Result<String, ResearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::EmptyQuery);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::error::Stage;
    use crate::llm::MockLlmProvider;
    use crate::mail::{MockMailer, NoopMailer};
    use crate::search::MockSearchBackend;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    const PLAN_JSON: &str = r#"{"searches": [
        {"query": "alpha", "reason": "first angle"},
        {"query": "beta", "reason": "second angle"}
    ]}"#;
    const VERDICT_JSON: &str = r#"{"is_good": true, "reason": "sufficient"}"#;
    const REPORT_JSON: &str = r#"{
        "short_summary": "In brief.",
        "markdown_report": "# Findings\n\nDetails.",
        "follow_up_questions": ["More?"]
    }"#;

    fn scripted_llm() -> MockLlmProvider {
        let llm = MockLlmProvider::new();
        llm.queue_response(MockLlmProvider::text_response(PLAN_JSON));
        llm.queue_response(MockLlmProvider::text_response(VERDICT_JSON));
        llm.queue_response(MockLlmProvider::text_response(REPORT_JSON));
        llm
    }

    fn pipeline_with(llm: MockLlmProvider, mailer: Arc<dyn Mailer>) -> ResearchPipeline {
        ResearchPipeline::new(
            &ResearchConfig::default(),
            Arc::new(llm),
            Arc::new(MockSearchBackend::new()),
            mailer,
        )
    }

    async fn collect(
        pipeline: &ResearchPipeline,
        query: &str,
    ) -> Vec<Result<ProgressEvent, ResearchError>> {
        pipeline.run(query).collect().await
    }

    #[tokio::test]
    async fn test_full_run_emits_fixed_event_order() {
        let pipeline = pipeline_with(scripted_llm(), Arc::new(NoopMailer::new()));
        let events = collect(&pipeline, "what is rust?").await;

        let statuses: Vec<StageStatus> = events
            .iter()
            .filter_map(|e| match e {
                Ok(ProgressEvent::Status(s)) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                StageStatus::Started,
                StageStatus::PlanReady,
                StageStatus::SearchesComplete,
                StageStatus::EvaluationComplete,
                StageStatus::ReportDrafted,
                StageStatus::DeliveryComplete,
            ]
        );

        // Exactly one terminal event, and it is last.
        let reports: Vec<&String> = events
            .iter()
            .filter_map(|e| match e {
                Ok(ProgressEvent::Report(text)) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0], "# Findings\n\nDetails.");
        assert!(matches!(
            events.last(),
            Some(Ok(ProgressEvent::Report(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_event() {
        let pipeline = pipeline_with(scripted_llm(), Arc::new(NoopMailer::new()));
        let events = collect(&pipeline, "   ").await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(ResearchError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_planner_failure_aborts_after_first_event() {
        let llm = MockLlmProvider::new();
        // Structurally invalid: items missing the `reason` field.
        llm.queue_response(MockLlmProvider::text_response(
            r#"{"searches": [{"query": "alpha"}]}"#,
        ));
        let pipeline = pipeline_with(llm, Arc::new(NoopMailer::new()));
        let events = collect(&pipeline, "query").await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &ProgressEvent::Status(StageStatus::Started)
        );
        match &events[1] {
            Err(e) => assert_eq!(e.failed_stage(), Some(Stage::Planner)),
            other => panic!("expected planner failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deliverer_failure_surfaces_after_five_statuses() {
        let pipeline = pipeline_with(scripted_llm(), Arc::new(MockMailer::failing("down")));
        let events = collect(&pipeline, "query").await;

        let ok_statuses = events
            .iter()
            .filter(|e| matches!(e, Ok(ProgressEvent::Status(_))))
            .count();
        assert_eq!(ok_statuses, 5);
        match events.last() {
            Some(Err(e)) => assert_eq!(e.failed_stage(), Some(Stage::Deliverer)),
            other => panic!("expected deliverer failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_plan_still_completes() {
        let llm = MockLlmProvider::new();
        llm.queue_response(MockLlmProvider::text_response(r#"{"searches": []}"#));
        llm.queue_response(MockLlmProvider::text_response(
            r#"{"is_good": false, "reason": "nothing was searched"}"#,
        ));
        llm.queue_response(MockLlmProvider::text_response(REPORT_JSON));

        let pipeline = pipeline_with(llm, Arc::new(NoopMailer::new()));
        let events = collect(&pipeline, "query").await;
        assert_eq!(events.len(), 7);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[tokio::test]
    async fn test_delivery_receives_the_drafted_report() {
        let mailer = Arc::new(MockMailer::new());
        let config = ResearchConfig {
            delivery: crate::config::DeliveryConfig {
                to_address: "reader@example.com".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let pipeline = ResearchPipeline::new(
            &config,
            Arc::new(scripted_llm()),
            Arc::new(MockSearchBackend::new()),
            mailer.clone(),
        );
        let events: Vec<_> = pipeline.run("query").collect().await;
        assert!(events.iter().all(|e| e.is_ok()));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "reader@example.com");
        assert_eq!(sent[0].subject, "In brief.");
        assert_eq!(sent[0].body, "# Findings\n\nDetails.");
    }

    #[tokio::test]
    async fn test_identical_queries_yield_identical_reports() {
        let run = |_: u32| async {
            let pipeline = pipeline_with(scripted_llm(), Arc::new(NoopMailer::new()));
            let events: Vec<_> = pipeline.run("same query").collect().await;
            match events.into_iter().last() {
                Some(Ok(ProgressEvent::Report(text))) => text,
                other => panic!("expected terminal report, got {other:?}"),
            }
        };
        let first = run(1).await;
        let second = run(2).await;
        assert_eq!(first, second);
    }
}
