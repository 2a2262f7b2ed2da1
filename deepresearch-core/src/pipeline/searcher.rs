//! Concurrent search stage: fan-out, fan-in, partial-failure tolerance.
//!
//! One task per planned item, no ordering dependency and no shared mutable
//! state between tasks. Results are collected in completion order; a failed
//! or timed-out task is logged and dropped without touching its siblings or
//! the run. The stage itself is infallible: the worst case is an empty
//! result set, which the evaluation stage is expected to handle.

use super::planner::{SearchItem, SearchPlan};
use crate::error::SearchError;
use crate::search::{SEARCH_TERM_PREFIX, SearchBackend};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The unordered collection of successful search summaries.
///
/// Append-only while the fan-in runs, frozen afterwards. Entries sit in
/// completion order, which carries no meaning; consumers must not rely on
/// any ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultSet {
    summaries: Vec<String>,
}

impl SearchResultSet {
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.summaries.iter().map(String::as_str)
    }

    fn push(&mut self, summary: String) {
        self.summaries.push(summary);
    }

    /// Build a set from already-collected summaries. Intended for tests and
    /// for callers that drive the downstream stages directly.
    pub fn from_summaries(summaries: Vec<String>) -> Self {
        Self { summaries }
    }
}

/// Observer for fan-in progress: called after every task settles, success
/// or failure, with the number settled so far and the total.
pub trait SearchProgress: Send + Sync {
    fn on_settled(&self, completed: usize, total: usize);
}

/// Default observer: logs "k of N" at debug level.
#[derive(Default)]
pub struct LogProgress;

impl SearchProgress for LogProgress {
    fn on_settled(&self, completed: usize, total: usize) {
        debug!(completed, total, "search task settled");
    }
}

/// A single task's failure. Recovered at the fan-in boundary, never
/// propagated past this module.
#[derive(Debug, thiserror::Error)]
enum TaskFailure {
    #[error("{0}")]
    Backend(#[from] SearchError),

    #[error("search timed out after {0}s")]
    Timeout(u64),
}

/// The search stage: fans a plan out to concurrent workers and collects the
/// successful summaries.
pub struct Searcher {
    backend: Arc<dyn SearchBackend>,
    timeout: Duration,
}

impl Searcher {
    pub fn new(backend: Arc<dyn SearchBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Execute every planned search concurrently and collect the results.
    ///
    /// Yields to `progress` after each task settles so callers can observe
    /// "k of N done". An empty plan completes immediately with an empty set;
    /// all tasks failing also yields an empty set rather than an error.
    pub async fn perform(
        &self,
        plan: &SearchPlan,
        progress: &dyn SearchProgress,
    ) -> SearchResultSet {
        let total = plan.len();
        let mut results = SearchResultSet::default();
        if total == 0 {
            return results;
        }

        let mut tasks: FuturesUnordered<_> = plan
            .searches
            .iter()
            .map(|item| self.search_one(item))
            .collect();

        let mut completed = 0;
        while let Some(outcome) = tasks.next().await {
            completed += 1;
            match outcome {
                Ok(summary) => results.push(summary),
                Err(failure) => {
                    warn!(error = %failure, "search task failed, dropping its result");
                }
            }
            progress.on_settled(completed, total);
        }

        debug!(
            collected = results.len(),
            total, "search fan-in complete"
        );
        results
    }

    /// Run one search task, bounded by the per-task timeout.
    async fn search_one(&self, item: &SearchItem) -> Result<String, TaskFailure> {
        let input = combined_input(item);
        match tokio::time::timeout(self.timeout, self.backend.search(&input)).await {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err(TaskFailure::Backend(e)),
            Err(_) => Err(TaskFailure::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Compose the worker's input to the search capability.
pub(crate) fn combined_input(item: &SearchItem) -> String {
    format!(
        "{}{}\nReason for searching: {}",
        SEARCH_TERM_PREFIX, item.query, item.reason
    )
}
