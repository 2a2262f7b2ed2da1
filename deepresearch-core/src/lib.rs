//! # Deepresearch Core
//!
//! Core library for the deepresearch pipeline.
//! Provides the pipeline orchestrator (plan → search → evaluate → write →
//! deliver), the LLM provider abstraction, the web search and mail
//! capabilities, configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod providers;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{DeliveryConfig, LlmConfig, PipelineConfig, ResearchConfig, RetryConfig, load_config};
pub use error::{ResearchError, Result, Stage};
pub use llm::{LlmProvider, MockLlmProvider};
pub use mail::{Mailer, MockMailer, NoopMailer, SmtpMailer};
pub use pipeline::{
    EvaluationVerdict, ProgressEvent, ProgressStream, Report, ResearchPipeline, SearchItem,
    SearchPlan, SearchProgress, SearchResultSet, StageStatus,
};
pub use providers::create_provider;
pub use search::{MockSearchBackend, MockSearchOutcome, SearchBackend, WebSearchBackend};
