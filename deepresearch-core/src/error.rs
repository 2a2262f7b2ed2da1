//! Error types for the deepresearch pipeline core.
//!
//! Uses `thiserror` for public API error types. The taxonomy mirrors the
//! pipeline's failure policy: a failed search task is a local concern of the
//! fan-in (logged and dropped, never surfaced here), while a failed stage
//! aborts the run and is reported as a [`ResearchError::Stage`] naming the
//! stage that failed.

use std::fmt;

/// The sequential stages that can abort a run.
///
/// The search stage is absent on purpose: per-item search failures are
/// tolerated and reduce the result set instead of failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planner,
    Evaluator,
    Writer,
    Deliverer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Planner => "planner",
            Stage::Evaluator => "evaluator",
            Stage::Writer => "writer",
            Stage::Deliverer => "deliverer",
        };
        f.write_str(name)
    }
}

/// Top-level error type for the deepresearch core library.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResearchError {
    /// Wrap a stage-level failure with the stage it happened in.
    pub fn stage(stage: Stage, source: impl Into<StageError>) -> Self {
        Self::Stage {
            stage,
            source: source.into(),
        }
    }

    /// The stage a run aborted in, if this is a stage failure.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Errors inside a single pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed {artifact}: {message}")]
    MalformedOutput {
        artifact: &'static str,
        message: String,
    },

    #[error("delivery failed: {0}")]
    Delivery(#[from] MailError),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Whether retrying the same request can plausibly succeed.
    ///
    /// Parse and auth failures are deterministic and never retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Connection { .. }
        )
    }
}

/// Errors from the web search capability.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {message}")]
    Request { message: String },

    #[error("search response parse error: {message}")]
    ResponseParse { message: String },

    #[error("summarization failed: {0}")]
    Summarize(#[from] LlmError),
}

/// Errors from the mail delivery capability.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `ResearchError`.
pub type Result<T> = std::result::Result<T, ResearchError>;
