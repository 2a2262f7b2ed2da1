//! Configuration system for deepresearch.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment. Configuration is loaded from
//! `~/.config/deepresearch/config.toml` and/or `.deepresearch/config.toml`
//! in the workspace directory, with `DEEPRESEARCH_`-prefixed environment
//! variables on top.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration for a research run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub delivery: DeliveryConfig,
    pub pipeline: PipelineConfig,
}

/// Configuration for the LLM generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai" (or any OpenAI-compatible endpoint), "mock".
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Maximum tokens to generate in a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// Configuration for the web search capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum raw results fed to the summarizer per search.
    pub max_results: usize,
    /// HTTP timeout for one search request, in seconds.
    pub http_timeout_secs: u64,
    /// User agent sent with search requests.
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            http_timeout_secs: 10,
            user_agent: "deepresearch/0.3".to_string(),
        }
    }
}

/// Configuration for report delivery over SMTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// SMTP username (usually the sending address).
    pub username: String,
    /// Environment variable name containing the SMTP password.
    pub password_env: String,
    pub from_address: String,
    pub to_address: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password_env: "DEEPRESEARCH_SMTP_PASSWORD".to_string(),
            from_address: String::new(),
            to_address: String::new(),
        }
    }
}

impl DeliveryConfig {
    /// Resolve the SMTP password from the configured environment variable.
    pub fn password(&self) -> Result<String, ConfigError> {
        std::env::var(&self.password_env).map_err(|_| ConfigError::EnvVarMissing {
            var: self.password_env.clone(),
        })
    }
}

/// Configuration for the pipeline orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How many searches the planner is asked to produce.
    pub plan_size: usize,
    /// Timeout for a single search task, in seconds. A timed-out task is
    /// dropped like any other failed task; it never stalls its siblings.
    pub search_timeout_secs: u64,
    /// Retry policy for the generation-calling stages.
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            plan_size: 5,
            search_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

/// Stage-scoped retry policy for LLM calls.
///
/// Only transient transport errors are retried; structural validation
/// failures abort the stage immediately. The default of one attempt means
/// no stage ever retries unless explicitly configured to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first. Minimum 1.
    pub max_attempts: u32,
    /// Initial backoff before the second attempt, doubled per retry.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 500,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DEEPRESEARCH_`)
/// 3. Workspace-local config (`.deepresearch/config.toml`)
/// 4. User config (`~/.config/deepresearch/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ResearchConfig>,
) -> Result<ResearchConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ResearchConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("rs", "deepresearch", "deepresearch")
    {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".deepresearch").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (DEEPRESEARCH_LLM__MODEL, DEEPRESEARCH_PIPELINE__PLAN_SIZE, ...)
    figment = figment.merge(Env::prefixed("DEEPRESEARCH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResearchConfig::default();
        assert_eq!(config.pipeline.plan_size, 5);
        assert_eq!(config.pipeline.retry.max_attempts, 1);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.delivery.smtp_port, 587);
    }

    #[test]
    fn test_workspace_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".deepresearch");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[llm]
model = "gpt-4o"

[pipeline]
plan_size = 3
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.pipeline.plan_size, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.pipeline.search_timeout_secs, 60);
    }

    #[test]
    fn test_explicit_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = ResearchConfig {
            pipeline: PipelineConfig {
                plan_size: 2,
                ..PipelineConfig::default()
            },
            ..ResearchConfig::default()
        };
        let config = load_config(Some(dir.path()), Some(&overrides)).unwrap();
        assert_eq!(config.pipeline.plan_size, 2);
    }

    #[test]
    fn test_password_env_missing() {
        let delivery = DeliveryConfig {
            password_env: "DEEPRESEARCH_TEST_NO_SUCH_VAR".to_string(),
            ..DeliveryConfig::default()
        };
        let err = delivery.password().unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarMissing { .. }));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = ResearchConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: ResearchConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.pipeline.plan_size, config.pipeline.plan_size);
        assert_eq!(back.llm.model, config.llm.model);
    }
}
