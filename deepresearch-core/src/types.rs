//! Boundary types for LLM completions.
//!
//! The pipeline only ever exchanges plain text with the generation backend:
//! structured stage artifacts are serialized into the prompt and parsed back
//! out of the completion text at each stage boundary.

use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A completion request sent to an LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Model override; `None` uses the provider's configured model.
    pub model: Option<String>,
    /// Temperature override; `None` uses the provider's configured default.
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Ask the provider for a JSON-object response. Set by stages that parse
    /// a structured artifact out of the completion.
    pub json: bool,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            model: None,
            temperature: None,
            max_tokens: None,
            json: false,
        }
    }
}

impl CompletionRequest {
    /// Build a request from a system instruction and a user input text.
    pub fn from_instructions(instructions: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(instructions), Message::user(input)],
            ..Self::default()
        }
    }

    /// Request a JSON-object response.
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Token accounting for a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A completion returned by an LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Assistant text content.
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}
