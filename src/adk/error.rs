// SPDX-License-Identifier: MIT

//! Typed error handling for autonomais-rs
//!
//! Configuration problems surface while a workflow is being built, never
//! during a run. Everything else is a run-time failure that propagates to
//! the caller of `invoke` unchanged.

use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, AutonomaisError>;

/// Top-level error type for autonomais-rs
#[derive(Debug, Error)]
pub enum AutonomaisError {
    /// Malformed workflow or missing environment (construction time only)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A routing node produced a message that cannot be routed on
    #[error("Routing error at node '{node}': {reason}")]
    Routing { node: String, reason: String },

    /// The model or tool adapter failed
    #[error("Adapter error from {provider}: {message}")]
    Adapter { provider: String, message: String },

    /// Provider-specific model errors
    #[error("Model error: {0}")]
    Model(ModelError),

    /// The run was cancelled while a call was in flight
    #[error("Run cancelled")]
    Cancelled,

    /// Max iterations/steps reached
    #[error("Max {kind} reached: {limit}")]
    MaxIterations { kind: String, limit: usize },

    /// Checkpoint collaborator failures
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Workflow configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Graph misconfigured. Node name is required (node #{index})")]
    MissingName { index: usize },

    #[error("Graph misconfigured. Node instructions are required for node: {node}")]
    MissingInstructions { node: String },

    #[error("Graph misconfigured. Duplicate node name: {node}")]
    DuplicateNode { node: String },

    #[error("Linked node `{link}` not found (declared by node: {node})")]
    UnknownLink { node: String, link: String },

    #[error("Tool `{tool}` not found (declared by node: {node}). Available tools: [{}]", .available.join(", "))]
    UnknownTool {
        node: String,
        tool: String,
        available: Vec<String>,
    },

    #[error("Graph misconfigured. A workflow needs at least one node")]
    EmptyWorkflow,

    #[error("{var} not set")]
    MissingCredential { var: String },

    #[error("{0}")]
    Invalid(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Model not supported
    #[error("Model not supported: {0}")]
    UnsupportedModel(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl From<ModelError> for AutonomaisError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ApiKeyMissing(var) => Self::Config(ConfigError::MissingCredential { var }),
            other => Self::Model(other),
        }
    }
}

impl AutonomaisError {
    /// Create an adapter error
    pub fn adapter(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a routing error
    pub fn routing(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Routing {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error from a free-form message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(message.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
