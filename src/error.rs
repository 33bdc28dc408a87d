//! Error types for Agentry
//!
//! This module defines the error taxonomy shared by the registry, the
//! configuration resolver, the orchestrator and the session layer.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Structured-decode failures in the response parser are deliberately absent:
//! they degrade to raw text and are only logged.

use thiserror::Error;

/// The primary error type for Agentry operations.
#[derive(Error, Debug)]
pub enum AgentryError {
    /// No explicit config, explicit path or caller-derived path yielded a
    /// loadable configuration.
    #[error("Config resolution error: {0}")]
    ConfigResolution(String),

    /// The configured model does not belong to the configured provider.
    #[error(
        "Model '{model}' is not compatible with provider '{provider}'. Available models for {provider}: [{}]",
        allowed.join(", ")
    )]
    IncompatibleModel {
        model: String,
        provider: String,
        allowed: Vec<String>,
    },

    /// Configuration content errors (unknown keys, out-of-range values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found (agents, sessions, tools, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tool failures that could not be folded into the tool's own result
    #[error("Tool error: {0}")]
    ToolInvocation(String),

    /// The execution engine failed while producing events
    #[error("Execution error: {0}")]
    Execution(String),

    /// A chat request could not be mapped onto an agent's input schema
    #[error("Input mapping error: {0}")]
    InputMapping(String),

    /// Session store failures (persistence, corrupt records, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AgentryError {
    /// Returns `true` for errors raised while constructing an agent.
    ///
    /// These are fatal for the agent: it must not serve traffic with a
    /// configuration it was not given.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            AgentryError::ConfigResolution(_)
                | AgentryError::IncompatibleModel { .. }
                | AgentryError::Config(_)
                | AgentryError::Yaml(_)
        )
    }
}

/// A specialized `Result` type for Agentry operations.
pub type Result<T> = std::result::Result<T, AgentryError>;
