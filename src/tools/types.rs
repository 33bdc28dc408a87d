//! Tool types for Agentry
//!
//! This module defines the [`Tool`] trait every capability implements, the
//! [`ToolContext`] a call runs in, and the [`ToolOutput`] it produces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Tool definition as advertised to the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique within an agent)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// Result of a tool call.
///
/// Tool failures (timeouts, HTTP errors, bad arguments) are results too:
/// the engine sees `content` either way and `is_error` only marks the
/// condition for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Content handed back to the engine as the tool result.
    pub content: String,
    /// Whether this result represents an error condition.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Wrap a JSON envelope; envelopes carrying an `error` key are errors.
    pub fn from_envelope(envelope: &Value) -> Self {
        Self {
            content: envelope.to_string(),
            is_error: envelope.get("error").is_some(),
        }
    }
}

/// Request-scoped context passed to every tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Agent the call is made for
    pub agent_name: Option<String>,
    /// User the run belongs to
    pub user_id: Option<String>,
    /// Session the run belongs to
    pub session_id: Option<String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent_name: &str) -> Self {
        self.agent_name = Some(agent_name.to_string());
        self
    }

    pub fn with_session(mut self, user_id: &str, session_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Context value for a well-known argument name.
    pub fn lookup(&self, arg: &str) -> Option<&str> {
        match arg {
            "user_id" => self.user_id.as_deref(),
            "session_id" => self.session_id.as_deref(),
            "agent_name" => self.agent_name.as_deref(),
            _ => None,
        }
    }
}

/// A capability the execution engine can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the engine calls the tool by.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn parameters(&self) -> Value;

    /// Run the tool.
    ///
    /// Expected failures should be returned as `Ok(ToolOutput::error(..))`;
    /// an `Err` is folded into an error output by the [`ToolSet`](super::ToolSet).
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_output_from_envelope() {
        let ok = ToolOutput::from_envelope(&json!({"success": true, "count": 0}));
        assert!(!ok.is_error);
        let err = ToolOutput::from_envelope(&json!({"error": "Request to backend API timed out"}));
        assert!(err.is_error);
        assert_eq!(err.content, r#"{"error":"Request to backend API timed out"}"#);
    }

    #[test]
    fn test_tool_context_lookup() {
        let ctx = ToolContext::new()
            .with_agent("Assistant")
            .with_session("u1", "s1");
        assert_eq!(ctx.lookup("user_id"), Some("u1"));
        assert_eq!(ctx.lookup("session_id"), Some("s1"));
        assert_eq!(ctx.lookup("agent_name"), Some("Assistant"));
        assert_eq!(ctx.lookup("limit"), None);
        assert_eq!(ToolContext::new().lookup("user_id"), None);
    }
}
