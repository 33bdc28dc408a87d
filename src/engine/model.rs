//! Chat model abstraction used by [`ToolLoopEngine`](super::ToolLoopEngine).
//!
//! A [`ChatModel`] turns a conversation plus tool definitions into a reply
//! that carries text and/or tool calls. Provider-specific clients live
//! outside this crate; [`EchoModel`] is an offline model used by default and
//! in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::SchemaInfo;
use crate::error::Result;
use crate::tools::ToolDefinition;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to execute
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ModelToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Decode the arguments. Malformed JSON is surfaced to the tool as a
    /// `_parse_error` field rather than failing the run.
    pub fn parsed_arguments(&self) -> Value {
        if self.arguments.trim().is_empty() {
            return Value::Object(Map::new());
        }
        serde_json::from_str(&self.arguments).unwrap_or_else(|e| {
            tracing::warn!(tool = %self.name, error = %e, "Invalid JSON in tool arguments");
            serde_json::json!({ "_parse_error": format!("Invalid arguments JSON: {}", e) })
        })
    }
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ModelToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ModelMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: ModelRole::User,
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: ModelRole::Assistant,
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ModelToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::assistant(content)
        }
    }

    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: ModelRole::Tool,
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }
}

/// Everything a model sees for one completion.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub temperature: f32,
    /// System instruction
    pub instruction: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    /// Structured output the agent expects
    pub output_schema: SchemaInfo,
}

impl ModelRequest {
    /// Content of the most recent user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ModelRole::User)
            .map(|m| m.content.as_str())
    }
}

/// A model completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ModelToolCall>,
}

impl ModelReply {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tools(content: &str, tool_calls: Vec<ModelToolCall>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply>;

    /// Model backend name, used in logs
    fn name(&self) -> &str;
}

/// Offline model that answers with the user's own text.
///
/// The text is the input's `text`, `message` or `query` field, its only
/// string field, or the raw input. When the agent expects structured output
/// the text is placed in the first output field, so `{"text": "hi"}`
/// answers `{"response": "hi"}` for an output schema of `[response]`. It
/// never calls tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoModel;

impl EchoModel {
    fn extract_text(content: &str) -> String {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(map)) => {
                for key in ["text", "message", "query"] {
                    if let Some(Value::String(text)) = map.get(key) {
                        return text.clone();
                    }
                }
                let strings: Vec<&String> = map
                    .values()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                match strings.as_slice() {
                    [only] => (*only).clone(),
                    _ => content.to_string(),
                }
            }
            _ => content.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    async fn complete(&self, request: ModelRequest) -> Result<ModelReply> {
        let text = Self::extract_text(request.last_user_message().unwrap_or_default());
        let content = match request.output_schema.fields.first() {
            Some(field) => {
                let mut out = Map::new();
                out.insert(field.clone(), Value::String(text));
                Value::Object(out).to_string()
            }
            None => text,
        };
        Ok(ModelReply::text(&content))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(user: &str, fields: &[&str]) -> ModelRequest {
        ModelRequest {
            model: "gpt-4o-mini".into(),
            temperature: 0.4,
            instruction: String::new(),
            messages: vec![ModelMessage::user(user)],
            tools: vec![],
            output_schema: SchemaInfo {
                name: "Out".into(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_parsed_arguments() {
        let call = ModelToolCall::new("c1", "t", r#"{"a": 1}"#);
        assert_eq!(call.parsed_arguments(), json!({"a": 1}));
        assert_eq!(ModelToolCall::new("c1", "t", "").parsed_arguments(), json!({}));
        let bad = ModelToolCall::new("c1", "t", "{oops").parsed_arguments();
        assert!(bad["_parse_error"].as_str().unwrap().starts_with("Invalid arguments JSON"));
    }

    #[tokio::test]
    async fn test_echo_model_structured() {
        let reply = EchoModel
            .complete(request(r#"{"text": "hello"}"#, &["response"]))
            .await
            .unwrap();
        assert_eq!(reply.content, r#"{"response":"hello"}"#);
        assert!(!reply.has_tool_calls());
    }

    #[tokio::test]
    async fn test_echo_model_prefers_message_field() {
        let reply = EchoModel
            .complete(request(r#"{"message": "hi", "user_id": "u1"}"#, &["answer"]))
            .await
            .unwrap();
        assert_eq!(reply.content, r#"{"answer":"hi"}"#);
    }

    #[tokio::test]
    async fn test_echo_model_plain_text() {
        let reply = EchoModel.complete(request("just words", &[])).await.unwrap();
        assert_eq!(reply.content, "just words");
    }

    #[tokio::test]
    async fn test_echo_model_single_string_field() {
        let reply = EchoModel
            .complete(request(r#"{"conversation": "a: hi", "limit": 3}"#, &["summary"]))
            .await
            .unwrap();
        assert_eq!(reply.content, r#"{"summary":"a: hi"}"#);
    }

    #[test]
    fn test_last_user_message() {
        let mut req = request("first", &[]);
        req.messages.push(ModelMessage::assistant("reply"));
        req.messages.push(ModelMessage::user("second"));
        req.messages.push(ModelMessage::tool_result("c1", "tool out"));
        assert_eq!(req.last_user_message(), Some("second"));
    }
}
