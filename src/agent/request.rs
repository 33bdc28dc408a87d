//! The chat boundary: requests in, uniform responses out.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One utterance of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: String,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
        }
    }
}

/// Caller query. On the wire it is a plain string, a list of turns or an
/// object of named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Query {
    Text(String),
    Turns(Vec<ConversationTurn>),
    Fields(Map<String, Value>),
}

impl Query {
    /// Render turns as `speaker: text` lines; other shapes as their text.
    pub fn transcript(&self) -> String {
        match self {
            Query::Text(text) => text.clone(),
            Query::Turns(turns) => turns
                .iter()
                .map(|t| format!("{}: {}", t.speaker, t.text))
                .collect::<Vec<_>>()
                .join("\n"),
            Query::Fields(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Text(text.to_string())
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::Text(text)
    }
}

impl From<Vec<ConversationTurn>> for Query {
    fn from(turns: Vec<ConversationTurn>) -> Self {
        Query::Turns(turns)
    }
}

impl From<Map<String, Value>> for Query {
    fn from(fields: Map<String, Value>) -> Self {
        Query::Fields(fields)
    }
}

/// A per-request feature override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMap {
    pub feature_name: String,
    pub feature_value: Value,
}

/// Reference to a binary artifact attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Inbound chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub agent_name: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub query: Query,
    #[serde(default)]
    pub features: Vec<FeatureMap>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl ChatRequest {
    pub fn new(agent_name: &str, user_id: &str, session_id: &str, query: impl Into<Query>) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            sender: None,
            query: query.into(),
            features: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    pub fn with_feature(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.features.push(FeatureMap {
            feature_name: name.to_string(),
            feature_value: value.into(),
        });
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Raw value of the last feature named `name`.
    pub fn feature_value(&self, name: &str) -> Option<&Value> {
        self.features
            .iter()
            .rev()
            .find(|f| f.feature_name == name)
            .map(|f| &f.feature_value)
    }

    /// Typed feature lookup; the last match wins.
    ///
    /// Falls back to `default` when the feature is absent or its value does
    /// not decode as `T`. Numeric strings decode as numbers.
    pub fn feature<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        let Some(value) = self.feature_value(name) else {
            return default;
        };
        if let Ok(v) = serde_json::from_value::<T>(value.clone()) {
            return v;
        }
        if let Some(parsed) = value
            .as_str()
            .and_then(|s| serde_json::from_str::<Value>(s.trim()).ok())
        {
            if let Ok(v) = serde_json::from_value::<T>(parsed) {
                return v;
            }
        }
        warn!(feature = name, value = %value, "Feature value has the wrong type; using default");
        default
    }
}

/// Agent answer: structured JSON when the output decoded, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Text(text) => text.is_empty(),
            Payload::Structured(value) => value.is_null(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Text(String::new())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => write!(f, "{}", text),
            Payload::Structured(value) => write!(f, "{}", value),
        }
    }
}

/// Uniform chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub agent_name: String,
    pub user_id: String,
    pub session_id: String,
    pub success: bool,
    pub agent_response: Payload,
}

impl ChatResponse {
    pub fn success(request: &ChatRequest, agent_response: Payload) -> Self {
        Self {
            agent_name: request.agent_name.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            success: true,
            agent_response,
        }
    }

    /// Failed response carrying `Error: <message>`.
    pub fn failure(request: &ChatRequest, error: impl fmt::Display) -> Self {
        Self {
            agent_name: request.agent_name.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            success: false,
            agent_response: Payload::Text(format!("Error: {}", error)),
        }
    }
}
