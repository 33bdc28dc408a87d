//! Execution engine interface for Agentry
//!
//! An execution engine turns an instruction, a serialized input message and a
//! set of tools into an ordered stream of [`EngineEvent`]s, the last textual
//! one being the agent's answer. The orchestrator depends only on
//! [`ExecutionEngine`] and [`EngineFactory`]; how inference happens is the
//! engine's business.
//!
//! Reference engines:
//! - [`ToolLoopEngine`]: a tool-calling loop over any [`ChatModel`]
//! - [`CompositeEngine`]: runs sub-agents sequentially or in parallel

pub mod composite;
pub mod factory;
pub mod model;
pub mod tool_loop;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::hooks::ObservabilityHooks;
use crate::providers::ProviderName;
use crate::tools::ToolSet;

pub use composite::CompositeEngine;
pub use factory::ModelEngineFactory;
pub use model::{ChatModel, EchoModel, ModelMessage, ModelReply, ModelRequest, ModelRole, ModelToolCall};
pub use tool_loop::ToolLoopEngine;

/// How an agent's engine is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// A single model-driven agent with tools and delegatable sub-agents
    #[default]
    Llm,
    /// Sub-agents run in declaration order, each one's answer feeding the next
    Sequential,
    /// Sub-agents run concurrently on the same input
    Parallel,
}

/// Message handed to an engine for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMessage {
    pub role: String,
    pub text: String,
}

impl EngineMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            text: text.into(),
        }
    }
}

/// What an event represents.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Model output addressed to the caller
    Message,
    /// The model asked for a tool call
    ToolCall { name: String, arguments: Value },
    /// A tool call finished
    ToolResult {
        name: String,
        content: String,
        is_error: bool,
    },
}

/// One event of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    /// Agent (or sub-agent) that produced the event
    pub author: String,
    pub kind: EventKind,
    /// Text content, if any
    pub text: Option<String>,
}

impl EngineEvent {
    pub fn message(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            kind: EventKind::Message,
            text: Some(text.into()),
        }
    }

    pub fn tool_call(author: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            author: author.into(),
            kind: EventKind::ToolCall {
                name: name.into(),
                arguments,
            },
            text: None,
        }
    }

    pub fn tool_result(
        author: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            author: author.into(),
            kind: EventKind::ToolResult {
                name: name.into(),
                content: content.into(),
                is_error,
            },
            text: None,
        }
    }

    /// Non-empty text content.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Ordered event stream of one run.
pub type EventStream = BoxStream<'static, Result<EngineEvent>>;

/// Input/output shape advertised to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub fields: Vec<String>,
}

/// Runs an agent's turns.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Start a run and return its event stream.
    async fn run(&self, user_id: &str, session_id: &str, message: EngineMessage) -> Result<EventStream>;
}

/// A named sub-agent an engine can delegate to.
#[derive(Clone)]
pub struct SubAgent {
    pub name: String,
    pub description: String,
    pub engine: Arc<dyn ExecutionEngine>,
}

impl std::fmt::Debug for SubAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubAgent").field("name", &self.name).finish()
    }
}

/// Everything an engine is constructed with.
#[derive(Clone)]
pub struct EngineSpec {
    pub agent_name: String,
    pub description: String,
    pub instruction: String,
    pub provider: ProviderName,
    pub model: String,
    pub temperature: f32,
    pub kind: AgentKind,
    pub input_schema: SchemaInfo,
    pub output_schema: SchemaInfo,
    pub tools: ToolSet,
    pub sub_agents: Vec<SubAgent>,
    pub hooks: Option<Arc<dyn ObservabilityHooks>>,
}

impl std::fmt::Debug for EngineSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSpec")
            .field("agent_name", &self.agent_name)
            .field("model", &self.model)
            .field("kind", &self.kind)
            .field("tools", &self.tools)
            .field("sub_agents", &self.sub_agents)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

/// Builds the engine an agent binds to.
pub trait EngineFactory: Send + Sync {
    fn create(&self, spec: EngineSpec) -> Result<Arc<dyn ExecutionEngine>>;
}

/// Turn the receiving half of an event channel into an [`EventStream`].
pub(crate) fn channel_stream(rx: tokio::sync::mpsc::Receiver<Result<EngineEvent>>) -> EventStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

/// Drain a run and return the last non-empty text, if any.
pub async fn last_text(stream: EventStream) -> Result<Option<String>> {
    use futures::StreamExt;

    let mut stream = stream;
    let mut last = None;
    while let Some(event) = stream.next().await {
        if let Some(text) = event?.text() {
            last = Some(text.to_string());
        }
    }
    Ok(last)
}
