//! Engines that only orchestrate sub-agents.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{
    channel_stream, AgentKind, EngineEvent, EngineMessage, EngineSpec, EventStream, ExecutionEngine,
    SubAgent,
};
use crate::error::{AgentryError, Result};

/// Runs sub-agents without a model of its own.
///
/// - `Sequential`: each sub-agent's last text becomes the next one's input;
///   the final sub-agent's answer is the run's answer.
/// - `Parallel`: every sub-agent gets the same input concurrently; the run
///   ends with a JSON object mapping sub-agent name to its answer.
#[derive(Clone)]
pub struct CompositeEngine {
    agent_name: String,
    kind: AgentKind,
    sub_agents: Arc<Vec<SubAgent>>,
}

impl CompositeEngine {
    /// # Errors
    ///
    /// Returns a `Config` error for `Llm` specs or specs without sub-agents.
    pub fn new(spec: EngineSpec) -> Result<Self> {
        if spec.kind == AgentKind::Llm {
            return Err(AgentryError::Config(format!(
                "agent '{}' is not a composite agent",
                spec.agent_name
            )));
        }
        if spec.sub_agents.is_empty() {
            return Err(AgentryError::Config(format!(
                "composite agent '{}' has no sub-agents",
                spec.agent_name
            )));
        }
        Ok(Self {
            agent_name: spec.agent_name,
            kind: spec.kind,
            sub_agents: Arc::new(spec.sub_agents),
        })
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }
}

type EventSender = mpsc::Sender<Result<EngineEvent>>;

async fn forward(tx: &EventSender, event: EngineEvent) -> Result<()> {
    tx.send(Ok(event))
        .await
        .map_err(|_| AgentryError::Execution("event consumer dropped".to_string()))
}

/// Run one sub-agent to completion, returning its events and last text.
async fn run_to_end(
    sub: &SubAgent,
    user_id: &str,
    session_id: &str,
    input: String,
) -> Result<(Vec<EngineEvent>, Option<String>)> {
    let mut stream = sub
        .engine
        .run(user_id, session_id, EngineMessage::user(input))
        .await?;
    let mut events = Vec::new();
    let mut last = None;
    while let Some(event) = stream.next().await {
        let event = event?;
        if let Some(text) = event.text() {
            last = Some(text.to_string());
        }
        events.push(event);
    }
    Ok((events, last))
}

impl CompositeEngine {
    async fn run_sequential(&self, user_id: &str, session_id: &str, message: EngineMessage, tx: &EventSender) -> Result<()> {
        let mut input = message.text;
        for sub in self.sub_agents.iter() {
            debug!(agent = %self.agent_name, sub_agent = %sub.name, "Running sequential step");
            let mut stream = sub
                .engine
                .run(user_id, session_id, EngineMessage::user(input.clone()))
                .await?;
            while let Some(event) = stream.next().await {
                let event = event?;
                if let Some(text) = event.text() {
                    input = text.to_string();
                }
                forward(tx, event).await?;
            }
        }
        Ok(())
    }

    async fn run_parallel(&self, user_id: &str, session_id: &str, message: EngineMessage, tx: &EventSender) -> Result<()> {
        let runs = self
            .sub_agents
            .iter()
            .map(|sub| run_to_end(sub, user_id, session_id, message.text.clone()));
        let results = join_all(runs).await;

        let mut merged = Map::new();
        for (sub, result) in self.sub_agents.iter().zip(results) {
            let (events, last) = result?;
            for event in events {
                forward(tx, event).await?;
            }
            merged.insert(sub.name.clone(), last.map_or(Value::Null, Value::String));
        }
        forward(tx, EngineEvent::message(&self.agent_name, Value::Object(merged).to_string())).await
    }
}

#[async_trait]
impl ExecutionEngine for CompositeEngine {
    async fn run(&self, user_id: &str, session_id: &str, message: EngineMessage) -> Result<EventStream> {
        let (tx, rx) = mpsc::channel(32);
        let engine = self.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            let outcome = match engine.kind {
                AgentKind::Parallel => engine.run_parallel(&user_id, &session_id, message, &tx).await,
                _ => engine.run_sequential(&user_id, &session_id, message, &tx).await,
            };
            if let Err(e) = outcome {
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(channel_stream(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::EchoModel;
    use crate::engine::{last_text, SchemaInfo, ToolLoopEngine};
    use crate::providers::ProviderName;
    use crate::tools::ToolSet;

    fn spec(name: &str, kind: AgentKind, sub_agents: Vec<SubAgent>, fields: &[&str]) -> EngineSpec {
        EngineSpec {
            agent_name: name.into(),
            description: String::new(),
            instruction: String::new(),
            provider: ProviderName::OpenAi,
            model: "gpt-4o-mini".into(),
            temperature: 0.4,
            kind,
            input_schema: SchemaInfo::default(),
            output_schema: SchemaInfo {
                name: "Out".into(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
            tools: ToolSet::new(),
            sub_agents,
            hooks: None,
        }
    }

    fn echo_sub(name: &str, fields: &[&str]) -> SubAgent {
        SubAgent {
            name: name.into(),
            description: String::new(),
            engine: Arc::new(ToolLoopEngine::new(
                spec(name, AgentKind::Llm, vec![], fields),
                Arc::new(EchoModel),
            )),
        }
    }

    #[test]
    fn test_requires_sub_agents() {
        assert!(CompositeEngine::new(spec("P", AgentKind::Parallel, vec![], &[])).is_err());
        assert!(CompositeEngine::new(spec("L", AgentKind::Llm, vec![echo_sub("a", &[])], &[])).is_err());
    }

    #[tokio::test]
    async fn test_sequential_pipes_answers() {
        let engine = CompositeEngine::new(spec(
            "Pipeline",
            AgentKind::Sequential,
            vec![echo_sub("first", &["text"]), echo_sub("second", &["response"])],
            &[],
        ))
        .unwrap();
        let stream = engine.run("u", "s", EngineMessage::user("hi")).await.unwrap();
        let text = last_text(stream).await.unwrap();
        assert_eq!(text.as_deref(), Some(r#"{"response":"hi"}"#));
    }

    #[tokio::test]
    async fn test_parallel_merges_answers() {
        let engine = CompositeEngine::new(spec(
            "Fanout",
            AgentKind::Parallel,
            vec![echo_sub("a", &[]), echo_sub("b", &["out"])],
            &[],
        ))
        .unwrap();
        assert_eq!(engine.kind(), AgentKind::Parallel);
        let stream = engine.run("u", "s", EngineMessage::user("hi")).await.unwrap();
        let text = last_text(stream).await.unwrap().unwrap();
        let merged: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(merged["a"], "hi");
        assert_eq!(merged["b"], r#"{"out":"hi"}"#);
    }
}
