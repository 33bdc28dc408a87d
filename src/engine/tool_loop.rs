//! Tool-calling loop over a [`ChatModel`].
//!
//! Each run sends the session's history plus the new user message to the
//! model, executes any tool calls it asks for, feeds the results back and
//! repeats until the model answers without tool calls or the iteration limit
//! is reached. Sub-agents are offered to the model as tools taking a single
//! `request` argument.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::model::{ChatModel, ModelMessage, ModelReply, ModelRequest, ModelRole};
use crate::engine::{
    channel_stream, last_text, EngineEvent, EngineMessage, EngineSpec, EventStream,
    ExecutionEngine, SchemaInfo, SubAgent,
};
use crate::error::{AgentryError, Result};
use crate::hooks::{ObservabilityHooks, RunScope};
use crate::tools::{ToolContext, ToolDefinition, ToolOutput, ToolSet};

/// Default cap on model round-trips that request tools.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;

/// Messages of history kept per session.
const HISTORY_LIMIT: usize = 50;

/// Default cap on sessions with history held in memory; the least recently
/// used session is dropped past it.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

const EVENT_BUFFER: usize = 32;

/// Engine that drives a [`ChatModel`] through tool calls.
#[derive(Clone)]
pub struct ToolLoopEngine {
    inner: Arc<LoopInner>,
}

struct LoopInner {
    agent_name: String,
    instruction: String,
    model_name: String,
    temperature: f32,
    output_schema: SchemaInfo,
    tools: ToolSet,
    sub_agents: Vec<SubAgent>,
    hooks: Option<Arc<dyn ObservabilityHooks>>,
    model: Arc<dyn ChatModel>,
    max_iterations: usize,
    max_sessions: usize,
    history: Mutex<History>,
}

type SessionId = (String, String);

#[derive(Default)]
struct History {
    sessions: HashMap<SessionId, SessionHistory>,
    clock: u64,
}

struct SessionHistory {
    messages: Vec<ModelMessage>,
    last_used: u64,
}

impl ToolLoopEngine {
    pub fn new(spec: EngineSpec, model: Arc<dyn ChatModel>) -> Self {
        Self {
            inner: Arc::new(LoopInner {
                agent_name: spec.agent_name,
                instruction: spec.instruction,
                model_name: spec.model,
                temperature: spec.temperature,
                output_schema: spec.output_schema,
                tools: spec.tools,
                sub_agents: spec.sub_agents,
                hooks: spec.hooks,
                model,
                max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
                max_sessions: DEFAULT_MAX_SESSIONS,
                history: Mutex::new(History::default()),
            }),
        }
    }

    /// Set the iteration limit. Only effective before the engine is shared.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.max_iterations = max_iterations;
        }
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.inner.max_iterations
    }

    /// Set how many sessions keep history. Only effective before the engine
    /// is shared.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.max_sessions = max_sessions.max(1);
        }
        self
    }

    /// Tools and sub-agents as offered to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.inner.definitions()
    }

    /// Number of history messages kept for a session.
    pub fn history_len(&self, user_id: &str, session_id: &str) -> usize {
        self.inner
            .history
            .lock()
            .map(|h| {
                h.sessions
                    .get(&(user_id.to_string(), session_id.to_string()))
                    .map_or(0, |s| s.messages.len())
            })
            .unwrap_or(0)
    }

    /// Sessions currently holding history.
    pub fn tracked_sessions(&self) -> usize {
        self.inner.history.lock().map(|h| h.sessions.len()).unwrap_or(0)
    }

    /// Drop a session's history. Returns whether any was held.
    pub fn forget_session(&self, user_id: &str, session_id: &str) -> bool {
        self.inner
            .history
            .lock()
            .map(|mut h| {
                h.sessions
                    .remove(&(user_id.to_string(), session_id.to_string()))
                    .is_some()
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl ExecutionEngine for ToolLoopEngine {
    async fn run(&self, user_id: &str, session_id: &str, message: EngineMessage) -> Result<EventStream> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let inner = Arc::clone(&self.inner);
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = inner.drive(&user_id, &session_id, message, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(channel_stream(rx))
    }
}

impl LoopInner {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self.tools.definitions();
        definitions.extend(self.sub_agents.iter().map(|sub| ToolDefinition {
            name: sub.name.clone(),
            description: sub.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "request": {
                        "type": "string",
                        "description": "What the sub-agent should do"
                    }
                },
                "required": ["request"]
            }),
        }));
        definitions
    }

    fn history_for(&self, key: &SessionId) -> Vec<ModelMessage> {
        self.history
            .lock()
            .map(|h| {
                h.sessions
                    .get(key)
                    .map(|s| s.messages.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn save_history(&self, key: SessionId, new_messages: Vec<ModelMessage>) {
        let Ok(mut history) = self.history.lock() else {
            return;
        };
        history.clock += 1;
        let now = history.clock;
        let session = history.sessions.entry(key).or_insert_with(|| SessionHistory {
            messages: Vec::new(),
            last_used: now,
        });
        session.last_used = now;
        let entry = &mut session.messages;
        entry.extend(new_messages);
        if entry.len() > HISTORY_LIMIT {
            let excess = entry.len() - HISTORY_LIMIT;
            entry.drain(..excess);
        }
        // History must open on a user turn, never on an orphaned tool result.
        let first_user = entry
            .iter()
            .position(|m| m.role == ModelRole::User)
            .unwrap_or(entry.len());
        entry.drain(..first_user);

        while history.sessions.len() > self.max_sessions {
            let Some(oldest) = history
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            debug!(
                agent = %self.agent_name,
                user = %oldest.0,
                session = %oldest.1,
                "Dropping least recently used history"
            );
            history.sessions.remove(&oldest);
        }
    }

    async fn emit(&self, tx: &mpsc::Sender<Result<EngineEvent>>, event: EngineEvent) -> Result<()> {
        tx.send(Ok(event))
            .await
            .map_err(|_| AgentryError::Execution("event consumer dropped".to_string()))
    }

    async fn complete(&self, scope: &RunScope, messages: &[ModelMessage], tools: &[ToolDefinition]) -> Result<ModelReply> {
        if let Some(hooks) = &self.hooks {
            hooks.before_model(scope, &self.model_name);
        }
        let started = Instant::now();
        let reply = self
            .model
            .complete(ModelRequest {
                model: self.model_name.clone(),
                temperature: self.temperature,
                instruction: self.instruction.clone(),
                messages: messages.to_vec(),
                tools: tools.to_vec(),
                output_schema: self.output_schema.clone(),
            })
            .await;
        if let Some(hooks) = &self.hooks {
            hooks.after_model(scope, &self.model_name, started.elapsed());
        }
        reply
    }

    async fn invoke(&self, name: &str, args: Value, ctx: &ToolContext, user_id: &str, session_id: &str) -> ToolOutput {
        let Some(sub) = self.sub_agents.iter().find(|s| s.name == name) else {
            return self.tools.execute(name, args, ctx).await;
        };

        let request = match args.get("request") {
            Some(Value::String(text)) => text.clone(),
            _ => args.to_string(),
        };
        debug!(agent = %self.agent_name, sub_agent = %sub.name, "Delegating to sub-agent");
        let answer = match sub.engine.run(user_id, session_id, EngineMessage::user(request)).await {
            Ok(stream) => last_text(stream).await,
            Err(e) => Err(e),
        };
        match answer {
            Ok(text) => ToolOutput::success(text.unwrap_or_default()),
            Err(e) => ToolOutput::error(format!("Error: {}", e)),
        }
    }

    async fn drive(
        &self,
        user_id: &str,
        session_id: &str,
        message: EngineMessage,
        tx: &mpsc::Sender<Result<EngineEvent>>,
    ) -> Result<()> {
        let key = (user_id.to_string(), session_id.to_string());
        let scope = RunScope::new(&self.agent_name, user_id, session_id);
        let ctx = ToolContext::new()
            .with_agent(&self.agent_name)
            .with_session(user_id, session_id);
        let definitions = self.definitions();

        let mut messages = self.history_for(&key);
        let turn_start = messages.len();
        messages.push(ModelMessage::user(&message.text));

        let mut reply = self.complete(&scope, &messages, &definitions).await?;
        let mut iteration = 0;

        while reply.has_tool_calls() && iteration < self.max_iterations {
            iteration += 1;
            debug!(agent = %self.agent_name, "Tool iteration {} of {}", iteration, self.max_iterations);

            if !reply.content.trim().is_empty() {
                self.emit(tx, EngineEvent::message(&self.agent_name, &reply.content))
                    .await?;
            }
            messages.push(ModelMessage::assistant_with_tools(
                &reply.content,
                reply.tool_calls.clone(),
            ));

            for call in &reply.tool_calls {
                info!(agent = %self.agent_name, tool = %call.name, id = %call.id, "Executing tool");
                let args = call.parsed_arguments();
                self.emit(tx, EngineEvent::tool_call(&self.agent_name, &call.name, args.clone()))
                    .await?;

                if let Some(hooks) = &self.hooks {
                    hooks.before_tool(&scope, &call.name, &args);
                }
                let started = Instant::now();
                let output = self.invoke(&call.name, args, &ctx, user_id, session_id).await;
                if let Some(hooks) = &self.hooks {
                    hooks.after_tool(&scope, &call.name, output.is_error, started.elapsed());
                }

                self.emit(
                    tx,
                    EngineEvent::tool_result(&self.agent_name, &call.name, &output.content, output.is_error),
                )
                .await?;
                messages.push(ModelMessage::tool_result(&call.id, &output.content));
            }

            reply = self.complete(&scope, &messages, &definitions).await?;
        }

        if iteration >= self.max_iterations && reply.has_tool_calls() {
            info!(
                agent = %self.agent_name,
                iterations = iteration,
                "Tool loop reached maximum iterations, returning partial response"
            );
        }

        messages.push(ModelMessage::assistant(&reply.content));
        self.save_history(key, messages.split_off(turn_start));
        self.emit(tx, EngineEvent::message(&self.agent_name, &reply.content))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{EchoModel, ModelToolCall};
    use crate::engine::{AgentKind, EventKind, MockExecutionEngine};
    use crate::providers::ProviderName;
    use crate::tools::EchoTool;
    use futures::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays canned replies in order, then answers "done".
    struct ScriptedModel {
        replies: Mutex<Vec<ModelReply>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<ModelReply>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: ModelRequest) -> Result<ModelReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| ModelReply::text("done")))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _request: ModelRequest) -> Result<ModelReply> {
            Err(AgentryError::Execution("model unavailable".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn spec(tools: ToolSet, sub_agents: Vec<SubAgent>) -> EngineSpec {
        EngineSpec {
            agent_name: "Assistant".into(),
            description: String::new(),
            instruction: "Help.".into(),
            provider: ProviderName::OpenAi,
            model: "gpt-4o-mini".into(),
            temperature: 0.4,
            kind: AgentKind::Llm,
            input_schema: SchemaInfo::default(),
            output_schema: SchemaInfo::default(),
            tools,
            sub_agents,
            hooks: None,
        }
    }

    fn echo_tools() -> ToolSet {
        let mut tools = ToolSet::new();
        tools.register(Arc::new(EchoTool::new("echo")));
        tools
    }

    async fn collect(engine: &ToolLoopEngine, text: &str) -> Vec<EngineEvent> {
        engine
            .run("u1", "s1", EngineMessage::user(text))
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let engine = ToolLoopEngine::new(spec(ToolSet::new(), vec![]), Arc::new(EchoModel));
        let events = collect(&engine, "hello").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply::with_tools("", vec![ModelToolCall::new("c1", "echo", r#"{"message": "ping"}"#)]),
            ModelReply::text("tool said ping"),
        ]));
        let engine = ToolLoopEngine::new(spec(echo_tools(), vec![]), model.clone());
        let events = collect(&engine, "go").await;

        assert!(matches!(&events[0].kind, EventKind::ToolCall { name, .. } if name == "echo"));
        match &events[1].kind {
            EventKind::ToolResult { content, is_error, .. } => {
                assert_eq!(content, "ping");
                assert!(!is_error);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events.last().unwrap().text(), Some("tool said ping"));

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let tool_msg = seen[1].messages.last().unwrap();
        assert_eq!(tool_msg.role, ModelRole::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_result_text() {
        let model = Arc::new(ScriptedModel::new(vec![ModelReply::with_tools(
            "",
            vec![ModelToolCall::new("c1", "missing", "{}")],
        )]));
        let engine = ToolLoopEngine::new(spec(ToolSet::new(), vec![]), model);
        let events = collect(&engine, "go").await;
        match &events[1].kind {
            EventKind::ToolResult { content, is_error, .. } => {
                assert_eq!(content, "Tool not found: missing");
                assert!(is_error);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events.last().unwrap().text(), Some("done"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let looping: Vec<ModelReply> = (0..10)
            .map(|i| {
                ModelReply::with_tools(
                    "thinking",
                    vec![ModelToolCall::new(&format!("c{i}"), "echo", r#"{"message": "x"}"#)],
                )
            })
            .collect();
        let model = Arc::new(ScriptedModel::new(looping));
        let engine = ToolLoopEngine::new(spec(echo_tools(), vec![]), model.clone()).with_max_iterations(2);
        assert_eq!(engine.max_iterations(), 2);

        let events = collect(&engine, "go").await;
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(events.last().unwrap().text(), Some("thinking"));
    }

    #[tokio::test]
    async fn test_model_failure_is_stream_error() {
        let engine = ToolLoopEngine::new(spec(ToolSet::new(), vec![]), Arc::new(FailingModel));
        let stream = engine.run("u1", "s1", EngineMessage::user("hi")).await.unwrap();
        let err = last_text(stream).await.unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_history_carries_across_turns() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let engine = ToolLoopEngine::new(spec(ToolSet::new(), vec![]), model.clone());
        collect(&engine, "first").await;
        collect(&engine, "second").await;

        assert_eq!(engine.history_len("u1", "s1"), 4);
        assert_eq!(engine.history_len("u1", "other"), 0);
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[1].messages.len(), 3);
        assert_eq!(seen[1].messages[0].content, "first");
    }

    #[tokio::test]
    async fn test_history_is_bounded_by_session_count() {
        let engine = ToolLoopEngine::new(spec(ToolSet::new(), vec![]), Arc::new(EchoModel))
            .with_max_sessions(3);

        for session in ["s1", "s2", "s3"] {
            last_text(engine.run("u1", session, EngineMessage::user("hi")).await.unwrap())
                .await
                .unwrap();
        }
        // s1 is used again, so s2 becomes the oldest.
        collect(&engine, "again").await;
        last_text(engine.run("u1", "s4", EngineMessage::user("hi")).await.unwrap())
            .await
            .unwrap();

        assert_eq!(engine.tracked_sessions(), 3);
        assert_eq!(engine.history_len("u1", "s1"), 4);
        assert_eq!(engine.history_len("u1", "s2"), 0);
        assert_eq!(engine.history_len("u1", "s4"), 2);

        assert!(engine.forget_session("u1", "s1"));
        assert!(!engine.forget_session("u1", "s1"));
        assert_eq!(engine.tracked_sessions(), 2);
    }

    #[tokio::test]
    async fn test_sub_agent_exposed_as_tool() {
        let mut sub_engine = MockExecutionEngine::new();
        sub_engine
            .expect_run()
            .withf(|_, _, message| message.text == "make a list")
            .times(1)
            .returning(|_, _, _| {
                let events: EventStream = Box::pin(stream::iter(vec![Ok(EngineEvent::message(
                    "Lister",
                    "1. item",
                ))]));
                Ok(events)
            });
        let sub = SubAgent {
            name: "Lister".into(),
            description: "Makes lists".into(),
            engine: Arc::new(sub_engine),
        };

        let model = Arc::new(ScriptedModel::new(vec![ModelReply::with_tools(
            "",
            vec![ModelToolCall::new("c1", "Lister", r#"{"request": "make a list"}"#)],
        )]));
        let engine = ToolLoopEngine::new(spec(echo_tools(), vec![sub]), model);
        let names: Vec<String> = engine.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "Lister"]);

        let events = collect(&engine, "go").await;
        match &events[1].kind {
            EventKind::ToolResult { content, .. } => assert_eq!(content, "1. item"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
