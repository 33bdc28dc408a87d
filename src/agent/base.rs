//! The agent orchestrator.
//!
//! A [`BaseAgent`] is built once from a resolved configuration: tools,
//! sub-agents, hooks, a session store and an execution engine are bound at
//! construction and read-only afterwards. Each run ensures the session
//! exists, hands the serialized input to the engine, keeps the last textual
//! event and parses it into the agent's output type.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::behavior::{BuildContext, BuildSubAgents, BuildTools, DefaultBehavior, MapInput};
use super::chat::ChatAgent;
use super::parser::{Parsed, ResponseParser};
use super::request::{ChatRequest, ChatResponse, Payload};
use super::schema::AgentSchema;
use crate::config::{AgentConfig, CallerLocation, ConfigResolver, ConfigSource, SessionBackend};
use crate::engine::{last_text, AgentKind, EngineMessage, EngineSpec, ExecutionEngine, SubAgent};
use crate::error::Result;
use crate::hooks::{attach_hooks, ObservabilityHooks, RunScope};
use crate::runtime::Runtime;
use crate::session::SessionManager;

/// Lifecycle of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Uninitialized,
    Configured,
    ToolsBuilt,
    Constructed,
    /// At least one run is in flight
    Running,
}

fn transition(agent: &str, state: &mut AgentState, next: AgentState) {
    debug!(agent, from = ?*state, to = ?next, "Agent lifecycle transition");
    *state = next;
}

/// Counts a run as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Agent with typed input `I` and output `O`.
pub struct BaseAgent<I, O> {
    config: AgentConfig,
    kind: AgentKind,
    tool_names: Vec<String>,
    sub_agent_names: Vec<String>,
    sessions: SessionManager,
    session_backend: SessionBackend,
    engine: Arc<dyn ExecutionEngine>,
    hooks: Option<Arc<dyn ObservabilityHooks>>,
    mapper: Arc<dyn MapInput<I>>,
    parser: ResponseParser,
    in_flight: AtomicUsize,
    _output: PhantomData<fn() -> O>,
}

/// Builder for [`BaseAgent`]; every step defaults to [`DefaultBehavior`].
pub struct BaseAgentBuilder<I, O> {
    source: ConfigSource,
    kind: AgentKind,
    tools: Arc<dyn BuildTools>,
    sub_agents: Arc<dyn BuildSubAgents>,
    mapper: Arc<dyn MapInput<I>>,
    _output: PhantomData<fn() -> O>,
}

impl<I: AgentSchema, O: AgentSchema> BaseAgent<I, O> {
    pub fn builder() -> BaseAgentBuilder<I, O> {
        BaseAgentBuilder {
            source: ConfigSource::new(),
            kind: AgentKind::Llm,
            tools: Arc::new(DefaultBehavior),
            sub_agents: Arc::new(DefaultBehavior),
            mapper: Arc::new(DefaultBehavior),
            _output: PhantomData,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.agent_name
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    pub fn sub_agent_names(&self) -> &[String] {
        &self.sub_agent_names
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Session backend selected at construction.
    pub fn session_backend(&self) -> SessionBackend {
        self.session_backend
    }

    pub fn has_hooks(&self) -> bool {
        self.hooks.is_some()
    }

    pub fn state(&self) -> AgentState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            AgentState::Running
        } else {
            AgentState::Constructed
        }
    }

    /// This agent's engine, exposed for delegation from a parent agent.
    pub fn as_sub_agent(&self) -> SubAgent {
        SubAgent {
            name: self.config.agent_name.clone(),
            description: self.config.description.clone(),
            engine: Arc::clone(&self.engine),
        }
    }

    /// Run one turn.
    ///
    /// Returns `Ok(None)` when the engine produced no textual event.
    ///
    /// # Errors
    ///
    /// Session store failures, engine failures and input serialization
    /// errors.
    pub async fn run(&self, user_id: &str, session_id: &str, input: &I) -> Result<Option<Parsed<O>>> {
        let _running = InFlight::enter(&self.in_flight);
        let scope = RunScope::new(&self.config.agent_name, user_id, session_id);
        if let Some(hooks) = &self.hooks {
            hooks.before_agent(&scope);
        }
        let started = Instant::now();

        let result = self.execute(user_id, session_id, input).await;

        if let Some(hooks) = &self.hooks {
            hooks.after_agent(&scope, result.is_ok(), started.elapsed());
        }
        result
    }

    async fn execute(&self, user_id: &str, session_id: &str, input: &I) -> Result<Option<Parsed<O>>> {
        self.sessions.ensure_exists(user_id, session_id).await?;

        let message = serde_json::to_string(input)?;
        debug!(
            agent = %self.config.agent_name,
            user = user_id,
            session = session_id,
            input_len = message.len(),
            "Invoking execution engine"
        );
        let events = self
            .engine
            .run(user_id, session_id, EngineMessage::user(message))
            .await?;
        let text = last_text(events).await?;

        self.sessions.record_turn(user_id, session_id).await?;
        Ok(self.parser.parse::<O>(text.as_deref()))
    }

    /// Map, run and wrap a chat request. Never fails.
    pub async fn chat(&self, request: &ChatRequest) -> ChatResponse {
        match self.try_chat(request).await {
            Ok(payload) => ChatResponse::success(request, payload),
            Err(e) => {
                error!(
                    agent = %self.config.agent_name,
                    user = %request.user_id,
                    session = %request.session_id,
                    error = %e,
                    "Chat request failed"
                );
                ChatResponse::failure(request, e)
            }
        }
    }

    /// Fallible core of [`chat`](Self::chat), for custom agents that add
    /// their own steps around it.
    pub async fn try_chat(&self, request: &ChatRequest) -> Result<Payload> {
        let input = self.mapper.map_input(request)?;
        self.run_to_payload(&request.user_id, &request.session_id, &input)
            .await
    }

    /// Run with an already mapped input and wrap the result as a payload.
    /// A run without text yields an empty text payload.
    pub async fn run_to_payload(&self, user_id: &str, session_id: &str, input: &I) -> Result<Payload> {
        Ok(self
            .run(user_id, session_id, input)
            .await?
            .map(Parsed::into_payload)
            .unwrap_or_default())
    }
}

impl<I: AgentSchema, O: AgentSchema> BaseAgentBuilder<I, O> {
    /// Use this configuration as-is.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.source = self.source.with_config(config);
        self
    }

    /// Load configuration from this file.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = self.source.with_path(path);
        self
    }

    /// Use a YAML document compiled into the binary.
    pub fn with_embedded_config(mut self, content: &'static str) -> Self {
        self.source = self.source.with_embedded(content);
        self
    }

    /// Fall back to `agent.yaml` next to this source location.
    pub fn with_caller(mut self, caller: CallerLocation) -> Self {
        self.source = self.source.with_caller(caller);
        self
    }

    pub fn with_kind(mut self, kind: AgentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_tools(mut self, tools: impl BuildTools + 'static) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_sub_agents(mut self, sub_agents: impl BuildSubAgents + 'static) -> Self {
        self.sub_agents = Arc::new(sub_agents);
        self
    }

    pub fn with_input_mapper(mut self, mapper: impl MapInput<I> + 'static) -> Self {
        self.mapper = Arc::new(mapper);
        self
    }

    /// Construct the agent.
    ///
    /// # Errors
    ///
    /// Configuration resolution or validation errors, tool or sub-agent
    /// construction errors and engine creation errors.
    pub fn build(self, runtime: &Runtime) -> Result<BaseAgent<I, O>> {
        let mut state = AgentState::Uninitialized;

        let config = ConfigResolver::resolve(&self.source)?;
        transition(&config.agent_name, &mut state, AgentState::Configured);

        let ctx = BuildContext {
            runtime,
            config: &config,
        };
        let tools = self.tools.build_tools(&ctx)?;
        transition(&config.agent_name, &mut state, AgentState::ToolsBuilt);

        let sub_agents = self.sub_agents.build_sub_agents(&ctx)?;
        let hooks = attach_hooks(&runtime.settings().observability, &config);
        let (store, session_backend) = runtime.sessions().create_session_service(&config.agent_name);

        let tool_names: Vec<String> = tools.names().into_iter().map(String::from).collect();
        let sub_agent_names: Vec<String> = sub_agents.iter().map(|s| s.name.clone()).collect();

        let engine = runtime.engine_factory().create(EngineSpec {
            agent_name: config.agent_name.clone(),
            description: config.description.clone(),
            instruction: config.instruction_template.clone(),
            provider: config.llm_provider_name,
            model: config.llm_model.clone(),
            temperature: config.temperature,
            kind: self.kind,
            input_schema: I::schema_info(),
            output_schema: O::schema_info(),
            tools,
            sub_agents,
            hooks: hooks.clone(),
        })?;
        transition(&config.agent_name, &mut state, AgentState::Constructed);

        info!(
            agent = %config.agent_name,
            provider = %config.llm_provider_name,
            model = %config.llm_model,
            tools = tool_names.len(),
            sub_agents = sub_agent_names.len(),
            session_backend = ?session_backend,
            "Agent constructed"
        );

        Ok(BaseAgent {
            sessions: SessionManager::new(store, config.agent_name.clone()),
            parser: ResponseParser::new(&config.agent_name),
            config,
            kind: self.kind,
            tool_names,
            sub_agent_names,
            session_backend,
            engine,
            hooks,
            mapper: self.mapper,
            in_flight: AtomicUsize::new(0),
            _output: PhantomData,
        })
    }
}

#[async_trait]
impl<I: AgentSchema, O: AgentSchema> ChatAgent for BaseAgent<I, O> {
    fn name(&self) -> &str {
        &self.config.agent_name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn tool_names(&self) -> Vec<String> {
        self.tool_names.clone()
    }

    async fn chat(&self, request: &ChatRequest) -> ChatResponse {
        BaseAgent::chat(self, request).await
    }
}
