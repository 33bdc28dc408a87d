//! Observability hooks for Agentry
//!
//! Hooks are optional callbacks invoked around the phases of a run: the
//! agent run itself, each model call and each tool call. The orchestrator
//! calls the agent hooks; execution engines call the model and tool hooks.
//!
//! Hooks must never be load-bearing: when the tracing collaborator cannot be
//! initialized (e.g. missing credentials) agents run without them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{AgentConfig, ObservabilitySettings};
use crate::error::{AgentryError, Result};

/// Identifies the run a hook fires for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunScope {
    pub agent_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl RunScope {
    pub fn new(agent_name: &str, user_id: &str, session_id: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

/// Callbacks around the phases of a run. All methods default to no-ops.
pub trait ObservabilityHooks: Send + Sync {
    fn before_agent(&self, _scope: &RunScope) {}

    fn after_agent(&self, _scope: &RunScope, _succeeded: bool, _elapsed: Duration) {}

    fn before_model(&self, _scope: &RunScope, _model: &str) {}

    fn after_model(&self, _scope: &RunScope, _model: &str, _elapsed: Duration) {}

    fn before_tool(&self, _scope: &RunScope, _tool: &str, _args: &serde_json::Value) {}

    fn after_tool(&self, _scope: &RunScope, _tool: &str, _is_error: bool, _elapsed: Duration) {}
}

/// Counters kept by [`TraceObserver`].
#[derive(Debug, Default)]
pub struct TraceCounters {
    pub runs: AtomicU64,
    pub failed_runs: AtomicU64,
    pub model_calls: AtomicU64,
    pub tool_calls: AtomicU64,
    pub tool_errors: AtomicU64,
}

/// Hook set that emits structured trace events tagged with the project and
/// environment of the tracing collaborator and the agent it was attached to.
/// `observer` names that agent; `agent` names the agent of the run, which
/// differs when a sub-agent runs under the same hooks.
#[derive(Debug)]
pub struct TraceObserver {
    project: String,
    environment: String,
    agent_name: String,
    counters: TraceCounters,
}

impl TraceObserver {
    /// Initialize the observer for one agent.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when no API key is configured.
    pub fn new(settings: &ObservabilitySettings, agent: &AgentConfig) -> Result<Self> {
        if settings
            .api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty())
        {
            return Err(AgentryError::Config(
                "observability API key is not configured".to_string(),
            ));
        }
        Ok(Self {
            project: settings
                .project
                .clone()
                .unwrap_or_else(|| "agentry".to_string()),
            environment: settings.environment.clone(),
            agent_name: agent.agent_name.clone(),
            counters: TraceCounters::default(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// The agent this observer was attached to.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn counters(&self) -> &TraceCounters {
        &self.counters
    }
}

impl ObservabilityHooks for TraceObserver {
    fn before_agent(&self, scope: &RunScope) {
        self.counters.runs.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            hook = "before_agent",
            project = %self.project,
            environment = %self.environment,
            observer = %self.agent_name,
            agent = %scope.agent_name,
            user = %scope.user_id,
            session = %scope.session_id,
            "Trace: agent run started"
        );
    }

    fn after_agent(&self, scope: &RunScope, succeeded: bool, elapsed: Duration) {
        if !succeeded {
            self.counters.failed_runs.fetch_add(1, Ordering::Relaxed);
        }
        tracing::info!(
            hook = "after_agent",
            project = %self.project,
            observer = %self.agent_name,
            agent = %scope.agent_name,
            session = %scope.session_id,
            succeeded,
            latency_ms = elapsed.as_millis() as u64,
            "Trace: agent run finished"
        );
    }

    fn before_model(&self, scope: &RunScope, model: &str) {
        self.counters.model_calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            hook = "before_model",
            observer = %self.agent_name,
            agent = %scope.agent_name,
            model,
            "Trace: model call"
        );
    }

    fn after_model(&self, scope: &RunScope, model: &str, elapsed: Duration) {
        tracing::debug!(
            hook = "after_model",
            observer = %self.agent_name,
            agent = %scope.agent_name,
            model,
            latency_ms = elapsed.as_millis() as u64,
            "Trace: model call completed"
        );
    }

    fn before_tool(&self, scope: &RunScope, tool: &str, _args: &serde_json::Value) {
        self.counters.tool_calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            hook = "before_tool",
            observer = %self.agent_name,
            agent = %scope.agent_name,
            tool,
            "Trace: tool call"
        );
    }

    fn after_tool(&self, scope: &RunScope, tool: &str, is_error: bool, elapsed: Duration) {
        if is_error {
            self.counters.tool_errors.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(
            hook = "after_tool",
            observer = %self.agent_name,
            agent = %scope.agent_name,
            tool,
            is_error,
            latency_ms = elapsed.as_millis() as u64,
            "Trace: tool completed"
        );
    }
}

/// Try to set up hooks for an agent.
///
/// Returns `None`, with a warning, when the observer cannot be initialized.
pub fn attach_hooks(
    settings: &ObservabilitySettings,
    agent: &AgentConfig,
) -> Option<Arc<dyn ObservabilityHooks>> {
    match TraceObserver::new(settings, agent) {
        Ok(observer) => {
            info!(agent = %agent.agent_name, project = observer.project(), "Observability hooks attached");
            Some(Arc::new(observer))
        }
        Err(e) => {
            warn!(
                agent = %agent.agent_name,
                error = %e,
                "No observability observer available - tracing will be disabled"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderName;

    fn agent() -> AgentConfig {
        AgentConfig::new(ProviderName::OpenAi, "gpt-4o-mini").with_name("EchoAgent")
    }

    #[test]
    fn test_missing_key_disables_hooks() {
        let settings = ObservabilitySettings::default();
        assert!(TraceObserver::new(&settings, &agent()).is_err());
        assert!(attach_hooks(&settings, &agent()).is_none());

        let blank = ObservabilitySettings {
            api_key: Some("  ".into()),
            ..ObservabilitySettings::default()
        };
        assert!(attach_hooks(&blank, &agent()).is_none());
    }

    #[test]
    fn test_observer_with_key() {
        let settings = ObservabilitySettings {
            api_key: Some("key".into()),
            project: Some("health".into()),
            ..ObservabilitySettings::default()
        };
        let observer = TraceObserver::new(&settings, &agent()).unwrap();
        assert_eq!(observer.project(), "health");
        assert_eq!(observer.agent_name(), "EchoAgent");
        assert!(attach_hooks(&settings, &agent()).is_some());
    }

    #[test]
    fn test_observer_counts_phases() {
        let settings = ObservabilitySettings {
            api_key: Some("key".into()),
            ..ObservabilitySettings::default()
        };
        let observer = TraceObserver::new(&settings, &agent()).unwrap();
        let scope = RunScope::new("EchoAgent", "u1", "s1");

        observer.before_agent(&scope);
        observer.before_model(&scope, "gpt-4o-mini");
        observer.before_tool(&scope, "echo", &serde_json::json!({}));
        observer.after_tool(&scope, "echo", true, Duration::from_millis(3));
        observer.after_agent(&scope, false, Duration::from_millis(10));

        let c = observer.counters();
        assert_eq!(c.runs.load(Ordering::Relaxed), 1);
        assert_eq!(c.model_calls.load(Ordering::Relaxed), 1);
        assert_eq!(c.tool_calls.load(Ordering::Relaxed), 1);
        assert_eq!(c.tool_errors.load(Ordering::Relaxed), 1);
        assert_eq!(c.failed_runs.load(Ordering::Relaxed), 1);
        assert_eq!(observer.project(), "agentry");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_events_name_attached_agent_and_run_agent() {
        let settings = ObservabilitySettings {
            api_key: Some("key".into()),
            ..ObservabilitySettings::default()
        };
        let observer = TraceObserver::new(&settings, &agent()).unwrap();
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let scope = RunScope::new("ActionItemsCreationAgent", "u1", "s1");
            observer.before_agent(&scope);
            observer.before_tool(&scope, "create_action_item", &serde_json::json!({}));
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "output: {}", output);
        for line in lines {
            assert!(line.contains("observer=EchoAgent"), "line: {}", line);
            assert!(line.contains("agent=ActionItemsCreationAgent"), "line: {}", line);
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl ObservabilityHooks for Silent {}
        let hooks: Arc<dyn ObservabilityHooks> = Arc::new(Silent);
        let scope = RunScope::new("a", "u", "s");
        hooks.before_agent(&scope);
        hooks.after_agent(&scope, true, Duration::ZERO);
    }
}
