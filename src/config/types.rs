//! Configuration type definitions for Agentry
//!
//! Two families of configuration live here:
//! - [`AgentConfig`] / [`ToolDescriptor`]: the declarative, per-agent YAML file
//! - [`RuntimeSettings`]: process-wide settings (backend URL, session backend,
//!   observability credentials, logging) read once at startup

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::providers::{find_provider, ProviderName};

// ============================================================================
// Agent configuration
// ============================================================================

/// Default sampling temperature for agents that leave it unset.
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Declarative configuration of a single agent.
///
/// Loaded from the agent's YAML file (or supplied directly by code). The
/// model must belong to the provider's allowed set; see
/// [`AgentConfig::validate`](crate::config::validate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Provider serving this agent's model.
    pub llm_provider_name: ProviderName,
    /// Model id. Empty means the provider's default model when loaded from YAML.
    #[serde(default)]
    pub llm_model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Registered agent name; also used as the session application name.
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub description: String,
    /// System instruction handed to the execution engine.
    #[serde(default)]
    pub instruction_template: String,
    /// Declarative tools, built by the tool builder at construction time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,
}

impl AgentConfig {
    /// Create a config for `provider` and `model` with default settings.
    pub fn new(provider: ProviderName, model: impl Into<String>) -> Self {
        Self {
            llm_provider_name: provider,
            llm_model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            agent_name: String::new(),
            description: String::new(),
            instruction_template: String::new(),
            tools: Vec::new(),
        }
    }

    /// Set the agent name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Set the agent description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the instruction template.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction_template = instruction.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Append a tool descriptor.
    pub fn with_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    /// Fill fields a YAML file may leave out.
    ///
    /// Only applied to configurations loaded from disk; explicit
    /// configurations are used exactly as given.
    pub(crate) fn fill_defaults(&mut self) {
        if self.llm_model.trim().is_empty() {
            self.llm_model = find_provider(self.llm_provider_name)
                .default_model
                .to_string();
        }
    }
}

impl std::fmt::Display for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AgentConfig(provider={}, model={}, temperature={}, agent_name={}, tools={})",
            self.llm_provider_name,
            self.llm_model,
            self.temperature,
            self.agent_name,
            self.tools.len()
        )
    }
}

/// A declared tool: an implementation kind plus its static parameters.
///
/// ```yaml
/// tools:
///   - name: get_action_items
///     type: backend_query
///     description: Fetch a user's action items
///     params:
///       path: /api/v1/users/{user_id}/action-items
///       required_args: [user_id]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name the execution engine invokes the tool by.
    pub name: String,
    /// Implementation kind, resolved through the tool catalog.
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Static parameters handed to the implementation's factory.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl ToolDescriptor {
    /// Create a descriptor with no parameters.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            description: None,
            params: BTreeMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a static parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// String parameter lookup.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Integer parameter lookup; accepts numbers and numeric strings.
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String-list parameter lookup. A single string counts as a one-item list.
    pub fn param_list(&self, key: &str) -> Vec<String> {
        match self.params.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Runtime settings
// ============================================================================

/// Process-wide runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Backend API reached by HTTP tools
    pub backend: BackendSettings,
    /// Session storage selection
    pub session: SessionSettings,
    /// Tracing collaborator credentials
    pub observability: ObservabilitySettings,
    /// Log output
    pub logging: LoggingConfig,
}

/// Default backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
/// Default per-call tool timeout in seconds.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Backend API settings for HTTP tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Service-to-service key sent as `X-AI-Service-Key`.
    pub service_key: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            service_key: None,
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

/// Which session store variant agents bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Process-lifetime store, lost on restart
    #[default]
    Memory,
    /// JSON files on disk, shared across processes
    File,
}

impl std::str::FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "inmemory" => Ok(SessionBackend::Memory),
            "file" | "persistent" | "database" | "db" => Ok(SessionBackend::File),
            other => Err(format!("unknown session backend '{}'", other)),
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub backend: SessionBackend,
    /// Directory for the file backend. Defaults to `~/.agentry/sessions`.
    pub dir: Option<PathBuf>,
}

impl SessionSettings {
    /// Directory the file backend writes to.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| RuntimeSettings::dir().join("sessions"))
    }
}

/// Observability collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// API key of the tracing collaborator. Hooks are disabled without it.
    pub api_key: Option<String>,
    /// Project the traces are filed under.
    pub project: Option<String>,
    /// Deployment environment tag.
    pub environment: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            project: None,
            environment: "development".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// Compact single line, grep-friendly
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "component" | "compact" => Ok(LogFormat::Component),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_yaml_defaults() {
        let yaml = "llm_provider_name: openai\nagent_name: EchoAgent\n";
        let mut cfg: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert!(cfg.llm_model.is_empty());
        assert!(cfg.tools.is_empty());

        cfg.fill_defaults();
        assert_eq!(cfg.llm_model, "gpt-4o-mini");
    }

    #[test]
    fn test_agent_config_builder() {
        let cfg = AgentConfig::new(ProviderName::Google, "gemini-2.0-flash")
            .with_name("Summary")
            .with_description("Summarizes")
            .with_instruction("Be brief")
            .with_temperature(0.1)
            .with_tool(ToolDescriptor::new("echo", "echo"));
        assert_eq!(cfg.agent_name, "Summary");
        assert_eq!(cfg.instruction_template, "Be brief");
        assert_eq!(cfg.tools.len(), 1);
        assert!(cfg.to_string().contains("model=gemini-2.0-flash"));
    }

    #[test]
    fn test_tool_descriptor_yaml() {
        let yaml = r#"
name: get_action_items
type: backend_query
description: Fetch action items
params:
  path: /api/v1/users/{user_id}/action-items
  required_args: [user_id]
  timeout_secs: "5"
"#;
        let tool: ToolDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tool.kind, "backend_query");
        assert_eq!(
            tool.param_str("path"),
            Some("/api/v1/users/{user_id}/action-items")
        );
        assert_eq!(tool.param_list("required_args"), vec!["user_id"]);
        assert_eq!(tool.param_u64("timeout_secs"), Some(5));
        assert_eq!(tool.param_u64("missing"), None);
    }

    #[test]
    fn test_tool_descriptor_kind_alias() {
        let tool: ToolDescriptor = serde_yaml::from_str("name: e\nkind: echo\n").unwrap();
        assert_eq!(tool.kind, "echo");
    }

    #[test]
    fn test_runtime_settings_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.backend.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(settings.backend.timeout_secs, DEFAULT_TOOL_TIMEOUT_SECS);
        assert_eq!(settings.session.backend, SessionBackend::Memory);
        assert!(settings.observability.api_key.is_none());
        assert_eq!(settings.logging.format, LogFormat::Component);
    }

    #[test]
    fn test_session_backend_from_str() {
        assert_eq!("file".parse::<SessionBackend>(), Ok(SessionBackend::File));
        assert_eq!(
            "Database".parse::<SessionBackend>(),
            Ok(SessionBackend::File)
        );
        assert_eq!("memory".parse::<SessionBackend>(), Ok(SessionBackend::Memory));
        assert!("redis".parse::<SessionBackend>().is_err());
    }

    #[test]
    fn test_logging_config_roundtrip() {
        let cfg = LoggingConfig {
            format: LogFormat::Json,
            file: Some("/tmp/agentry.log".to_string()),
            level: "debug".to_string(),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let restored: LoggingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.format, LogFormat::Json);
        assert_eq!(restored.file.as_deref(), Some("/tmp/agentry.log"));
        assert_eq!(restored.level, "debug");
    }
}
