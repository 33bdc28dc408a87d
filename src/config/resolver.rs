//! Agent configuration resolution.
//!
//! An agent's configuration comes from the first source that is present:
//! an explicit [`AgentConfig`], an explicit file path, a document compiled
//! into the binary (`include_str!`), or the conventional `agent.yaml` next
//! to the agent's own source file (captured with
//! [`config_location!`](crate::config_location)).

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::validate::{validate_agent_yaml, DiagnosticLevel};
use crate::config::AgentConfig;
use crate::error::{AgentryError, Result};

/// File name looked up next to an agent's source file.
pub const CONVENTIONAL_CONFIG_FILE: &str = "agent.yaml";

/// Location of the source unit that defines an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerLocation {
    source_file: PathBuf,
}

impl CallerLocation {
    /// Build a location from the crate's manifest directory and a `file!()`
    /// path relative to it.
    pub fn new(manifest_dir: &str, file: &str) -> Self {
        let file = Path::new(file);
        let source_file = if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(manifest_dir).join(file)
        };
        Self { source_file }
    }

    /// Build a location from an absolute source file path.
    pub fn from_source_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source_file: path.into(),
        }
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// `<directory of the source file>/agent.yaml`
    pub fn config_path(&self) -> PathBuf {
        self.source_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONVENTIONAL_CONFIG_FILE)
    }
}

/// Capture the calling source file as a [`CallerLocation`].
///
/// ```
/// let location = agentry::config_location!();
/// assert!(location.config_path().ends_with("agent.yaml"));
/// ```
#[macro_export]
macro_rules! config_location {
    () => {
        $crate::config::CallerLocation::new(env!("CARGO_MANIFEST_DIR"), file!())
    };
}

/// Candidate configuration sources, tried in order.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub config: Option<AgentConfig>,
    pub path: Option<PathBuf>,
    pub embedded: Option<&'static str>,
    pub caller: Option<CallerLocation>,
}

impl ConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration as-is.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load from this file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use a YAML document compiled into the binary when no path is given
    /// or the path does not exist.
    pub fn with_embedded(mut self, content: &'static str) -> Self {
        self.embedded = Some(content);
        self
    }

    /// Fall back to the conventional file next to this source location.
    pub fn with_caller(mut self, caller: CallerLocation) -> Self {
        self.caller = Some(caller);
        self
    }
}

/// Resolves and validates agent configurations.
pub struct ConfigResolver;

impl ConfigResolver {
    /// Resolve a configuration, first match wins.
    ///
    /// An explicit configuration is returned unchanged after validation.
    /// A path that does not exist is skipped in favour of the next source;
    /// a file that exists but is invalid fails immediately. An embedded
    /// document is tried after the path and before the caller location.
    ///
    /// # Errors
    ///
    /// - `ConfigResolution` when no source yields a loadable file
    /// - `IncompatibleModel` when the model is not served by the provider
    /// - `Config` / `Yaml` for malformed files
    pub fn resolve(source: &ConfigSource) -> Result<AgentConfig> {
        if let Some(config) = &source.config {
            config.validate()?;
            debug!(agent = %config.agent_name, "Using explicit agent config");
            return Ok(config.clone());
        }

        let mut tried = Vec::new();
        if let Some(path) = &source.path {
            if let Some(config) = Self::try_file(path, &mut tried)? {
                return Ok(config);
            }
        }

        if let Some(content) = source.embedded {
            let config = Self::from_yaml_str(content)?;
            info!(agent = %config.agent_name, "Loaded embedded agent config");
            return Ok(config);
        }

        if let Some(caller) = &source.caller {
            if let Some(config) = Self::try_file(&caller.config_path(), &mut tried)? {
                return Ok(config);
            }
        }

        Err(AgentryError::ConfigResolution(if tried.is_empty() {
            "no explicit config, config path, embedded config or caller location given"
                .to_string()
        } else {
            format!("no agent config found (tried: {})", tried.join(", "))
        }))
    }

    fn try_file(path: &Path, tried: &mut Vec<String>) -> Result<Option<AgentConfig>> {
        if path.is_file() {
            let config = Self::load(path)?;
            info!(path = %path.display(), agent = %config.agent_name, "Loaded agent config");
            return Ok(Some(config));
        }
        warn!(path = %path.display(), "Agent config file not found");
        tried.push(path.display().to_string());
        Ok(None)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<AgentConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            AgentryError::Config(msg) => {
                AgentryError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate a configuration document.
    pub fn from_yaml_str(content: &str) -> Result<AgentConfig> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;

        let diagnostics = validate_agent_yaml(&raw);
        for diag in diagnostics.iter().filter(|d| d.level == DiagnosticLevel::Warn) {
            warn!("{}", diag);
        }
        let errors: Vec<String> = diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .map(ToString::to_string)
            .collect();
        if !errors.is_empty() {
            return Err(AgentryError::Config(errors.join("; ")));
        }

        let mut config: AgentConfig = serde_yaml::from_value(raw)?;
        config.fill_defaults();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderName;
    use tempfile::TempDir;

    const ECHO_YAML: &str = r#"
llm_provider_name: openai
llm_model: gpt-4o-mini
temperature: 0.3
agent_name: EchoAgent
description: Echoes its input
instruction_template: Repeat the user's text.
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_explicit_config_is_returned_unchanged() {
        let cfg = AgentConfig::new(ProviderName::Google, "gemini-2.5-pro")
            .with_name("X")
            .with_temperature(1.25);
        let resolved = ConfigResolver::resolve(
            &ConfigSource::new()
                .with_config(cfg.clone())
                .with_path("/definitely/not/here.yaml"),
        )
        .unwrap();
        assert_eq!(resolved, cfg);
    }

    #[test]
    fn test_explicit_config_is_still_validated() {
        let cfg = AgentConfig::new(ProviderName::Google, "gpt-4o");
        let err = ConfigResolver::resolve(&ConfigSource::new().with_config(cfg)).unwrap_err();
        assert!(matches!(err, AgentryError::IncompatibleModel { .. }));
    }

    #[test]
    fn test_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "custom.yaml", ECHO_YAML);
        let cfg = ConfigResolver::resolve(&ConfigSource::new().with_path(&path)).unwrap();
        assert_eq!(cfg.agent_name, "EchoAgent");
        assert_eq!(cfg.temperature, 0.3);
    }

    #[test]
    fn test_caller_location() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONVENTIONAL_CONFIG_FILE, ECHO_YAML);
        let caller = CallerLocation::from_source_file(dir.path().join("mod.rs"));
        let cfg = ConfigResolver::resolve(&ConfigSource::new().with_caller(caller)).unwrap();
        assert_eq!(cfg.llm_model, "gpt-4o-mini");
    }

    #[test]
    fn test_missing_path_falls_back_to_caller() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONVENTIONAL_CONFIG_FILE, ECHO_YAML);
        let caller = CallerLocation::from_source_file(dir.path().join("mod.rs"));
        let cfg = ConfigResolver::resolve(
            &ConfigSource::new()
                .with_path(dir.path().join("absent.yaml"))
                .with_caller(caller),
        )
        .unwrap();
        assert_eq!(cfg.agent_name, "EchoAgent");
    }

    #[test]
    fn test_embedded_config_needs_no_file() {
        let dir = TempDir::new().unwrap();
        let cfg = ConfigResolver::resolve(
            &ConfigSource::new()
                .with_embedded(ECHO_YAML)
                .with_caller(CallerLocation::from_source_file(dir.path().join("mod.rs"))),
        )
        .unwrap();
        assert_eq!(cfg.agent_name, "EchoAgent");
        assert_eq!(cfg.temperature, 0.3);
    }

    #[test]
    fn test_existing_path_overrides_embedded() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "override.yaml",
            "llm_provider_name: openai
llm_model: gpt-4o
agent_name: Override
instruction_template: x
",
        );
        let cfg = ConfigResolver::resolve(
            &ConfigSource::new().with_path(&path).with_embedded(ECHO_YAML),
        )
        .unwrap();
        assert_eq!(cfg.agent_name, "Override");

        let cfg = ConfigResolver::resolve(
            &ConfigSource::new()
                .with_path(dir.path().join("absent.yaml"))
                .with_embedded(ECHO_YAML),
        )
        .unwrap();
        assert_eq!(cfg.agent_name, "EchoAgent");
    }

    #[test]
    fn test_invalid_embedded_config_fails() {
        let err = ConfigResolver::resolve(
            &ConfigSource::new().with_embedded("llm_provider_name: google
llm_model: gpt-4o
"),
        )
        .unwrap_err();
        assert!(matches!(err, AgentryError::IncompatibleModel { .. }));
    }

    #[test]
    fn test_nothing_resolvable() {
        let err = ConfigResolver::resolve(&ConfigSource::new()).unwrap_err();
        assert!(matches!(err, AgentryError::ConfigResolution(_)));

        let dir = TempDir::new().unwrap();
        let err = ConfigResolver::resolve(
            &ConfigSource::new().with_caller(CallerLocation::from_source_file(
                dir.path().join("lib.rs"),
            )),
        )
        .unwrap_err();
        assert!(matches!(err, AgentryError::ConfigResolution(_)));
        assert!(err.to_string().contains("agent.yaml"));
    }

    #[test]
    fn test_incompatible_model_in_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "bad.yaml",
            "llm_provider_name: google\nllm_model: gpt-4o\ninstruction_template: x\n",
        );
        let err = ConfigResolver::resolve(&ConfigSource::new().with_path(&path)).unwrap_err();
        match err {
            AgentryError::IncompatibleModel { allowed, .. } => {
                assert!(allowed.contains(&"gemini-2.0-flash".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_file_does_not_fall_back() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONVENTIONAL_CONFIG_FILE, ECHO_YAML);
        let bad = write(&dir, "bad.yaml", "llm_provider_name: openai\ntemprature: 1\n");
        let err = ConfigResolver::resolve(
            &ConfigSource::new()
                .with_path(&bad)
                .with_caller(CallerLocation::from_source_file(dir.path().join("mod.rs"))),
        )
        .unwrap_err();
        assert!(matches!(err, AgentryError::Config(_)));
        assert!(err.to_string().contains("did you mean 'temperature'?"));
    }

    #[test]
    fn test_config_location_macro() {
        let location = crate::config_location!();
        assert!(location.source_file().ends_with("src/config/resolver.rs"));
        assert_eq!(
            location.config_path().file_name().unwrap(),
            CONVENTIONAL_CONFIG_FILE
        );
    }
}
