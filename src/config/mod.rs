//! Configuration management for Agentry
//!
//! Per-agent configuration is declarative YAML resolved by [`ConfigResolver`].
//! Process-wide [`RuntimeSettings`] are loaded from `~/.agentry/settings.yaml`
//! (when present) with environment variable overrides on top.

mod resolver;
mod types;
pub mod validate;

pub use resolver::{CallerLocation, ConfigResolver, ConfigSource, CONVENTIONAL_CONFIG_FILE};
pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

impl RuntimeSettings {
    /// Returns the Agentry configuration directory path (~/.agentry)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agentry")
    }

    /// Returns the path to the settings file (~/.agentry/settings.yaml)
    pub fn path() -> PathBuf {
        Self::dir().join("settings.yaml")
    }

    /// Load settings from the default path with environment overrides.
    ///
    /// A `.env` file in the working directory is read first. Missing
    /// settings files are not an error.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_from_path(&Self::path())
    }

    /// Load settings from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            RuntimeSettings::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Apply process environment overrides.
    ///
    /// Variables follow the pattern `AGENTRY_SECTION_KEY`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Backend
        if let Some(val) = lookup("AGENTRY_BACKEND_URL") {
            self.backend.base_url = val;
        }
        if let Some(val) = lookup("AGENTRY_BACKEND_KEY") {
            self.backend.service_key = Some(val).filter(|v| !v.is_empty());
        }
        if let Some(val) = lookup("AGENTRY_TOOL_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.backend.timeout_secs = v;
            }
        }
        self.backend.base_url = self.backend.base_url.trim_end_matches('/').to_string();

        // Sessions. A sessions directory implies the file backend.
        if let Some(val) = lookup("AGENTRY_SESSIONS_DIR") {
            self.session.dir = Some(PathBuf::from(val));
            self.session.backend = SessionBackend::File;
        }
        if let Some(val) = lookup("AGENTRY_SESSION_BACKEND") {
            if let Ok(v) = val.parse() {
                self.session.backend = v;
            }
        }

        // Observability
        if let Some(val) = lookup("AGENTRY_TRACE_API_KEY") {
            self.observability.api_key = Some(val).filter(|v| !v.is_empty());
        }
        if let Some(val) = lookup("AGENTRY_TRACE_PROJECT") {
            self.observability.project = Some(val);
        }
        if let Some(val) = lookup("AGENTRY_ENVIRONMENT") {
            self.observability.environment = val;
        }

        // Logging
        if let Some(val) = lookup("AGENTRY_LOG_FORMAT") {
            if let Ok(v) = val.parse() {
                self.logging.format = v;
            }
        }
        if let Some(val) = lookup("AGENTRY_LOG_LEVEL") {
            self.logging.level = val;
        }
    }
}
