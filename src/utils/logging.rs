//! Logging initialization for Agentry.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `component`: compact `timestamp LEVEL target: message fields` lines; use
//!   the [`log_component!`] macro to add a `component` field for
//!   per-subsystem filtering
//! - `json`: structured JSON lines for log aggregators
//!
//! Output goes to stderr (or the configured file) so command output on
//! stdout stays machine-readable.

use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Result;

/// Build the event filter: `RUST_LOG` first, then `cfg.level`.
pub fn env_filter(cfg: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted. A
/// subscriber that is already installed is left in place.
///
/// # Errors
///
/// Returns an I/O error when the configured log file cannot be opened.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = env_filter(cfg);
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match (&cfg.file, cfg.format) {
        (Some(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Pretty => builder.pretty().try_init(),
                LogFormat::Component => builder.compact().try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Pretty) => builder.pretty().with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Component) => builder.compact().with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

/// Emit a component-tagged tracing event.
///
/// Works with any tracing level (`trace`, `debug`, `info`, `warn`, `error`).
/// The `component` field makes it easy to grep logs by subsystem:
///
/// ```
/// # use agentry::log_component;
/// log_component!(info, "registry", "agent discovered");
/// log_component!(warn, "session", "store fallback", agent = "EchoAgent", backend = "memory");
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Component);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_logging_config_from_yaml() {
        let cfg: LoggingConfig = serde_yaml::from_str("format: json\nlevel: debug\n").unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: LoggingConfig = serde_yaml::from_str("level: trace\n").unwrap();
        assert_eq!(cfg.format, LogFormat::Component);
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_invalid_level_still_builds_filter() {
        let cfg = LoggingConfig {
            level: "not[a=filter".to_string(),
            ..LoggingConfig::default()
        };
        let _ = env_filter(&cfg);
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = LoggingConfig {
            file: Some(dir.path().join("missing/dir/agentry.log").display().to_string()),
            ..LoggingConfig::default()
        };
        assert!(init_logging(&cfg).is_err());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let dir = TempDir::new().unwrap();
        let cfg = LoggingConfig {
            format: LogFormat::Json,
            file: Some(dir.path().join("agentry.log").display().to_string()),
            ..LoggingConfig::default()
        };
        init_logging(&cfg).unwrap();
        init_logging(&cfg).unwrap();
    }

    #[test]
    fn test_log_component_macro() {
        crate::log_component!(info, "tests", "component event");
        crate::log_component!(debug, "tests", "with fields", count = 2u64);
    }
}
