//! Shared CLI helpers used across multiple command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use agentry::config::RuntimeSettings;
use agentry::registry::AgentRegistry;
use agentry::runtime::Runtime;

/// Build the runtime and a registry populated with the bundled agents.
pub(crate) fn create_registry(settings: RuntimeSettings) -> Result<AgentRegistry> {
    let runtime = Runtime::new(settings).context("Failed to initialize runtime")?;
    let registry = AgentRegistry::new(Arc::new(runtime));
    registry.discover(&agentry::agents::modules());
    Ok(registry)
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", out);
    Ok(())
}
