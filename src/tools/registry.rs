//! Tool set for Agentry
//!
//! A [`ToolSet`] holds the tools bound to one agent and executes them by
//! name with logging and error folding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use super::{Tool, ToolContext, ToolDefinition, ToolOutput};

/// The tools bound to one agent, in registration order.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced existing tool with the same name");
        } else {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions of every tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Execute a tool by name.
    ///
    /// Never fails: an unknown tool or a tool error becomes an error output,
    /// so the engine always receives a result it can reason about.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Tool not found");
            return ToolOutput::error(format!("Tool not found: {}", name));
        };

        let start = Instant::now();
        match tool.execute(args, ctx).await {
            Ok(output) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if output.is_error {
                    warn!(tool = name, latency_ms, "Tool returned an error result");
                } else {
                    info!(tool = name, latency_ms, "Tool executed successfully");
                }
                output
            }
            Err(e) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                error!(tool = name, latency_ms, error = %e, "Tool execution failed");
                ToolOutput::error(format!("Error: {}", e))
            }
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("tools", &self.order).finish()
    }
}
