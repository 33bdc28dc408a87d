//! Agents CLI command handlers: listing and inspection.

use anyhow::{Context, Result};
use serde_json::json;

use agentry::config::RuntimeSettings;

use super::common::{create_registry, print_json};
use super::AgentsAction;

pub(crate) async fn cmd_agents(settings: RuntimeSettings, action: AgentsAction) -> Result<()> {
    let registry = create_registry(settings)?;

    match action {
        AgentsAction::List => {
            let agents = registry.describe_all();
            if agents.is_empty() {
                println!("No agents registered.");
                return Ok(());
            }
            println!("Registered agents:\n");
            for info in agents {
                println!("  {:<28} {}", info.name, info.description);
            }
        }
        AgentsAction::Describe { name } => {
            let info = registry
                .describe(&name)
                .with_context(|| format!("Unknown agent: {}", name))?;
            let agent = registry
                .get_instance(&name)
                .await
                .with_context(|| format!("Failed to construct agent {}", name))?;
            print_json(&json!({
                "name": info.name,
                "description": info.description,
                "tools": agent.tool_names(),
            }))?;
        }
    }

    Ok(())
}
