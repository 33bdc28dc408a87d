//! Config command handlers: agent YAML checks and effective settings.

use anyhow::{Context, Result};

use agentry::config::validate::{validate_agent_yaml, DiagnosticLevel};
use agentry::config::{ConfigResolver, RuntimeSettings};

use super::ConfigAction;

pub(crate) fn cmd_config(settings: &RuntimeSettings, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check { path } => {
            println!("Agent config: {}", path.display());

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let raw: serde_yaml::Value = match serde_yaml::from_str(&content) {
                Ok(v) => v,
                Err(e) => {
                    println!("[ERROR] Invalid YAML: {}", e);
                    std::process::exit(1);
                }
            };

            let diagnostics = validate_agent_yaml(&raw);
            for diag in &diagnostics {
                println!("{}", diag);
            }
            let errors = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Error)
                .count();
            let warnings = diagnostics.len() - errors;

            // Structural checks passed; the resolver also checks the model catalog.
            if errors == 0 {
                if let Err(e) = ConfigResolver::load(&path) {
                    println!("[ERROR] {}", e);
                    std::process::exit(1);
                }
            }

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
            if errors > 0 {
                std::process::exit(1);
            }
        }
        ConfigAction::Show => {
            let mut shown = settings.clone();
            if shown.backend.service_key.is_some() {
                shown.backend.service_key = Some("***".to_string());
            }
            if shown.observability.api_key.is_some() {
                shown.observability.api_key = Some("***".to_string());
            }
            print!("{}", serde_yaml::to_string(&shown)?);
        }
    }
    Ok(())
}
