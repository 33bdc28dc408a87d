//! Agent configuration validation.
//!
//! Two passes run over every configuration file: a structural pass over the
//! raw YAML (unknown keys with "did you mean" hints) and a semantic pass over
//! the typed [`AgentConfig`] (provider/model compatibility, value ranges).

use serde_yaml::Value;

use crate::config::AgentConfig;
use crate::error::{AgentryError, Result};
use crate::providers::find_provider;

/// Top-level keys accepted in an agent YAML file.
const KNOWN_AGENT_FIELDS: &[&str] = &[
    "llm_provider_name",
    "llm_model",
    "temperature",
    "agent_name",
    "description",
    "instruction_template",
    "tools",
];

/// Keys accepted in a tool descriptor.
const KNOWN_TOOL_FIELDS: &[&str] = &["name", "type", "kind", "description", "params"];

/// Valid sampling temperature range.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// A validation diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Dotted path to the offending key, empty for document-level problems.
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Edit distance between two field names, used for suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_keys(
    map: &serde_yaml::Mapping,
    known: &[&str],
    prefix: &str,
    out: &mut Vec<Diagnostic>,
) {
    for key in map.keys() {
        let Some(key) = key.as_str() else {
            out.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: prefix.to_string(),
                message: "non-string key".to_string(),
            });
            continue;
        };
        if known.contains(&key) {
            continue;
        }
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        };
        let message = match suggest_field(key, known) {
            Some(hint) => format!("unknown field, {}", hint),
            None => "unknown field".to_string(),
        };
        out.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path,
            message,
        });
    }
}

/// Structural validation of a raw agent YAML document.
pub fn validate_agent_yaml(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(root) = raw.as_mapping() else {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path: String::new(),
            message: "agent config must be a YAML mapping".to_string(),
        });
        return diagnostics;
    };

    unknown_keys(root, KNOWN_AGENT_FIELDS, "", &mut diagnostics);

    if let Some(tools) = root.get("tools") {
        match tools.as_sequence() {
            Some(items) => {
                for (idx, item) in items.iter().enumerate() {
                    let prefix = format!("tools[{}]", idx);
                    match item.as_mapping() {
                        Some(map) => unknown_keys(map, KNOWN_TOOL_FIELDS, &prefix, &mut diagnostics),
                        None => diagnostics.push(Diagnostic {
                            level: DiagnosticLevel::Error,
                            path: prefix,
                            message: "tool entry must be a mapping".to_string(),
                        }),
                    }
                }
            }
            None => diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: "tools".to_string(),
                message: "must be a list".to_string(),
            }),
        }
    }

    if root.get("instruction_template").is_none() {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "instruction_template".to_string(),
            message: "missing, the engine will run without instructions".to_string(),
        });
    }

    diagnostics
}

impl AgentConfig {
    /// Semantic validation.
    ///
    /// # Errors
    ///
    /// - `IncompatibleModel` when the model is not served by the provider
    /// - `Config` when the temperature is out of range
    pub fn validate(&self) -> Result<()> {
        find_provider(self.llm_provider_name).check_model(&self.llm_model)?;
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(AgentryError::Config(format!(
                "temperature {} is outside {}..={}",
                self.temperature,
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            )));
        }
        Ok(())
    }
}
