//! Provider registry and model compatibility helpers.
//!
//! This module centralizes provider metadata: each provider lists the models
//! it serves, and an agent configuration is only valid when its model is in
//! its provider's list.

use serde::{Deserialize, Serialize};

use crate::error::{AgentryError, Result};

/// Known LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[serde(alias = "OPENAI")]
    OpenAi,
    #[serde(alias = "GOOGLE")]
    Google,
    #[serde(alias = "ANTHROPIC")]
    Anthropic,
}

impl ProviderName {
    /// Config key / provider id (e.g. "openai").
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "openai",
            ProviderName::Google => "google",
            ProviderName::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderName {
    type Err = AgentryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderName::OpenAi),
            "google" => Ok(ProviderName::Google),
            "anthropic" => Ok(ProviderName::Anthropic),
            other => Err(AgentryError::Config(format!(
                "Unknown LLM provider '{}'",
                other
            ))),
        }
    }
}

/// Metadata describing an LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Provider id.
    pub name: ProviderName,
    /// Models this provider accepts, in catalog order.
    pub models: &'static [&'static str],
    /// Model used when a configuration leaves `llm_model` out.
    pub default_model: &'static str,
}

impl ProviderSpec {
    /// Whether `model` is served by this provider.
    pub fn supports(&self, model: &str) -> bool {
        self.models.iter().any(|m| *m == model)
    }

    /// Validate a model against this provider.
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleModel` listing every model the provider accepts.
    pub fn check_model(&self, model: &str) -> Result<()> {
        if self.supports(model) {
            return Ok(());
        }
        Err(AgentryError::IncompatibleModel {
            model: model.to_string(),
            provider: self.name.to_string(),
            allowed: self.models.iter().map(|m| m.to_string()).collect(),
        })
    }
}

/// Provider registry.
pub const PROVIDER_REGISTRY: &[ProviderSpec] = &[
    ProviderSpec {
        name: ProviderName::OpenAi,
        models: &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini", "o3-mini"],
        default_model: "gpt-4o-mini",
    },
    ProviderSpec {
        name: ProviderName::Google,
        models: &[
            "gemini-2.0-flash",
            "gemini-2.5-flash",
            "gemini-2.5-pro",
            "gemini-1.5-pro",
        ],
        default_model: "gemini-2.0-flash",
    },
    ProviderSpec {
        name: ProviderName::Anthropic,
        models: &[
            "claude-3-5-haiku-latest",
            "claude-3-7-sonnet-latest",
            "claude-sonnet-4-0",
        ],
        default_model: "claude-3-5-haiku-latest",
    },
];

/// Look up a provider's catalog entry.
pub fn find_provider(name: ProviderName) -> &'static ProviderSpec {
    PROVIDER_REGISTRY
        .iter()
        .find(|spec| spec.name == name)
        .unwrap_or(&PROVIDER_REGISTRY[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_provider_is_registered() {
        for name in [
            ProviderName::OpenAi,
            ProviderName::Google,
            ProviderName::Anthropic,
        ] {
            assert_eq!(find_provider(name).name, name);
        }
    }

    #[test]
    fn test_default_model_belongs_to_provider() {
        for spec in PROVIDER_REGISTRY {
            assert!(spec.supports(spec.default_model), "{}", spec.name);
        }
    }

    #[test]
    fn test_check_model_rejects_foreign_model() {
        let err = find_provider(ProviderName::OpenAi)
            .check_model("gemini-2.0-flash")
            .unwrap_err();
        match err {
            AgentryError::IncompatibleModel {
                model,
                provider,
                allowed,
            } => {
                assert_eq!(model, "gemini-2.0-flash");
                assert_eq!(provider, "openai");
                assert!(allowed.contains(&"gpt-4o-mini".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_provider_name_serde() {
        let name: ProviderName = serde_yaml::from_str("google").unwrap();
        assert_eq!(name, ProviderName::Google);
        let upper: ProviderName = serde_yaml::from_str("OPENAI").unwrap();
        assert_eq!(upper, ProviderName::OpenAi);
        assert_eq!(serde_json::to_string(&ProviderName::Anthropic).unwrap(), "\"anthropic\"");
    }

    #[test]
    fn test_provider_name_from_str() {
        assert_eq!("Anthropic".parse::<ProviderName>().unwrap(), ProviderName::Anthropic);
        assert!("mistral".parse::<ProviderName>().is_err());
    }
}
