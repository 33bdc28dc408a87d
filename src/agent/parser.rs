//! Decoding of an engine's final text into an agent's output type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use super::request::Payload;

/// Outcome of parsing: the typed output, or the original text when it did
/// not decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<O> {
    Typed(O),
    Raw(String),
}

impl<O> Parsed<O> {
    pub fn typed(&self) -> Option<&O> {
        match self {
            Parsed::Typed(out) => Some(out),
            Parsed::Raw(_) => None,
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, Parsed::Typed(_))
    }
}

impl<O: Serialize> Parsed<O> {
    /// Convert to a response payload. An output that fails to serialize
    /// becomes an error text.
    pub fn into_payload(self) -> Payload {
        match self {
            Parsed::Typed(out) => match serde_json::to_value(&out) {
                Ok(value) => Payload::Structured(value),
                Err(e) => Payload::Text(format!("Error: {}", e)),
            },
            Parsed::Raw(text) => Payload::Text(text),
        }
    }
}

/// Parses final engine text for one agent.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    agent_name: String,
}

impl ResponseParser {
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
        }
    }

    /// Decode `text` as `O`.
    ///
    /// Returns `None` when there is no text. Text that is not valid JSON for
    /// `O` comes back as [`Parsed::Raw`] with the original text.
    pub fn parse<O: DeserializeOwned>(&self, text: Option<&str>) -> Option<Parsed<O>> {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            error!(agent = %self.agent_name, "Engine produced no textual response");
            return None;
        };

        match serde_json::from_str::<O>(strip_code_fence(text)) {
            Ok(out) => Some(Parsed::Typed(out)),
            Err(e) => {
                warn!(
                    agent = %self.agent_name,
                    error = %e,
                    "ParseDegradation: response did not match the output schema; returning raw text"
                );
                Some(Parsed::Raw(text.to_string()))
            }
        }
    }
}

/// Remove a surrounding Markdown code fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}
