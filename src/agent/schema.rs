//! Typed agent input/output shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::SchemaInfo;

/// A serializable record an agent takes as input or produces as output.
///
/// `field_names` lists the declared fields in order; default input mapping
/// binds scalar queries to `text` when declared, else to the first field.
pub trait AgentSchema: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn schema_name() -> &'static str;

    fn field_names() -> &'static [&'static str];

    fn schema_info() -> SchemaInfo {
        SchemaInfo {
            name: Self::schema_name().to_string(),
            fields: Self::field_names().iter().map(|f| f.to_string()).collect(),
        }
    }

    fn has_field(name: &str) -> bool {
        Self::field_names().contains(&name)
    }
}

/// Plain text input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    pub text: String,
}

impl TextInput {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl AgentSchema for TextInput {
    fn schema_name() -> &'static str {
        "TextInput"
    }

    fn field_names() -> &'static [&'static str] {
        &["text"]
    }
}

/// Plain text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOutput {
    pub response: String,
}

impl AgentSchema for TextOutput {
    fn schema_name() -> &'static str {
        "TextOutput"
    }

    fn field_names() -> &'static [&'static str] {
        &["response"]
    }
}
