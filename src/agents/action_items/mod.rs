//! Action item creation, usable on its own or as a sub-agent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::{AgentSchema, BaseAgent, ChatAgent, ChatRequest, MapInput, Query};
use crate::error::Result;
use crate::registry::AgentDescriptor;
use crate::runtime::Runtime;

pub const NAME: &str = "ActionItemsCreationAgent";

const DEFAULT_SOURCE_ID: &str = "manual";
const DEFAULT_SOURCE_TYPE: &str = "GENERAL";

fn default_source_type() -> String {
    DEFAULT_SOURCE_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItemInput {
    pub user_id: String,
    pub action_item_text: String,
    pub source_id: String,
    #[serde(default = "default_source_type")]
    pub source_type: String,
}

impl AgentSchema for ActionItemInput {
    fn schema_name() -> &'static str {
        "ActionItemInput"
    }

    fn field_names() -> &'static [&'static str] {
        &["user_id", "action_item_text", "source_id", "source_type"]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItemOutput {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub action_item_id: String,
}

impl AgentSchema for ActionItemOutput {
    fn schema_name() -> &'static str {
        "ActionItemOutput"
    }

    fn field_names() -> &'static [&'static str] {
        &["success", "message", "action_item_id"]
    }
}

/// Reads the item from the query: an object with `action_item_text`
/// (plus optional source fields), a JSON string holding one, or plain text.
/// The user always comes from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionItemMapper;

impl MapInput<ActionItemInput> for ActionItemMapper {
    fn map_input(&self, request: &ChatRequest) -> Result<ActionItemInput> {
        let fields: Option<Map<String, Value>> = match &request.query {
            Query::Fields(map) => Some(map.clone()),
            Query::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            Query::Turns(_) => None,
        };

        let field = |name: &str, default: &str| -> String {
            fields
                .as_ref()
                .and_then(|m| m.get(name))
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        let action_item_text = match &fields {
            Some(_) => field("action_item_text", ""),
            None => request.query.transcript(),
        };

        Ok(ActionItemInput {
            user_id: request.user_id.clone(),
            action_item_text,
            source_id: field("source_id", DEFAULT_SOURCE_ID),
            source_type: field("source_type", DEFAULT_SOURCE_TYPE),
        })
    }
}

pub type ActionItemsAgent = BaseAgent<ActionItemInput, ActionItemOutput>;

pub fn build(runtime: &Runtime) -> Result<ActionItemsAgent> {
    ActionItemsAgent::builder()
        .with_embedded_config(include_str!("agent.yaml"))
        .with_input_mapper(ActionItemMapper)
        .build(runtime)
}

pub fn descriptors() -> Result<Vec<AgentDescriptor>> {
    Ok(vec![AgentDescriptor::new(
        NAME,
        "Creates a follow-up action item for the user",
        |runtime| Ok(Arc::new(build(runtime)?) as Arc<dyn ChatAgent>),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use serde_json::json;

    fn map(query: Query) -> ActionItemInput {
        ActionItemMapper
            .map_input(&ChatRequest::new(NAME, "user-1", "s", query))
            .unwrap()
    }

    #[test]
    fn test_plain_text_query() {
        let input = map(Query::from("Book a follow-up"));
        assert_eq!(input.user_id, "user-1");
        assert_eq!(input.action_item_text, "Book a follow-up");
        assert_eq!(input.source_id, "manual");
        assert_eq!(input.source_type, "GENERAL");
    }

    #[test]
    fn test_json_string_query() {
        let input = map(Query::from(
            r#"{"action_item_text": "Take meds", "source_id": "conv-9", "source_type": "CONVERSATION"}"#,
        ));
        assert_eq!(input.action_item_text, "Take meds");
        assert_eq!(input.source_id, "conv-9");
        assert_eq!(input.source_type, "CONVERSATION");
    }

    #[test]
    fn test_fields_query() {
        let Value::Object(fields) = json!({"action_item_text": "Walk daily"}) else {
            unreachable!()
        };
        let input = map(Query::Fields(fields));
        assert_eq!(input.action_item_text, "Walk daily");
        assert_eq!(input.source_id, "manual");
    }

    #[test]
    fn test_builds_with_backend_tool() {
        let runtime = Runtime::new(RuntimeSettings::default()).unwrap();
        let agent = build(&runtime).unwrap();
        assert_eq!(agent.name(), NAME);
        assert_eq!(agent.tool_names(), ["create_action_item"]);
    }
}
