//! Customization points of agent construction and input mapping.
//!
//! [`DefaultBehavior`] implements every trait; agents override only the
//! step they care about through the [`BaseAgent`](super::BaseAgent) builder.

use std::marker::PhantomData;

use serde_json::{Map, Value};
use tracing::debug;

use super::request::{ChatRequest, Query};
use super::schema::AgentSchema;
use crate::config::AgentConfig;
use crate::engine::SubAgent;
use crate::error::{AgentryError, Result};
use crate::runtime::Runtime;
use crate::tools::ToolSet;

/// What construction steps can see.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub runtime: &'a Runtime,
    pub config: &'a AgentConfig,
}

/// Produces an agent's tools.
pub trait BuildTools: Send + Sync {
    fn build_tools(&self, ctx: &BuildContext<'_>) -> Result<ToolSet>;
}

/// Produces the sub-agents an agent can delegate to.
pub trait BuildSubAgents: Send + Sync {
    fn build_sub_agents(&self, ctx: &BuildContext<'_>) -> Result<Vec<SubAgent>>;
}

/// Maps a chat request to an agent's typed input.
pub trait MapInput<I>: Send + Sync {
    fn map_input(&self, request: &ChatRequest) -> Result<I>;
}

/// Declarative tools, no sub-agents, schema-driven input mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl BuildTools for DefaultBehavior {
    fn build_tools(&self, ctx: &BuildContext<'_>) -> Result<ToolSet> {
        Ok(ctx.runtime.tool_builder().build(&ctx.config.tools))
    }
}

impl BuildSubAgents for DefaultBehavior {
    fn build_sub_agents(&self, _ctx: &BuildContext<'_>) -> Result<Vec<SubAgent>> {
        Ok(Vec::new())
    }
}

impl<I: AgentSchema> MapInput<I> for DefaultBehavior {
    fn map_input(&self, request: &ChatRequest) -> Result<I> {
        map_query::<I>(&request.query)
    }
}

/// Wrap a closure as a [`MapInput`] step.
pub struct MapInputFn<I, F> {
    f: F,
    _input: PhantomData<fn() -> I>,
}

impl<I, F> MapInputFn<I, F> {
    pub fn new(f: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<I> + Send + Sync,
    {
        Self {
            f,
            _input: PhantomData,
        }
    }
}

impl<I, F> MapInput<I> for MapInputFn<I, F>
where
    F: Fn(&ChatRequest) -> Result<I> + Send + Sync,
{
    fn map_input(&self, request: &ChatRequest) -> Result<I> {
        (self.f)(request)
    }
}

fn decode<I: AgentSchema>(value: Value) -> Result<I> {
    serde_json::from_value(value).map_err(|e| {
        AgentryError::InputMapping(format!("cannot build {}: {}", I::schema_name(), e))
    })
}

fn single_field(field: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    Value::Object(map)
}

/// The field a scalar query binds to: `text` if declared, else the first.
fn scalar_field<I: AgentSchema>() -> Result<&'static str> {
    if I::has_field("text") {
        return Ok("text");
    }
    I::field_names().first().copied().ok_or_else(|| {
        AgentryError::InputMapping(format!("{} declares no fields", I::schema_name()))
    })
}

/// Default mapping of a query to an input record.
///
/// - fields: decoded as the record; on failure the stringified fields are
///   bound to `text` when the record declares it, else the whole mapping is
///   bound to the first declared field
/// - text: bound to `text` if declared, else to the first declared field
/// - turns: bound to the first declared field; on failure the rendered
///   transcript is bound like text
pub fn map_query<I: AgentSchema>(query: &Query) -> Result<I> {
    match query {
        Query::Fields(map) => {
            let err = match decode::<I>(Value::Object(map.clone())) {
                Ok(input) => return Ok(input),
                Err(e) => e,
            };
            if I::has_field("text") {
                debug!(schema = I::schema_name(), error = %err, "Binding fields to text");
                if let Ok(input) = decode(single_field("text", Value::String(query.transcript()))) {
                    return Ok(input);
                }
            }
            match I::field_names().first() {
                Some(field) => {
                    debug!(schema = I::schema_name(), field = *field, "Binding fields to first field");
                    decode(single_field(field, Value::Object(map.clone()))).map_err(|_| err)
                }
                None => Err(err),
            }
        }
        Query::Text(text) => decode(single_field(scalar_field::<I>()?, Value::String(text.clone()))),
        Query::Turns(turns) => {
            let first = scalar_field::<I>().ok();
            let as_list = I::field_names()
                .first()
                .map(|field| serde_json::to_value(turns).map(|v| single_field(field, v)));
            if let Some(Ok(value)) = as_list {
                if let Ok(input) = decode::<I>(value) {
                    return Ok(input);
                }
            }
            match first {
                Some(field) => decode(single_field(field, Value::String(query.transcript()))),
                None => Err(AgentryError::InputMapping(format!(
                    "{} declares no fields",
                    I::schema_name()
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::request::ConversationTurn;
    use crate::agent::schema::TextInput;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Lookup {
        patient_id: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    impl AgentSchema for Lookup {
        fn schema_name() -> &'static str {
            "Lookup"
        }
        fn field_names() -> &'static [&'static str] {
            &["patient_id", "limit"]
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Transcript {
        conversation: Vec<ConversationTurn>,
    }

    impl AgentSchema for Transcript {
        fn schema_name() -> &'static str {
            "Transcript"
        }
        fn field_names() -> &'static [&'static str] {
            &["conversation"]
        }
    }

    fn fields(value: Value) -> Query {
        match value {
            Value::Object(map) => Query::Fields(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_text_binds_to_text_field() {
        let input: TextInput = map_query(&Query::from("hello")).unwrap();
        assert_eq!(input, TextInput::new("hello"));
    }

    #[test]
    fn test_text_binds_to_first_field() {
        let input: Lookup = map_query(&Query::from("p-42")).unwrap();
        assert_eq!(input.patient_id, "p-42");
        assert_eq!(input.limit, None);
    }

    #[test]
    fn test_fields_decode_directly() {
        let input: Lookup = map_query(&fields(json!({"patient_id": "p1", "limit": 5}))).unwrap();
        assert_eq!(input.limit, Some(5));
    }

    #[test]
    fn test_mismatched_fields_fall_back_to_text() {
        let input: TextInput = map_query(&fields(json!({"question": "why?"}))).unwrap();
        assert_eq!(input.text, r#"{"question":"why?"}"#);
    }

    #[test]
    fn test_mismatched_fields_without_text_fail() {
        let err = map_query::<Lookup>(&fields(json!({"other": 1}))).unwrap_err();
        assert!(matches!(err, AgentryError::InputMapping(_)));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Envelope {
        payload: Value,
    }

    impl AgentSchema for Envelope {
        fn schema_name() -> &'static str {
            "Envelope"
        }
        fn field_names() -> &'static [&'static str] {
            &["payload"]
        }
    }

    #[test]
    fn test_mismatched_fields_bind_to_first_field() {
        let input: Envelope = map_query(&fields(json!({"foo": 1}))).unwrap();
        assert_eq!(input.payload, json!({"foo": 1}));
    }

    #[test]
    fn test_default_mapper_binds_mismatched_fields_to_first_field() {
        let req = ChatRequest::new("A", "u", "s", Query::Fields(match json!({"foo": 1}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }));
        let input = MapInput::<Envelope>::map_input(&DefaultBehavior, &req).unwrap();
        assert_eq!(input.payload["foo"], 1);
    }

    #[test]
    fn test_turns_bind_as_list() {
        let turns = vec![ConversationTurn::new("a", "hi")];
        let input: Transcript = map_query(&Query::Turns(turns.clone())).unwrap();
        assert_eq!(input.conversation, turns);
    }

    #[test]
    fn test_turns_fall_back_to_transcript() {
        let query = Query::Turns(vec![
            ConversationTurn::new("a", "hi"),
            ConversationTurn::new("b", "yo"),
        ]);
        let input: TextInput = map_query(&query).unwrap();
        assert_eq!(input.text, "a: hi\nb: yo");
    }

    #[test]
    fn test_map_input_fn() {
        let mapper = MapInputFn::new(|req: &ChatRequest| Ok(TextInput::new(&req.user_id)));
        let req = ChatRequest::new("A", "user-7", "s", "ignored");
        assert_eq!(mapper.map_input(&req).unwrap().text, "user-7");
    }
}
