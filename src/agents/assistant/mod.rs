//! Conversational assistant with backend tools and a delegate sub-agent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{
    AgentSchema, BaseAgent, BuildContext, BuildSubAgents, ChatAgent, ChatRequest, MapInput, Query,
};
use crate::engine::SubAgent;
use crate::error::Result;
use crate::registry::AgentDescriptor;
use crate::runtime::Runtime;

use super::action_items;

pub const NAME: &str = "AssistantAgent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantInput {
    pub message: String,
    pub session_id: String,
    pub user_id: String,
}

impl AgentSchema for AssistantInput {
    fn schema_name() -> &'static str {
        "AssistantInput"
    }

    fn field_names() -> &'static [&'static str] {
        &["message", "session_id", "user_id"]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantOutput {
    pub answer: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
}

impl AgentSchema for AssistantOutput {
    fn schema_name() -> &'static str {
        "AssistantOutput"
    }

    fn field_names() -> &'static [&'static str] {
        &["answer", "session_id", "user_id"]
    }
}

/// Message from the query; user and session from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantMapper;

impl MapInput<AssistantInput> for AssistantMapper {
    fn map_input(&self, request: &ChatRequest) -> Result<AssistantInput> {
        let message = match &request.query {
            Query::Text(text) => text.clone(),
            other => other.transcript(),
        };
        Ok(AssistantInput {
            message,
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
        })
    }
}

/// Delegates action item creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistantSubAgents;

impl BuildSubAgents for AssistantSubAgents {
    fn build_sub_agents(&self, ctx: &BuildContext<'_>) -> Result<Vec<SubAgent>> {
        Ok(vec![action_items::build(ctx.runtime)?.as_sub_agent()])
    }
}

pub type AssistantAgent = BaseAgent<AssistantInput, AssistantOutput>;

pub fn build(runtime: &Runtime) -> Result<AssistantAgent> {
    AssistantAgent::builder()
        .with_embedded_config(include_str!("agent.yaml"))
        .with_sub_agents(AssistantSubAgents)
        .with_input_mapper(AssistantMapper)
        .build(runtime)
}

pub fn descriptors() -> Result<Vec<AgentDescriptor>> {
    Ok(vec![AgentDescriptor::new(
        NAME,
        "Answers questions about the user's action items and creates new ones",
        |runtime| Ok(Arc::new(build(runtime)?) as Arc<dyn ChatAgent>),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Payload;
    use crate::config::RuntimeSettings;

    #[test]
    fn test_mapper_takes_ids_from_request() {
        let request = ChatRequest::new(NAME, "user-3", "sess-4", "What are my tasks?");
        let input = AssistantMapper.map_input(&request).unwrap();
        assert_eq!(input.message, "What are my tasks?");
        assert_eq!(input.user_id, "user-3");
        assert_eq!(input.session_id, "sess-4");
    }

    #[test]
    fn test_build_binds_tools_and_sub_agent() {
        let runtime = Runtime::new(RuntimeSettings::default()).unwrap();
        let agent = build(&runtime).unwrap();
        assert_eq!(agent.tool_names(), ["fetch_action_items", "say"]);
        assert_eq!(agent.sub_agent_names(), [action_items::NAME]);
    }

    #[tokio::test]
    async fn test_chat_on_echo_engine() {
        let runtime = Runtime::new(RuntimeSettings::default()).unwrap();
        let agent = build(&runtime).unwrap();
        let resp = agent
            .chat(&ChatRequest::new(NAME, "u1", "s1", "hello there"))
            .await;
        assert!(resp.success);
        assert_eq!(
            resp.agent_response,
            Payload::Structured(serde_json::json!({
                "answer": "hello there",
                "session_id": "",
                "user_id": ""
            }))
        );
    }
}
