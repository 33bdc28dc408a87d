//! Minimal agent that repeats its input.

use std::sync::Arc;

use crate::agent::{BaseAgent, ChatAgent, TextInput, TextOutput};
use crate::error::Result;
use crate::registry::AgentDescriptor;
use crate::runtime::Runtime;

pub const NAME: &str = "EchoAgent";

pub type EchoAgent = BaseAgent<TextInput, TextOutput>;

pub fn build(runtime: &Runtime) -> Result<EchoAgent> {
    EchoAgent::builder()
        .with_embedded_config(include_str!("agent.yaml"))
        .build(runtime)
}

pub fn descriptors() -> Result<Vec<AgentDescriptor>> {
    Ok(vec![AgentDescriptor::new(
        NAME,
        "Repeats the user's text back as the response",
        |runtime| Ok(Arc::new(build(runtime)?) as Arc<dyn ChatAgent>),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatRequest, Payload};
    use crate::config::RuntimeSettings;

    #[tokio::test]
    async fn test_echo_agent_from_yaml() {
        let runtime = Runtime::new(RuntimeSettings::default()).unwrap();
        let agent = build(&runtime).unwrap();
        assert_eq!(agent.name(), NAME);
        assert_eq!(agent.config().temperature, 0.2);

        let resp = agent.chat(&ChatRequest::new(NAME, "u1", "s1", "hello")).await;
        assert!(resp.success);
        assert_eq!(
            resp.agent_response,
            Payload::Structured(serde_json::json!({"response": "hello"}))
        );
    }
}
