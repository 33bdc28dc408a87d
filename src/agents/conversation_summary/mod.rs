//! Conversation summarization.
//!
//! Wraps a [`BaseAgent`] with its own `chat`: the summary length comes from
//! the `summary_length` feature and the query is read as conversation turns,
//! whatever shape it arrives in.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::agent::{
    AgentSchema, BaseAgent, ChatAgent, ChatRequest, ChatResponse, ConversationTurn, Query,
};
use crate::error::Result;
use crate::registry::AgentDescriptor;
use crate::runtime::Runtime;

pub const NAME: &str = "ConversationSummaryAgent";

/// Summary length used when the request carries no `summary_length` feature.
pub const DEFAULT_SUMMARY_LENGTH: u32 = 200;

/// Speaker assigned to a query that is not a list of turns.
const FALLBACK_SPEAKER: &str = "User";

fn default_summary_length() -> u32 {
    DEFAULT_SUMMARY_LENGTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub conversation_turns: Vec<ConversationTurn>,
    #[serde(default = "default_summary_length")]
    pub summary_length: u32,
}

impl AgentSchema for SummaryInput {
    fn schema_name() -> &'static str {
        "SummaryInput"
    }

    fn field_names() -> &'static [&'static str] {
        &["conversation_turns", "summary_length"]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
}

impl AgentSchema for SummaryOutput {
    fn schema_name() -> &'static str {
        "SummaryOutput"
    }

    fn field_names() -> &'static [&'static str] {
        &["summary", "key_findings", "action_items"]
    }
}

pub struct ConversationSummaryAgent {
    inner: BaseAgent<SummaryInput, SummaryOutput>,
}

impl ConversationSummaryAgent {
    pub fn build(runtime: &Runtime) -> Result<Self> {
        let inner = BaseAgent::builder()
            .with_embedded_config(include_str!("agent.yaml"))
            .build(runtime)?;
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &BaseAgent<SummaryInput, SummaryOutput> {
        &self.inner
    }

    /// Read the query as conversation turns. Anything that is not a list of
    /// turns becomes a single turn holding its text.
    pub fn conversation_turns(query: &Query) -> Vec<ConversationTurn> {
        let decoded = match query {
            Query::Turns(turns) => Some(turns.clone()),
            Query::Text(text) => serde_json::from_str::<Vec<ConversationTurn>>(text).ok(),
            Query::Fields(map) => map
                .get("conversation_turns")
                .cloned()
                .and_then(|v: Value| serde_json::from_value(v).ok()),
        };
        decoded.unwrap_or_else(|| {
            debug!("Query is not a list of turns; using it as a single turn");
            vec![ConversationTurn::new(FALLBACK_SPEAKER, &query.transcript())]
        })
    }
}

#[async_trait]
impl ChatAgent for ConversationSummaryAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        &self.inner.config().description
    }

    async fn chat(&self, request: &ChatRequest) -> ChatResponse {
        let input = SummaryInput {
            conversation_turns: Self::conversation_turns(&request.query),
            summary_length: request.feature("summary_length", DEFAULT_SUMMARY_LENGTH),
        };
        debug!(
            agent = self.name(),
            turns = input.conversation_turns.len(),
            summary_length = input.summary_length,
            "Summarizing conversation"
        );

        match self
            .inner
            .run_to_payload(&request.user_id, &request.session_id, &input)
            .await
        {
            Ok(payload) => ChatResponse::success(request, payload),
            Err(e) => {
                error!(agent = self.name(), error = %e, "Conversation summary failed");
                ChatResponse::failure(request, e)
            }
        }
    }
}

pub fn descriptors() -> Result<Vec<AgentDescriptor>> {
    Ok(vec![AgentDescriptor::new(
        NAME,
        "Summarizes a conversation into a summary, key findings and action items",
        |runtime| Ok(Arc::new(ConversationSummaryAgent::build(runtime)?) as Arc<dyn ChatAgent>),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use crate::engine::{EngineFactory, EngineMessage, EngineSpec, EventStream, ExecutionEngine};
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    /// Records the serialized input of each run.
    #[derive(Default)]
    struct Recorder {
        inputs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExecutionEngine for Recorder {
        async fn run(&self, _user: &str, _session: &str, message: EngineMessage) -> Result<EventStream> {
            self.inputs.lock().unwrap().push(message.text);
            let reply = crate::engine::EngineEvent::message(
                NAME,
                r#"{"summary": "short", "key_findings": ["a"], "action_items": []}"#,
            );
            Ok(Box::pin(stream::iter(vec![Ok(reply)])))
        }
    }

    struct Shared(Arc<Recorder>);

    impl EngineFactory for Shared {
        fn create(&self, _spec: EngineSpec) -> Result<Arc<dyn ExecutionEngine>> {
            Ok(self.0.clone())
        }
    }

    fn agent_with_recorder() -> (ConversationSummaryAgent, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let runtime = Runtime::builder(RuntimeSettings::default())
            .with_engine_factory(Shared(recorder.clone()))
            .build()
            .unwrap();
        (ConversationSummaryAgent::build(&runtime).unwrap(), recorder)
    }

    fn sent_input(recorder: &Recorder) -> SummaryInput {
        let inputs = recorder.inputs.lock().unwrap();
        serde_json::from_str(inputs.last().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_feature_overrides_summary_length() {
        let (agent, recorder) = agent_with_recorder();
        let request = ChatRequest::new(NAME, "u", "s", vec![ConversationTurn::new("a", "hi")])
            .with_feature("summary_length", 50);

        let resp = agent.chat(&request).await;
        assert!(resp.success);
        assert_eq!(sent_input(&recorder).summary_length, 50);
        assert_eq!(resp.agent_response.as_structured().unwrap()["summary"], "short");
    }

    #[tokio::test]
    async fn test_default_summary_length() {
        let (agent, recorder) = agent_with_recorder();
        agent
            .chat(&ChatRequest::new(NAME, "u", "s", vec![ConversationTurn::new("a", "hi")]))
            .await;
        assert_eq!(sent_input(&recorder).summary_length, DEFAULT_SUMMARY_LENGTH);
    }

    #[test]
    fn test_conversation_turns_shapes() {
        let json_text = Query::from(r#"[{"speaker": "doctor", "text": "rest"}]"#);
        assert_eq!(
            ConversationSummaryAgent::conversation_turns(&json_text),
            vec![ConversationTurn::new("doctor", "rest")]
        );

        let plain = Query::from("just talking");
        assert_eq!(
            ConversationSummaryAgent::conversation_turns(&plain),
            vec![ConversationTurn::new(FALLBACK_SPEAKER, "just talking")]
        );
    }

    #[tokio::test]
    async fn test_runs_on_echo_engine() {
        let runtime = Runtime::new(RuntimeSettings::default()).unwrap();
        let agent = ConversationSummaryAgent::build(&runtime).unwrap();
        assert_eq!(agent.name(), NAME);
        let resp = agent
            .chat(&ChatRequest::new(NAME, "u", "s", vec![ConversationTurn::new("a", "hi")]))
            .await;
        assert!(resp.success);
        assert!(resp.agent_response.as_structured().is_some());
    }
}
