//! Default [`EngineFactory`].

use std::sync::Arc;

use tracing::debug;

use crate::engine::model::{ChatModel, EchoModel};
use crate::engine::tool_loop::DEFAULT_MAX_TOOL_ITERATIONS;
use crate::engine::{AgentKind, CompositeEngine, EngineFactory, EngineSpec, ExecutionEngine, ToolLoopEngine};
use crate::error::Result;

/// Builds [`ToolLoopEngine`]s over a shared [`ChatModel`] for model-driven
/// agents and [`CompositeEngine`]s for sequential/parallel ones.
#[derive(Clone)]
pub struct ModelEngineFactory {
    model: Arc<dyn ChatModel>,
    max_iterations: usize,
}

impl ModelEngineFactory {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    /// Factory over the offline [`EchoModel`].
    pub fn echo() -> Self {
        Self::new(Arc::new(EchoModel))
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

impl Default for ModelEngineFactory {
    fn default() -> Self {
        Self::echo()
    }
}

impl std::fmt::Debug for ModelEngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEngineFactory")
            .field("model", &self.model.name())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl EngineFactory for ModelEngineFactory {
    fn create(&self, spec: EngineSpec) -> Result<Arc<dyn ExecutionEngine>> {
        debug!(
            agent = %spec.agent_name,
            kind = ?spec.kind,
            backend = self.model.name(),
            tools = spec.tools.len(),
            sub_agents = spec.sub_agents.len(),
            "Creating execution engine"
        );
        match spec.kind {
            AgentKind::Llm => Ok(Arc::new(
                ToolLoopEngine::new(spec, Arc::clone(&self.model)).with_max_iterations(self.max_iterations),
            )),
            AgentKind::Sequential | AgentKind::Parallel => Ok(Arc::new(CompositeEngine::new(spec)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{last_text, EngineMessage, SchemaInfo, SubAgent};
    use crate::providers::ProviderName;
    use crate::tools::ToolSet;

    fn spec(kind: AgentKind, sub_agents: Vec<SubAgent>) -> EngineSpec {
        EngineSpec {
            agent_name: "A".into(),
            description: String::new(),
            instruction: String::new(),
            provider: ProviderName::OpenAi,
            model: "gpt-4o-mini".into(),
            temperature: 0.4,
            kind,
            input_schema: SchemaInfo::default(),
            output_schema: SchemaInfo::default(),
            tools: ToolSet::new(),
            sub_agents,
            hooks: None,
        }
    }

    #[tokio::test]
    async fn test_llm_kind_builds_tool_loop() {
        let factory = ModelEngineFactory::default();
        assert_eq!(factory.model_name(), "echo");
        let engine = factory.create(spec(AgentKind::Llm, vec![])).unwrap();
        let stream = engine.run("u", "s", EngineMessage::user("hey")).await.unwrap();
        assert_eq!(last_text(stream).await.unwrap().as_deref(), Some("hey"));
    }

    #[test]
    fn test_composite_kind_without_sub_agents_fails() {
        let factory = ModelEngineFactory::echo().with_max_iterations(3);
        assert!(factory.create(spec(AgentKind::Sequential, vec![])).is_err());
    }

    #[test]
    fn test_composite_kind_with_sub_agents() {
        let factory = ModelEngineFactory::echo();
        let sub = SubAgent {
            name: "inner".into(),
            description: String::new(),
            engine: factory.create(spec(AgentKind::Llm, vec![])).unwrap(),
        };
        assert!(factory.create(spec(AgentKind::Parallel, vec![sub])).is_ok());
    }
}
