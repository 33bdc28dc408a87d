//! Built-in agents.
//!
//! Each agent lives in its own module next to its `agent.yaml`, which is
//! compiled into the binary, and exposes `descriptors()`; [`modules`] lists
//! them for registry discovery.

pub mod action_items;
pub mod assistant;
pub mod conversation_summary;
pub mod echo;

use crate::registry::AgentModule;

/// Agent modules in discovery order.
pub fn modules() -> Vec<AgentModule> {
    vec![
        AgentModule {
            name: "echo",
            load: echo::descriptors,
        },
        AgentModule {
            name: "conversation_summary",
            load: conversation_summary::descriptors,
        },
        AgentModule {
            name: "action_items",
            load: action_items::descriptors,
        },
        AgentModule {
            name: "assistant",
            load: assistant::descriptors,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use crate::registry::AgentRegistry;
    use crate::runtime::Runtime;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_all_builtin_agents_construct() {
        let registry = AgentRegistry::new(Arc::new(Runtime::new(RuntimeSettings::default()).unwrap()));
        assert_eq!(registry.discover(&modules()), 4);
        for name in registry.list_names() {
            let agent = registry.get_instance(&name).await.unwrap();
            assert_eq!(agent.name(), name);
        }
    }
}
