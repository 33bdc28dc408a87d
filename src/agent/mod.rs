//! Agent orchestration for Agentry
//!
//! This module contains the [`BaseAgent`] orchestrator, the chat boundary
//! types ([`ChatRequest`], [`ChatResponse`]) and the customization traits
//! agents use to change how they are built or how requests map to input.
//!
//! # Example
//!
//! ```
//! use agentry::agent::{BaseAgent, ChatRequest, TextInput, TextOutput};
//! use agentry::config::{AgentConfig, RuntimeSettings};
//! use agentry::providers::ProviderName;
//! use agentry::runtime::Runtime;
//!
//! # tokio_test::block_on(async {
//! let runtime = Runtime::new(RuntimeSettings::default()).unwrap();
//! let agent = BaseAgent::<TextInput, TextOutput>::builder()
//!     .with_config(AgentConfig::new(ProviderName::OpenAi, "gpt-4o-mini").with_name("Echo"))
//!     .build(&runtime)
//!     .unwrap();
//!
//! let response = agent.chat(&ChatRequest::new("Echo", "user-1", "session-1", "hello")).await;
//! assert!(response.success);
//! # });
//! ```

mod base;
pub mod behavior;
mod chat;
mod parser;
mod request;
mod schema;

pub use base::{AgentState, BaseAgent, BaseAgentBuilder};
pub use behavior::{map_query, BuildContext, BuildSubAgents, BuildTools, DefaultBehavior, MapInput, MapInputFn};
pub use chat::ChatAgent;
pub use parser::{strip_code_fence, Parsed, ResponseParser};
pub use request::{Artifact, ChatRequest, ChatResponse, ConversationTurn, FeatureMap, Payload, Query};
pub use schema::{AgentSchema, TextInput, TextOutput};
