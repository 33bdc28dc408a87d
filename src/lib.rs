//! Agentry - registry and orchestration runtime for configuration-driven agents
//!
//! Agents are declared by a YAML config plus a pair of input/output schema
//! types. The [`AgentRegistry`] discovers them, constructs each one lazily on
//! first use and routes [`ChatRequest`]s to it; [`agent::BaseAgent`] drives a
//! run through its session store, execution engine and response parser.

pub mod agent;
pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod providers;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{BaseAgent, ChatAgent, ChatRequest, ChatResponse, Payload, Query};
pub use config::{AgentConfig, ConfigResolver, RuntimeSettings};
pub use error::{AgentryError, Result};
pub use registry::{AgentDescriptor, AgentModule, AgentRegistry};
pub use runtime::Runtime;
