//! Tools module for Agentry
//!
//! Tools are the capabilities an execution engine may invoke mid-run.
//! Agents declare them in their YAML configuration; the [`ToolBuilder`]
//! resolves each declaration through a [`ToolCatalog`] into a [`ToolSet`].
//!
//! Built-in kinds:
//! - `backend_query`: GET a backend API endpoint
//! - `backend_create`: POST to a backend API endpoint
//! - `echo`: return the `message` argument
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use agentry::config::{BackendSettings, ToolDescriptor};
//! use agentry::tools::{BackendClient, ToolBuilder, ToolCatalog, ToolContext, ToolEnv};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let catalog = ToolCatalog::with_builtins();
//! let env = ToolEnv {
//!     backend: Arc::new(BackendClient::new(&BackendSettings::default()).unwrap()),
//! };
//! let tools = ToolBuilder::new(&catalog, &env).build(&[ToolDescriptor::new("echo", "echo")]);
//!
//! let out = tools.execute("echo", json!({"message": "Hello!"}), &ToolContext::new()).await;
//! assert_eq!(out.content, "Hello!");
//! # });
//! ```

pub mod backend;
mod builder;
mod echo;
mod registry;
mod types;

pub use backend::{BackendClient, BackendMethod, BackendReply, BackendTool, SERVICE_KEY_HEADER};
pub use builder::{ToolBuilder, ToolCatalog, ToolEnv, ToolFactory};
pub use echo::EchoTool;
pub use registry::ToolSet;
pub use types::{Tool, ToolContext, ToolDefinition, ToolOutput};
