use async_trait::async_trait;

use super::request::{ChatRequest, ChatResponse};

/// A constructed agent as seen by the registry and the caller-facing layer.
///
/// `chat` never fails: every error is reported inside the response with
/// `success = false`.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Names of the tools bound at construction.
    fn tool_names(&self) -> Vec<String> {
        Vec::new()
    }

    async fn chat(&self, request: &ChatRequest) -> ChatResponse;
}
