//! Echo tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolOutput};
use crate::error::Result;

/// Returns its `message` argument unchanged.
///
/// ```rust
/// use agentry::tools::{EchoTool, Tool, ToolContext};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let tool = EchoTool::new("echo");
/// let out = tool.execute(json!({"message": "Hello"}), &ToolContext::new()).await.unwrap();
/// assert_eq!(out.content, "Hello");
/// # });
/// ```
pub struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo back"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(ToolOutput::success(message))
    }
}
