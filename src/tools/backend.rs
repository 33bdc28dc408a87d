//! Backend API tools.
//!
//! Tools of kind `backend_query` (GET) and `backend_create` (POST) forward a
//! call to the configured backend API and normalize whatever happens into a
//! JSON envelope: `{"success": true, ...}` or `{"error": ..., "status_code": ...}`.
//! Timeouts, refused connections and HTTP errors are results, never raised.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Tool, ToolContext, ToolOutput};
use crate::config::{BackendSettings, ToolDescriptor};
use crate::error::{AgentryError, Result};

/// Header carrying the service-to-service key.
pub const SERVICE_KEY_HEADER: &str = "X-AI-Service-Key";

/// Error bodies are cut to this many characters in envelopes.
const MAX_ERROR_BODY_CHARS: usize = 500;

const TIMEOUT_MESSAGE: &str = "Request to backend API timed out";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// What came back from the backend, before tool-specific normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// 2xx with its body (non-JSON bodies arrive as `{"raw": text}`)
    Success(Value),
    /// 404 with its body text
    NotFound(String),
    /// Timeout, connection or HTTP failure, already in envelope form
    Failure(Value),
}

/// HTTP client bound to the backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    service_key: Option<String>,
    timeout: Duration,
}

impl BackendClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when the base URL is not a valid http(s) URL.
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let raw = settings.base_url.trim_end_matches('/');
        let base = Url::parse(raw)
            .map_err(|e| AgentryError::Config(format!("invalid backend URL '{}': {}", raw, e)))?;
        if base.cannot_be_a_base() {
            return Err(AgentryError::Config(format!(
                "backend URL '{}' cannot carry a path",
                raw
            )));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base,
            service_key: settings.service_key.clone(),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Default per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Base URL extended with already-substituted path segments.
    pub fn url(&self, segments: &[String]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AgentryError::Config(format!("backend URL '{}' cannot carry a path", self.base))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    pub async fn get(&self, url: Url, query: &[(String, String)], timeout: Duration) -> BackendReply {
        self.send(self.http.get(url).query(query), timeout).await
    }

    pub async fn post(&self, url: Url, body: &Value, timeout: Duration) -> BackendReply {
        self.send(self.http.post(url).json(body), timeout).await
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> BackendReply {
        let mut request = request.timeout(timeout);
        if let Some(key) = &self.service_key {
            request = request.header(SERVICE_KEY_HEADER, key);
        }

        let call = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        match tokio::time::timeout(timeout, call).await {
            Err(_) => BackendReply::Failure(json!({ "error": TIMEOUT_MESSAGE })),
            Ok(Err(e)) if e.is_timeout() => BackendReply::Failure(json!({ "error": TIMEOUT_MESSAGE })),
            Ok(Err(e)) => BackendReply::Failure(json!({
                "error": format!("Error connecting to backend API: {}", e)
            })),
            Ok(Ok((status, text))) if status.is_success() => BackendReply::Success(
                serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text })),
            ),
            Ok(Ok((status, text))) if status == StatusCode::NOT_FOUND => BackendReply::NotFound(text),
            Ok(Ok((status, text))) => BackendReply::Failure(http_error_envelope(status.as_u16(), &text)),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn http_error_envelope(status: u16, body: &str) -> Value {
    let details = truncate_chars(body, MAX_ERROR_BODY_CHARS);
    json!({
        "error": format!("Backend API error: {} - {}", status, details),
        "status_code": status,
        "details": details,
    })
}

fn success_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            map.entry("success").or_insert(Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "data": other }),
    }
}

/// Render a scalar argument as a URL path segment or query value.
fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Accept an argument object, or a string holding one.
fn normalize_args(args: Value) -> std::result::Result<Map<String, Value>, Value> {
    match args {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(json!({ "error": "Invalid JSON input: expected an object" })),
            Err(e) => Err(json!({ "error": format!("Invalid JSON input: {}", e) })),
        },
        _ => Err(json!({ "error": "Invalid JSON input: expected an object" })),
    }
}

/// HTTP method of a backend tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMethod {
    Get,
    Post,
}

/// A declared tool proxying one backend endpoint.
pub struct BackendTool {
    name: String,
    description: String,
    method: BackendMethod,
    path_template: String,
    required_args: Vec<String>,
    defaults: BTreeMap<String, Value>,
    items_key: String,
    timeout: Duration,
    schema: Value,
    client: Arc<BackendClient>,
}

impl BackendTool {
    /// Build from a descriptor.
    ///
    /// Recognized params: `path` (required), `required_args`, `defaults`,
    /// `items_key`, `timeout_secs` and `parameters` (a JSON Schema override).
    pub fn from_descriptor(
        descriptor: &ToolDescriptor,
        method: BackendMethod,
        client: Arc<BackendClient>,
    ) -> Result<Self> {
        let path_template = descriptor
            .param_str("path")
            .ok_or_else(|| AgentryError::Config(format!("tool '{}': missing 'path'", descriptor.name)))?
            .to_string();

        let defaults: BTreeMap<String, Value> = match descriptor.params.get("defaults") {
            None => BTreeMap::new(),
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            Some(_) => {
                return Err(AgentryError::Config(format!(
                    "tool '{}': 'defaults' must be a mapping",
                    descriptor.name
                )))
            }
        };

        let mut tool = Self {
            name: descriptor.name.clone(),
            description: descriptor
                .description
                .clone()
                .unwrap_or_else(|| format!("Call backend endpoint {}", path_template)),
            method,
            required_args: descriptor.param_list("required_args"),
            defaults,
            items_key: descriptor
                .param_str("items_key")
                .unwrap_or("items")
                .to_string(),
            timeout: descriptor
                .param_u64("timeout_secs")
                .map(Duration::from_secs)
                .unwrap_or_else(|| client.timeout()),
            schema: Value::Null,
            path_template,
            client,
        };
        tool.schema = match descriptor.params.get("parameters") {
            Some(schema @ Value::Object(_)) => schema.clone(),
            _ => tool.derived_schema(),
        };
        Ok(tool)
    }

    fn placeholders(&self) -> Vec<String> {
        placeholder_re()
            .captures_iter(&self.path_template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    fn derived_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();
        for name in self.placeholders().into_iter().chain(self.required_args.iter().cloned()) {
            if !required.contains(&name) {
                properties.insert(name.clone(), json!({ "type": "string" }));
                required.push(name);
            }
        }
        for (name, default) in &self.defaults {
            let kind = match default {
                Value::Number(_) => "number",
                Value::Bool(_) => "boolean",
                _ => "string",
            };
            properties
                .entry(name.clone())
                .or_insert_with(|| json!({ "type": kind, "default": default }));
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Substitute placeholders; returns the path segments and the consumed args.
    fn render_path(&self, args: &Map<String, Value>) -> std::result::Result<(Vec<String>, Vec<String>), String> {
        let mut segments = Vec::new();
        let mut used = Vec::new();
        for raw in self.path_template.split('/').filter(|s| !s.is_empty()) {
            let mut segment = String::new();
            let mut last = 0;
            for caps in placeholder_re().captures_iter(raw) {
                let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
                let name = &caps[1];
                let value = args
                    .get(name)
                    .filter(|v| !is_blank(Some(v)))
                    .ok_or_else(|| format!("{} is required", name))?;
                segment.push_str(&raw[last..whole.start]);
                segment.push_str(&param_string(value));
                last = whole.end;
                used.push(name.to_string());
            }
            segment.push_str(&raw[last..]);
            segments.push(segment);
        }
        Ok((segments, used))
    }

    fn required_error(&self, missing: &str) -> Value {
        json!({
            "error": format!("{} is required", missing),
            "format": self.schema.get("properties").cloned().unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl Tool for BackendTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let mut args = match normalize_args(args) {
            Ok(map) => map,
            Err(envelope) => return Ok(ToolOutput::from_envelope(&envelope)),
        };

        for name in self.required_args.iter().cloned().chain(self.placeholders()) {
            if is_blank(args.get(&name)) {
                if let Some(value) = ctx.lookup(&name) {
                    args.insert(name, Value::String(value.to_string()));
                }
            }
        }
        if let Some(missing) = self.required_args.iter().find(|a| is_blank(args.get(*a))) {
            return Ok(ToolOutput::from_envelope(&self.required_error(missing)));
        }

        let (segments, used) = match self.render_path(&args) {
            Ok(rendered) => rendered,
            Err(message) => {
                let missing = message.trim_end_matches(" is required").to_string();
                return Ok(ToolOutput::from_envelope(&self.required_error(&missing)));
            }
        };
        let url = self.client.url(&segments)?;

        for (name, default) in &self.defaults {
            args.entry(name.clone()).or_insert_with(|| default.clone());
        }
        for name in &used {
            args.remove(name);
        }

        debug!(tool = %self.name, url = %url, "Calling backend");
        let reply = match self.method {
            BackendMethod::Get => {
                let query: Vec<(String, String)> = args
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), param_string(v)))
                    .collect();
                self.client.get(url, &query, self.timeout).await
            }
            BackendMethod::Post => {
                self.client
                    .post(url, &Value::Object(args), self.timeout)
                    .await
            }
        };

        let envelope = match reply {
            BackendReply::Success(body) => success_envelope(body),
            BackendReply::NotFound(_) if self.method == BackendMethod::Get => {
                let mut empty = Map::new();
                empty.insert("success".into(), Value::Bool(true));
                empty.insert("count".into(), json!(0));
                empty.insert(self.items_key.clone(), json!([]));
                Value::Object(empty)
            }
            BackendReply::NotFound(body) => http_error_envelope(404, &body),
            BackendReply::Failure(envelope) => envelope,
        };
        Ok(ToolOutput::from_envelope(&envelope))
    }
}
