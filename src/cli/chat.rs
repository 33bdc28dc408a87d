//! Chat command handler: one request through the registry.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use agentry::agent::{ChatRequest, Query};
use agentry::config::RuntimeSettings;

use super::common::{create_registry, print_json};

pub(crate) struct ChatArgs {
    pub agent: String,
    pub query: Option<String>,
    pub json: Option<String>,
    pub user: Option<String>,
    pub session: Option<String>,
    pub features: Vec<String>,
}

pub(crate) async fn cmd_chat(settings: RuntimeSettings, args: ChatArgs) -> Result<()> {
    let query = build_query(args.query.as_deref(), args.json.as_deref())?;
    let user = args
        .user
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let session = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut request = ChatRequest::new(&args.agent, &user, &session, query).with_sender("cli");
    for raw in &args.features {
        let (name, value) = parse_feature(raw)?;
        request = request.with_feature(&name, value);
    }

    let registry = create_registry(settings)?;
    let response = registry
        .chat(&request)
        .await
        .with_context(|| format!("Failed to route request to {}", args.agent))?;
    print_json(&response)?;

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

fn build_query(text: Option<&str>, json: Option<&str>) -> Result<Query> {
    match (text, json) {
        (Some(text), None) => Ok(Query::from(text)),
        (None, Some(raw)) => serde_json::from_str(raw).context("Invalid --json query"),
        (None, None) => bail!("Either --query or --json is required"),
        (Some(_), Some(_)) => bail!("--query and --json are mutually exclusive"),
    }
}

/// Parse `name=value`. The value is read as JSON when it parses, else kept as text.
fn parse_feature(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Feature must be NAME=VALUE, got '{}'", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Feature name is empty in '{}'", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_feature_values() {
        assert_eq!(
            parse_feature("summary_length=120").unwrap(),
            ("summary_length".to_string(), json!(120))
        );
        assert_eq!(
            parse_feature("tone=formal").unwrap(),
            ("tone".to_string(), json!("formal"))
        );
        assert_eq!(
            parse_feature("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
        assert!(parse_feature("novalue").is_err());
        assert!(parse_feature("=1").is_err());
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query(Some("hi"), None).unwrap(), Query::from("hi"));
        let turns = build_query(None, Some(r#"[{"speaker":"User","text":"hi"}]"#)).unwrap();
        assert!(matches!(turns, Query::Turns(t) if t.len() == 1));
        let fields = build_query(None, Some(r#"{"message":"hi"}"#)).unwrap();
        assert!(matches!(fields, Query::Fields(_)));
        assert!(build_query(None, None).is_err());
        assert!(build_query(None, Some("{oops")).is_err());
    }
}
