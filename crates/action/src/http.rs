//! The `http_request` handler.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tawi_execution::{NodeError, error::codes};
use tawi_workflow::ExecutionNode;

use crate::context::ActionContext;
use crate::handler::{ActionHandler, ActionOutcome};

/// Stable code for HTTP action failures.
pub const HTTP_REQUEST_ERROR: &str = "http_request_error";

/// Calls an external HTTP endpoint with rendered url/headers/body.
pub struct HttpRequestHandler {
    client: reqwest::Client,
}

impl HttpRequestHandler {
    /// Create the handler over a shared HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpRequestHandler {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl ActionHandler for HttpRequestHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let config = ctx.render_config(node);

        let url = config
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty() && !u.contains("{{"))
            .ok_or_else(|| NodeError::validation(HTTP_REQUEST_ERROR, "url is required"))?;
        let method: reqwest::Method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .parse()
            .map_err(|_| NodeError::validation(HTTP_REQUEST_ERROR, "invalid method"))?;
        let timeout_ms = config
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or(30_000);

        let mut request = self
            .client
            .request(method, url)
            .timeout(Duration::from_millis(timeout_ms));
        if let Some(headers) = config.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }
        if let Some(body) = config.get("body") {
            if !body.is_null() {
                request = request.json(body);
            }
        }

        let response = tokio::select! {
            response = request.send() => response.map_err(classify_transport)?,
            () = ctx.cancellation.cancelled() => {
                return Err(NodeError::permanent("cancelled", "request interrupted by cancellation"));
            }
        };

        let status = response.status();
        let body_text = response.text().await.map_err(classify_transport)?;
        let body_value = serde_json::from_str::<Value>(&body_text)
            .unwrap_or(Value::String(body_text));

        if !status.is_success() {
            let message = format!("endpoint returned status {}", status.as_u16());
            return Err(if status.as_u16() == 429 {
                NodeError::rate_limit(message)
            } else if status.is_server_error() {
                NodeError::transient(HTTP_REQUEST_ERROR, message)
            } else {
                NodeError::permanent(HTTP_REQUEST_ERROR, message)
            }
            .with_details(body_value));
        }

        let mut output = Map::new();
        output.insert("status".into(), Value::from(status.as_u16()));
        output.insert("body".into(), body_value);
        Ok(ActionOutcome::success(output))
    }
}

fn classify_transport(error: reqwest::Error) -> NodeError {
    if error.is_timeout() {
        NodeError::transient(codes::NETWORK_ERROR, format!("request timed out: {error}"))
    } else {
        NodeError::transient(codes::NETWORK_ERROR, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tawi_catalog::builtin_catalog;
    use tawi_core::{ExecutionId, WorkflowId};
    use tawi_expression::Scope;
    use tawi_session::InMemorySessionStore;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_node(config: Value) -> ExecutionNode {
        let entry = builtin_catalog().lookup("http_request").unwrap();
        let config = match config {
            Value::Object(map) => map,
            _ => panic!("config must be an object"),
        };
        ExecutionNode {
            id: "http-1".into(),
            node_type: "http_request".into(),
            requires_session: false,
            ends_session: false,
            entry,
            config,
            retry: tawi_catalog::RetryPolicy::none(),
            timeout: Duration::from_secs(30),
            disabled: false,
            incoming: vec![],
            outgoing: vec![],
            ordinal: 1,
        }
    }

    fn context(scope_value: Value) -> ActionContext {
        let scope = match scope_value {
            Value::Object(map) => Scope::from_map(map),
            _ => panic!("scope must be an object"),
        };
        ActionContext {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            scope,
            session: None,
            sessions: Arc::new(InMemorySessionStore::new()),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn posts_rendered_body_and_parses_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("x-api-key", "k-1"))
            .and(body_json(json!({"subscriber": "+254700000001"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let node = test_node(json!({
            "method": "POST",
            "url": format!("{}/orders", server.uri()),
            "headers": {"x-api-key": "k-1"},
            "body": {"subscriber": "{{subscriber}}"},
            "timeout_ms": 5000
        }));
        let ctx = context(json!({"subscriber": "+254700000001"}));

        let outcome = HttpRequestHandler::default()
            .execute(&node, &ctx, &Map::new())
            .await
            .unwrap();
        assert_eq!(outcome.output["status"], json!(200));
        assert_eq!(outcome.output["body"]["ok"], json!(true));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let node = test_node(json!({"method": "GET", "url": server.uri()}));
        let err = HttpRequestHandler::default()
            .execute(&node, &context(json!({})), &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, HTTP_REQUEST_ERROR);
        assert!(err.is_retryable_by_default());
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let node = test_node(json!({"method": "GET", "url": server.uri()}));
        let err = HttpRequestHandler::default()
            .execute(&node, &context(json!({})), &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "rate_limit");
    }

    #[tokio::test]
    async fn client_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let node = test_node(json!({"method": "GET", "url": server.uri()}));
        let err = HttpRequestHandler::default()
            .execute(&node, &context(json!({})), &Map::new())
            .await
            .unwrap_err();
        assert!(!err.is_retryable_by_default());
        assert_eq!(err.details, Some(json!("missing")));
    }

    #[tokio::test]
    async fn unresolved_url_is_rejected() {
        let node = test_node(json!({"url": "{{webhook_url}}"}));
        let err = HttpRequestHandler::default()
            .execute(&node, &context(json!({})), &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, HTTP_REQUEST_ERROR);
    }
}
