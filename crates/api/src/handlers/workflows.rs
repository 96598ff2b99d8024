//! `validate`, `compile`, and `execute`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use tawi_core::Channel;
use tawi_engine::ExecuteOptions;
use tawi_session::{NewSession, SessionStore};
use tawi_workflow::{ValidationReport, WorkflowDescription};

use crate::state::{SharedRuntime, trigger_channel};

/// `POST /workflows/validate`.
pub async fn validate(
    State(runtime): State<SharedRuntime>,
    Json(description): Json<WorkflowDescription>,
) -> Json<ValidationReport> {
    Json(runtime.compiler.validate(&description))
}

/// `POST /workflows/compile`.
pub async fn compile(
    State(runtime): State<SharedRuntime>,
    Json(description): Json<WorkflowDescription>,
) -> Response {
    match runtime.compiler.compile(&description) {
        Ok(compiled) => Json(json!({
            "success": true,
            "graph": compiled.graph.to_wire(),
            "warnings": compiled.warnings,
        }))
        .into_response(),
        Err(failure) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "errors": failure.errors,
                "warnings": failure.warnings,
            })),
        )
            .into_response(),
    }
}

/// Body of `POST /workflows/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// The workflow to run.
    pub workflow: WorkflowDescription,
    /// Normalized event payload.
    #[serde(default)]
    pub trigger_payload: Map<String, Value>,
    /// Attach to (or create) this session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Execution knobs.
    #[serde(default)]
    pub options: ExecuteRequestOptions,
}

/// Caller-settable execution knobs.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequestOptions {
    /// Invocation wall-clock budget in milliseconds.
    #[serde(default)]
    pub max_execution_ms: Option<u64>,
    /// Whether retry policies apply.
    #[serde(default)]
    pub enable_retries: Option<bool>,
}

/// `POST /workflows/execute`.
pub async fn execute(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    let (graph, _warnings) = match runtime.compile_cached(&request.workflow) {
        Ok(compiled) => compiled,
        Err(failure) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "errors": failure.errors,
                    "warnings": failure.warnings,
                })),
            )
                .into_response();
        }
    };
    runtime.remember_workflow(&request.workflow);

    // Open or attach the session before the engine runs.
    let session_id = if graph.metadata.requires_session {
        ensure_session(&runtime, &request, trigger_channel(&request.workflow.trigger.node_type))
            .await
    } else {
        request.session_id.clone()
    };

    let mut options = ExecuteOptions::default();
    if let Some(ms) = request.options.max_execution_ms {
        options.max_execution_ms = ms;
    }
    if let Some(enabled) = request.options.enable_retries {
        options.enable_retries = enabled;
    }

    let report = runtime
        .engine
        .execute(graph, request.trigger_payload, session_id, options)
        .await;

    Json(json!({
        "execution_id": report.execution_id,
        "status": report.status,
        "output": report.output,
        "error": report.error,
        "node_results": report.node_results,
        "duration_ms": report.duration.as_millis() as u64,
        "session_id": report.session_id,
    }))
    .into_response()
}

/// Resolve the session an invocation should run under: an existing live
/// session wins, otherwise one is opened under the gateway-supplied id
/// (or a generated one).
async fn ensure_session(
    runtime: &SharedRuntime,
    request: &ExecuteRequest,
    channel: Channel,
) -> Option<String> {
    let payload_session = request
        .trigger_payload
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let session_id = request.session_id.clone().or(payload_session);
    let subscriber = request
        .trigger_payload
        .get("subscriber")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(id) = &session_id {
        if runtime.sessions.get(id).await.is_some() {
            return session_id;
        }
    }
    if let Some(existing) = runtime.sessions.find_active(&subscriber, channel).await {
        return Some(existing.session_id);
    }

    let mut new = NewSession::new(channel, subscriber, runtime.session_ttl);
    if let Some(id) = session_id {
        new = new.with_id(id);
    }
    match runtime.sessions.create(new).await {
        Ok(record) => Some(record.session_id),
        Err(error) => {
            tracing::warn!(%error, "session could not be opened");
            None
        }
    }
}
