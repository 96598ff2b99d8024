//! Execution log queries.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use tawi_core::{ExecutionId, WorkflowId};
use tawi_execution::{ExecutionJournal, ExecutionRecord, ExecutionState, JournalQuery};

use crate::error::ApiError;
use crate::state::SharedRuntime;

/// `GET /workflows/executions/{id}`.
pub async fn get_one(
    State(runtime): State<SharedRuntime>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let execution_id = ExecutionId::parse(&id)
        .map_err(|_| ApiError::BadRequest(format!("`{id}` is not an execution id")))?;
    runtime
        .journal
        .get(execution_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("execution `{id}`")))
}

/// Query-string filters for `GET /workflows/executions`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionFilters {
    /// Only this workflow.
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    /// Only this state.
    #[serde(default)]
    pub state: Option<ExecutionState>,
    /// Started at or after.
    #[serde(default)]
    pub started_at_from: Option<chrono::DateTime<chrono::Utc>>,
    /// Started at or before.
    #[serde(default)]
    pub started_at_to: Option<chrono::DateTime<chrono::Utc>>,
    /// Row cap.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /workflows/executions`.
pub async fn query(
    State(runtime): State<SharedRuntime>,
    Query(filters): Query<ExecutionFilters>,
) -> Json<Value> {
    let executions = runtime
        .journal
        .query(JournalQuery {
            workflow_id: filters.workflow_id,
            state: filters.state,
            started_at_from: filters.started_at_from,
            started_at_to: filters.started_at_to,
            limit: filters.limit,
        })
        .await;
    Json(json!({ "executions": executions }))
}
