//! Per-invocation runtime state.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tawi_core::{ExecutionId, WorkflowId};

/// The mutable state of one invocation.
///
/// Owned exclusively by the engine while the invocation runs; created
/// when execution starts and discarded when it ends. Never shared
/// across invocations, so it needs no interior locking.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique id of this invocation.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The workflow version being executed.
    pub workflow_version: u32,
    /// Normalized event payload that seeded the invocation.
    pub trigger_payload: Map<String, Value>,
    /// The attached session id, when the graph uses one.
    pub session_id: Option<String>,
    /// Variables visible to templates; grows as node outputs merge in.
    pub variables: Map<String, Value>,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Create a context seeded with the trigger payload.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        workflow_version: u32,
        trigger_payload: Map<String, Value>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            workflow_version,
            variables: trigger_payload.clone(),
            trigger_payload,
            session_id,
            started_at: Utc::now(),
        }
    }

    /// Merge a node's output into the variables and expose it under
    /// `node_<id>` for addressing by templates.
    pub fn absorb_output(&mut self, node_id: &str, output: &Map<String, Value>) {
        for (key, value) in output {
            self.variables.insert(key.clone(), value.clone());
        }
        self.variables
            .insert(format!("node_{node_id}"), Value::Object(output.clone()));
    }
}
