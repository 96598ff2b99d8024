//! The append-only record of one invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tawi_core::{ExecutionId, WorkflowId};

use crate::error::NodeError;
use crate::result::NodeExecutionResult;
use crate::status::ExecutionState;

/// The log of one workflow invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique invocation id.
    pub execution_id: ExecutionId,
    /// The workflow that ran.
    pub workflow_id: WorkflowId,
    /// The workflow version that ran.
    pub workflow_version: u32,
    /// Current state.
    pub state: ExecutionState,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
    /// When the invocation reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Node results in execution order (attempts consecutive).
    pub node_results: Vec<NodeExecutionResult>,
    /// Final output (the invocation's variables) on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    /// The first unrecovered error, when the invocation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
}

impl ExecutionRecord {
    /// A fresh record in the `running` state.
    #[must_use]
    pub fn started(execution_id: ExecutionId, workflow_id: WorkflowId, version: u32) -> Self {
        Self {
            execution_id,
            workflow_id,
            workflow_version: version,
            state: ExecutionState::Running,
            started_at: Utc::now(),
            completed_at: None,
            node_results: Vec::new(),
            output: None,
            error: None,
        }
    }

    /// Move the record to a terminal state, stamping `completed_at`.
    ///
    /// Idempotent: a record already in a terminal state is unchanged.
    pub fn finish(&mut self, state: ExecutionState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.completed_at = Some(Utc::now());
    }
}
