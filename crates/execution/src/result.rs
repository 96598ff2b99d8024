//! Per-attempt node execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NodeError;

/// Outcome of one node execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// The node produced an output.
    Success,
    /// The node failed.
    Error,
    /// The node did not run (disabled, or on an unselected branch).
    Skipped,
    /// The node exceeded its deadline.
    Timeout,
}

/// One record per attempt per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    /// The node this attempt belongs to.
    pub node_id: String,
    /// The attempt's outcome.
    pub status: NodeStatus,
    /// Output produced on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    /// Structured error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
    /// Wall-clock duration of the attempt in milliseconds.
    pub duration_ms: u64,
    /// When the attempt finished.
    pub executed_at: DateTime<Utc>,
    /// Which attempt this is (0-indexed).
    pub attempt: u32,
}

impl NodeExecutionResult {
    /// A successful attempt.
    #[must_use]
    pub fn success(
        node_id: impl Into<String>,
        output: Map<String, Value>,
        duration_ms: u64,
        attempt: u32,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Success,
            output: Some(output),
            error: None,
            duration_ms,
            executed_at: Utc::now(),
            attempt,
        }
    }

    /// A failed attempt.
    #[must_use]
    pub fn error(
        node_id: impl Into<String>,
        error: NodeError,
        duration_ms: u64,
        attempt: u32,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Error,
            output: None,
            error: Some(error),
            duration_ms,
            executed_at: Utc::now(),
            attempt,
        }
    }

    /// A skipped node. Duration is always zero.
    #[must_use]
    pub fn skipped(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut output = Map::new();
        output.insert("reason".into(), Value::String(reason.into()));
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Skipped,
            output: Some(output),
            error: None,
            duration_ms: 0,
            executed_at: Utc::now(),
            attempt: 0,
        }
    }

    /// A timed-out attempt.
    #[must_use]
    pub fn timeout(
        node_id: impl Into<String>,
        error: NodeError,
        duration_ms: u64,
        attempt: u32,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Timeout,
            output: None,
            error: Some(error),
            duration_ms,
            executed_at: Utc::now(),
            attempt,
        }
    }

    /// Whether the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }

    /// Whether the attempt failed or timed out.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.status, NodeStatus::Error | NodeStatus::Timeout)
    }
}
