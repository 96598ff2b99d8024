//! Execution options and the final report.

use serde_json::{Map, Value};
use std::time::Duration;
use tawi_core::ExecutionId;
use tawi_execution::{ExecutionState, NodeError, NodeExecutionResult};
use tokio_util::sync::CancellationToken;

/// Default invocation-wide budget: five minutes.
pub const DEFAULT_MAX_EXECUTION_MS: u64 = 300_000;

/// Caller-supplied knobs for one invocation.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Wall-clock budget for the whole invocation, in milliseconds.
    pub max_execution_ms: u64,
    /// Whether per-node retry policies are applied.
    pub enable_retries: bool,
    /// Cooperative cancellation signal, checked between nodes and at
    /// every suspension point.
    pub cancellation: CancellationToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            max_execution_ms: DEFAULT_MAX_EXECUTION_MS,
            enable_retries: true,
            cancellation: CancellationToken::new(),
        }
    }
}

impl ExecuteOptions {
    /// Override the invocation budget.
    #[must_use]
    pub fn with_max_execution_ms(mut self, ms: u64) -> Self {
        self.max_execution_ms = ms;
        self
    }

    /// Enable or disable retries.
    #[must_use]
    pub fn with_retries(mut self, enabled: bool) -> Self {
        self.enable_retries = enabled;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// What one invocation produced.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Unique id of the invocation.
    pub execution_id: ExecutionId,
    /// Terminal state.
    pub status: ExecutionState,
    /// The final variables, present when the invocation completed.
    pub output: Option<Map<String, Value>>,
    /// The first unrecovered error, present when it failed.
    pub error: Option<NodeError>,
    /// Every attempt of every node, in execution order.
    pub node_results: Vec<NodeExecutionResult>,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
    /// The session the invocation ran under, if any.
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ExecuteOptions::default();
        assert_eq!(options.max_execution_ms, 300_000);
        assert!(options.enable_retries);
        assert!(!options.cancellation.is_cancelled());
    }

    #[test]
    fn builder_overrides() {
        let token = CancellationToken::new();
        let options = ExecuteOptions::default()
            .with_max_execution_ms(1_000)
            .with_retries(false)
            .with_cancellation(token.clone());
        assert_eq!(options.max_execution_ms, 1_000);
        assert!(!options.enable_retries);
        token.cancel();
        assert!(options.cancellation.is_cancelled());
    }
}
