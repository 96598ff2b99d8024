//! The handler trait and its outcome type.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tawi_execution::NodeError;
use tawi_workflow::ExecutionNode;

use crate::context::ActionContext;

/// What a handler produced: an output map and the output handle it
/// chose, which drives conditional routing downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// The node's output.
    pub output: Map<String, Value>,
    /// The selected output handle (`success`, `true`, a switch case...).
    /// `None` for nodes without outgoing handles, like `session_end`.
    pub handle: Option<String>,
}

impl ActionOutcome {
    /// An outcome on the `success` handle.
    #[must_use]
    pub fn success(output: Map<String, Value>) -> Self {
        Self::on("success", output)
    }

    /// An outcome on an explicit handle.
    #[must_use]
    pub fn on(handle: impl Into<String>, output: Map<String, Value>) -> Self {
        Self {
            output,
            handle: Some(handle.into()),
        }
    }

    /// An outcome with no handle (terminal nodes).
    #[must_use]
    pub fn terminal(output: Map<String, Value>) -> Self {
        Self {
            output,
            handle: None,
        }
    }
}

/// One node type's implementation.
///
/// Handlers return structured [`NodeError`]s instead of panicking; the
/// engine applies the node's retry policy and records the result. A
/// handler must return promptly once the context's cancellation token
/// fires.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute one node.
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_selects_success_handle() {
        let outcome = ActionOutcome::success(Map::new());
        assert_eq!(outcome.handle.as_deref(), Some("success"));
    }

    #[test]
    fn on_selects_named_handle() {
        let outcome = ActionOutcome::on("false", Map::new());
        assert_eq!(outcome.handle.as_deref(), Some("false"));
    }

    #[test]
    fn terminal_has_no_handle() {
        assert!(ActionOutcome::terminal(Map::new()).handle.is_none());
    }
}
