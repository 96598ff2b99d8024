//! Compile-time errors and warnings.

use serde::{Deserialize, Serialize};

/// Stable codes for everything the compiler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// The description violates the structural shape.
    SchemaValidationError,
    /// A node references a type missing from the catalog.
    UnknownNodeType,
    /// A node's configuration failed its catalog schema.
    NodeConfigValidationError,
    /// The graph contains a cycle.
    CycleDetected,
    /// A node is not reachable from the trigger.
    UnreachableNode,
    /// The trigger node has incoming edges.
    TriggerHasIncomingEdges,
    /// An edge violates a declared connection constraint.
    InvalidNodeConnection,
    /// A USSD-triggered workflow has no `session_end` node.
    UssdMissingSessionEnd,
    /// Two nodes share an id.
    DuplicateNodeId,
    /// Warning: a non-terminal node has no outgoing edges.
    DeadEndNode,
}

impl IssueCode {
    /// Whether this code is a warning rather than an error.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::DeadEndNode)
    }
}

/// One compiler finding: an error or a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileIssue {
    /// Stable code.
    pub code: IssueCode,
    /// Human-readable explanation.
    pub message: String,
    /// The node the finding is about, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// The edge the finding is about, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
}

impl CompileIssue {
    /// Create an issue.
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    /// Attach the node the issue is about.
    #[must_use]
    pub fn for_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Attach the edge the issue is about.
    #[must_use]
    pub fn for_edge(mut self, edge_id: impl Into<String>) -> Self {
        self.edge_id = Some(edge_id.into());
        self
    }
}
