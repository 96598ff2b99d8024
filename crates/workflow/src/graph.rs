//! The compiled execution graph.
//!
//! Immutable once produced by the compiler; shared across invocations
//! behind an `Arc`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tawi_catalog::{CatalogEntry, RetryPolicy};
use tawi_core::WorkflowId;

/// Fallback per-node timeout when neither the description nor the
/// catalog entry sets one.
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);

/// A resolved edge inside the compiled graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRef {
    /// The description's edge id.
    pub edge_id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Output handle on the source, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input handle on the target, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// One node of the compiled graph, with effective policies resolved.
#[derive(Debug, Clone)]
pub struct ExecutionNode {
    /// Node id from the description.
    pub id: String,
    /// Node type key.
    pub node_type: String,
    /// The catalog entry backing this node.
    pub entry: Arc<CatalogEntry>,
    /// Configuration with schema defaults applied.
    pub config: Map<String, Value>,
    /// Effective retry policy (node override, else catalog default,
    /// else the global default).
    pub retry: RetryPolicy,
    /// Effective timeout (node override, else catalog default, else
    /// [`DEFAULT_NODE_TIMEOUT`]).
    pub timeout: Duration,
    /// Whether the node is disabled.
    pub disabled: bool,
    /// Incoming edges, in description order.
    pub incoming: Vec<EdgeRef>,
    /// Outgoing edges, in description order.
    pub outgoing: Vec<EdgeRef>,
    /// Whether this node needs an open session.
    pub requires_session: bool,
    /// Whether executing this node ends the session.
    pub ends_session: bool,
    /// Position of this node in `execution_order`.
    pub ordinal: usize,
}

/// Graph-wide facts computed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphMetadata {
    /// Whether the trigger or any node needs a session.
    pub requires_session: bool,
    /// Whether any node ends a session.
    pub has_session_end: bool,
    /// Longest path (in edges) from the trigger to any node.
    pub max_depth: usize,
    /// Always `false` — a cyclic description never compiles.
    pub has_cycles: bool,
}

/// A validated, topologically ordered workflow ready for execution.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// The workflow this graph was compiled from.
    pub workflow_id: WorkflowId,
    /// The workflow version this graph was compiled from.
    pub workflow_version: u32,
    /// Id of the trigger node.
    pub trigger_node: String,
    /// Every reachable node, keyed by id.
    pub nodes: HashMap<String, ExecutionNode>,
    /// Node ids in dependency order; predecessors precede successors.
    pub execution_order: Vec<String>,
    /// Graph-wide metadata.
    pub metadata: GraphMetadata,
}

impl ExecutionGraph {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ExecutionNode> {
        self.nodes.get(id)
    }

    /// The wire representation returned by the compile endpoint.
    ///
    /// Catalog entries carry non-serializable machinery (compiled
    /// patterns, validation hooks), so the wire form projects each node
    /// down to its serializable facts.
    #[must_use]
    pub fn to_wire(&self) -> GraphWire {
        let mut nodes: Vec<NodeWire> = self
            .nodes
            .values()
            .map(|node| NodeWire {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                config: node.config.clone(),
                disabled: node.disabled,
                timeout_ms: node.timeout.as_millis() as u64,
                requires_session: node.requires_session,
                ends_session: node.ends_session,
                ordinal: node.ordinal,
                incoming: node.incoming.clone(),
                outgoing: node.outgoing.clone(),
            })
            .collect();
        nodes.sort_by_key(|n| n.ordinal);

        GraphWire {
            workflow_id: self.workflow_id,
            workflow_version: self.workflow_version,
            trigger_node: self.trigger_node.clone(),
            execution_order: self.execution_order.clone(),
            metadata: self.metadata,
            nodes,
        }
    }
}

/// Serializable projection of an [`ExecutionGraph`].
#[derive(Debug, Clone, Serialize)]
pub struct GraphWire {
    /// The workflow this graph was compiled from.
    pub workflow_id: WorkflowId,
    /// The workflow version this graph was compiled from.
    pub workflow_version: u32,
    /// Id of the trigger node.
    pub trigger_node: String,
    /// Node ids in dependency order.
    pub execution_order: Vec<String>,
    /// Graph-wide metadata.
    pub metadata: GraphMetadata,
    /// Per-node facts, in execution order.
    pub nodes: Vec<NodeWire>,
}

/// Serializable projection of an [`ExecutionNode`].
#[derive(Debug, Clone, Serialize)]
pub struct NodeWire {
    /// Node id.
    pub id: String,
    /// Node type key.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Resolved configuration.
    pub config: Map<String, Value>,
    /// Whether the node is disabled.
    pub disabled: bool,
    /// Effective timeout in milliseconds.
    pub timeout_ms: u64,
    /// Whether the node needs a session.
    pub requires_session: bool,
    /// Whether the node ends the session.
    pub ends_session: bool,
    /// Position in the execution order.
    pub ordinal: usize,
    /// Incoming edges.
    pub incoming: Vec<EdgeRef>,
    /// Outgoing edges.
    pub outgoing: Vec<EdgeRef>,
}
