//! The user-authored workflow description.
//!
//! This is the JSON shape produced by the visual builder and accepted by
//! the `validate`/`compile`/`execute` endpoints. It is deliberately
//! permissive — structural and semantic checks happen in the compiler,
//! not in serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tawi_catalog::RetryPolicy;
use tawi_core::WorkflowId;

/// Identity and audit fields of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Stable workflow identifier.
    pub id: WorkflowId,
    /// Monotonic integer version; bumped on every edit.
    pub version: u32,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// When the description was created.
    pub created_at: DateTime<Utc>,
    /// Optional free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Optional environment label (`sandbox`, `production`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// Canvas position, carried through for the builder UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// One node of a workflow description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Stable id, unique within the description.
    pub id: String,
    /// Node type key resolved against the catalog.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Per-node retry policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Per-node timeout override, carried on the wire as milliseconds.
    #[serde(
        default,
        rename = "timeout_ms",
        skip_serializing_if = "Option::is_none",
        with = "tawi_core::serde_ms::opt"
    )]
    pub timeout: Option<Duration>,
    /// Disabled nodes are skipped at execution time.
    #[serde(default)]
    pub disabled: bool,
    /// Canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl NodeSpec {
    /// A node with the given id and type, empty config.
    #[must_use]
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: String::new(),
            config: Map::new(),
            retry: None,
            timeout: None,
            disabled: false,
            position: None,
        }
    }

    /// Set the configuration from a JSON object literal.
    ///
    /// # Panics
    /// Panics if `config` is not a JSON object.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        match config {
            Value::Object(map) => self.config = map,
            other => panic!("node config must be an object, got {other}"),
        }
        self
    }
}

/// One edge of a workflow description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Stable edge id.
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Output handle on the source (`success`, `true`, a switch case...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input handle on the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Optional condition label, carried for the builder UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Optional display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EdgeSpec {
    /// An edge between two nodes with no handles.
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            condition: None,
            label: None,
        }
    }

    /// Attach a source handle.
    #[must_use]
    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

/// A complete workflow description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDescription {
    /// Identity and audit fields.
    pub metadata: WorkflowMetadata,
    /// The trigger node. Its id must also appear in `nodes`.
    pub trigger: NodeSpec,
    /// All nodes, including the trigger.
    pub nodes: Vec<NodeSpec>,
    /// All edges.
    pub edges: Vec<EdgeSpec>,
}

impl WorkflowDescription {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn description_deserializes_from_builder_json() {
        let raw = json!({
            "metadata": {
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "version": 2,
                "name": "sms echo",
                "created_at": "2025-11-02T10:00:00Z",
                "tags": ["demo"]
            },
            "trigger": {"id": "t", "type": "sms_received", "config": {}},
            "nodes": [
                {"id": "t", "type": "sms_received", "config": {}},
                {
                    "id": "reply",
                    "type": "send_sms",
                    "config": {"to": "{{subscriber}}", "message": "hi"},
                    "timeout_ms": 5000,
                    "disabled": false
                }
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "reply", "source_handle": "output"}
            ]
        });

        let description: WorkflowDescription = serde_json::from_value(raw).unwrap();
        assert_eq!(description.metadata.version, 2);
        assert_eq!(description.nodes.len(), 2);
        assert_eq!(description.edges[0].source_handle.as_deref(), Some("output"));
        assert_eq!(
            description.node("reply").unwrap().timeout,
            Some(Duration::from_millis(5000))
        );
        assert!(description.node("ghost").is_none());
    }

    #[test]
    fn node_spec_builder_helpers() {
        let node = NodeSpec::new("n1", "condition")
            .with_config(json!({"expression": "{{amount}} > 100"}));
        assert_eq!(node.node_type, "condition");
        assert_eq!(node.config["expression"], json!("{{amount}} > 100"));
        assert!(!node.disabled);
    }

    #[test]
    fn serde_roundtrip_preserves_edges() {
        let metadata = WorkflowMetadata {
            id: WorkflowId::v4(),
            version: 1,
            name: "wf".into(),
            description: None,
            author: None,
            created_at: Utc::now(),
            tags: vec![],
            environment: None,
        };
        let description = WorkflowDescription {
            metadata,
            trigger: NodeSpec::new("t", "sms_received"),
            nodes: vec![NodeSpec::new("t", "sms_received")],
            edges: vec![EdgeSpec::new("e", "t", "t").from_handle("output")],
        };

        let json = serde_json::to_string(&description).unwrap();
        let back: WorkflowDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back.edges[0].source_handle.as_deref(), Some("output"));
    }
}
