//! The workflow compiler.
//!
//! A pipeline of stages, aborting at the first stage that produces
//! errors and collecting warnings throughout:
//!
//! 1. structural validation of the description
//! 2. node type check against the catalog
//! 3. per-node config validation
//! 4. graph construction (edge order preserved)
//! 5. topological ordering by DFS from the trigger — a back-edge is a
//!    cycle, an undiscovered node is unreachable; the emitted order is
//!    the DFS post-order reversed
//! 6. semantic validation (trigger edges, connection constraints, USSD
//!    termination)
//! 7. graph metadata

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, depth_first_search};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tawi_catalog::builtin::types;
use tawi_catalog::{NodeCatalog, NodeCategory};

use crate::description::WorkflowDescription;
use crate::graph::{DEFAULT_NODE_TIMEOUT, EdgeRef, ExecutionGraph, ExecutionNode, GraphMetadata};
use crate::issue::{CompileIssue, IssueCode};

/// A successfully compiled workflow.
#[derive(Debug)]
pub struct CompiledWorkflow {
    /// The execution graph.
    pub graph: ExecutionGraph,
    /// Non-fatal findings.
    pub warnings: Vec<CompileIssue>,
}

/// A failed compilation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("workflow failed to compile: {} error(s)", errors.len())]
pub struct CompileFailure {
    /// The errors of the stage that failed.
    pub errors: Vec<CompileIssue>,
    /// Warnings collected before the failure.
    pub warnings: Vec<CompileIssue>,
}

/// The outcome of `validate`, mirroring the compile pipeline without
/// producing a graph.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Whether the description would compile.
    pub valid: bool,
    /// Errors, empty when valid.
    pub errors: Vec<CompileIssue>,
    /// Warnings, possibly non-empty either way.
    pub warnings: Vec<CompileIssue>,
}

/// Compiles workflow descriptions against a catalog snapshot.
///
/// Pure over its inputs: the same description and catalog always produce
/// the same graph, which makes compiled graphs safe to cache by
/// `(workflow_id, version)`.
#[derive(Debug, Clone)]
pub struct Compiler {
    catalog: Arc<NodeCatalog>,
}

impl Compiler {
    /// Create a compiler over a catalog snapshot.
    #[must_use]
    pub fn new(catalog: Arc<NodeCatalog>) -> Self {
        Self { catalog }
    }

    /// Validate a description without keeping the graph.
    #[must_use]
    pub fn validate(&self, description: &WorkflowDescription) -> ValidationReport {
        match self.compile(description) {
            Ok(compiled) => ValidationReport {
                valid: true,
                errors: vec![],
                warnings: compiled.warnings,
            },
            Err(failure) => ValidationReport {
                valid: false,
                errors: failure.errors,
                warnings: failure.warnings,
            },
        }
    }

    /// Compile a description into an execution graph.
    pub fn compile(
        &self,
        description: &WorkflowDescription,
    ) -> Result<CompiledWorkflow, CompileFailure> {
        let mut warnings = Vec::new();

        let fail = |errors: Vec<CompileIssue>, warnings: Vec<CompileIssue>| CompileFailure {
            errors,
            warnings,
        };

        // Stage 1: structure.
        let errors = check_structure(description);
        if !errors.is_empty() {
            return Err(fail(errors, warnings));
        }

        // Stage 2: node types.
        let errors = self.check_types(description);
        if !errors.is_empty() {
            return Err(fail(errors, warnings));
        }

        // Stage 3: node configs.
        let errors = self.check_configs(description);
        if !errors.is_empty() {
            return Err(fail(errors, warnings));
        }

        // Stages 4 and 5: graph construction and topological order.
        let execution_order = match order_from_trigger(description) {
            Ok(order) => order,
            Err(errors) => return Err(fail(errors, warnings)),
        };

        // Stage 6: semantics.
        let errors = self.check_semantics(description);
        if !errors.is_empty() {
            return Err(fail(errors, warnings));
        }

        // Stage 7: build the graph and its metadata.
        let graph = self.build_graph(description, execution_order, &mut warnings);
        Ok(CompiledWorkflow { graph, warnings })
    }

    fn check_types(&self, description: &WorkflowDescription) -> Vec<CompileIssue> {
        let mut errors = Vec::new();

        for node in &description.nodes {
            if !self.catalog.contains(&node.node_type) {
                errors.push(
                    CompileIssue::new(
                        IssueCode::UnknownNodeType,
                        format!("node type `{}` is not in the catalog", node.node_type),
                    )
                    .for_node(node.id.as_str()),
                );
            }
        }
        if errors.is_empty() {
            // Safe to look up now that every type exists.
            let entry = self
                .catalog
                .lookup(&description.trigger.node_type)
                .expect("checked above");
            if entry.category != NodeCategory::Trigger {
                errors.push(
                    CompileIssue::new(
                        IssueCode::SchemaValidationError,
                        format!("`{}` is not a trigger type", description.trigger.node_type),
                    )
                    .for_node(description.trigger.id.as_str()),
                );
            }
        }
        errors
    }

    fn check_configs(&self, description: &WorkflowDescription) -> Vec<CompileIssue> {
        let mut errors = Vec::new();

        for node in &description.nodes {
            let violations = self
                .catalog
                .validate_config(&node.node_type, &node.config)
                .expect("node types were checked in the previous stage");
            for violation in violations {
                let location = if violation.path.is_empty() {
                    "config".to_string()
                } else {
                    format!("config.{}", violation.path)
                };
                errors.push(
                    CompileIssue::new(
                        IssueCode::NodeConfigValidationError,
                        format!("{location}: {}", violation.message),
                    )
                    .for_node(node.id.as_str()),
                );
            }
        }
        errors
    }

    fn check_semantics(&self, description: &WorkflowDescription) -> Vec<CompileIssue> {
        let mut errors = Vec::new();

        for edge in &description.edges {
            let (Some(source), Some(target)) = (
                description.node(&edge.source),
                description.node(&edge.target),
            ) else {
                continue; // endpoint existence was checked structurally
            };
            let source_entry = self.catalog.lookup(&source.node_type).expect("checked");
            let target_entry = self.catalog.lookup(&target.node_type).expect("checked");

            let outgoing_ok = source_entry
                .allowed_outgoing_types
                .as_ref()
                .is_none_or(|allowed| allowed.iter().any(|t| t == &target.node_type));
            let incoming_ok = target_entry
                .allowed_incoming_types
                .as_ref()
                .is_none_or(|allowed| allowed.iter().any(|t| t == &source.node_type));

            if !outgoing_ok || !incoming_ok {
                errors.push(
                    CompileIssue::new(
                        IssueCode::InvalidNodeConnection,
                        format!(
                            "`{}` may not connect to `{}`",
                            source.node_type, target.node_type
                        ),
                    )
                    .for_edge(edge.id.as_str()),
                );
            }
        }

        if description.trigger.node_type == types::USSD_SESSION_START {
            let has_end = description.nodes.iter().any(|node| {
                self.catalog
                    .lookup(&node.node_type)
                    .map(|entry| entry.ends_session)
                    .unwrap_or(false)
            });
            if !has_end {
                errors.push(CompileIssue::new(
                    IssueCode::UssdMissingSessionEnd,
                    "a USSD-triggered workflow must contain a session_end node",
                ));
            }
        }

        errors
    }

    fn build_graph(
        &self,
        description: &WorkflowDescription,
        execution_order: Vec<String>,
        warnings: &mut Vec<CompileIssue>,
    ) -> ExecutionGraph {
        let ordinals: HashMap<&str, usize> = execution_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut nodes = HashMap::new();
        for spec in &description.nodes {
            // Nodes outside the execution order cannot exist here: an
            // unreachable node fails stage 5.
            let ordinal = ordinals[spec.id.as_str()];
            let entry = self.catalog.lookup(&spec.node_type).expect("checked");

            let mut config = spec.config.clone();
            entry.config_schema.apply_defaults(&mut config);

            let retry = spec
                .retry
                .clone()
                .or_else(|| entry.default_retry.clone())
                .unwrap_or_default();
            let timeout = spec
                .timeout
                .or(entry.default_timeout)
                .unwrap_or(DEFAULT_NODE_TIMEOUT);

            let incoming = edge_refs(description, |e| e.target == spec.id);
            let outgoing = edge_refs(description, |e| e.source == spec.id);

            if outgoing.is_empty() && !entry.ends_session {
                warnings.push(
                    CompileIssue::new(
                        IssueCode::DeadEndNode,
                        format!("node `{}` has no outgoing edges", spec.id),
                    )
                    .for_node(spec.id.as_str()),
                );
            }

            nodes.insert(
                spec.id.clone(),
                ExecutionNode {
                    id: spec.id.clone(),
                    node_type: spec.node_type.clone(),
                    requires_session: entry.requires_session,
                    ends_session: entry.ends_session,
                    entry,
                    config,
                    retry,
                    timeout,
                    disabled: spec.disabled,
                    incoming,
                    outgoing,
                    ordinal,
                },
            );
        }

        // Longest path from the trigger, walking the topological order.
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut max_depth = 0;
        for id in &execution_order {
            let current = *depth.entry(id.as_str()).or_insert(0);
            let node = &nodes[id.as_str()];
            for edge in &node.outgoing {
                let target = depth.entry(edge.target.as_str()).or_insert(0);
                *target = (*target).max(current + 1);
                max_depth = max_depth.max(*target);
            }
        }

        let metadata = GraphMetadata {
            requires_session: nodes.values().any(|n| n.requires_session),
            has_session_end: nodes.values().any(|n| n.ends_session),
            max_depth,
            has_cycles: false,
        };

        ExecutionGraph {
            workflow_id: description.metadata.id,
            workflow_version: description.metadata.version,
            trigger_node: description.trigger.id.clone(),
            nodes,
            execution_order,
            metadata,
        }
    }
}

fn check_structure(description: &WorkflowDescription) -> Vec<CompileIssue> {
    let mut errors = Vec::new();

    if description.metadata.id.is_nil() {
        errors.push(CompileIssue::new(
            IssueCode::SchemaValidationError,
            "workflow id must be a non-nil UUID",
        ));
    }
    if description.metadata.version == 0 {
        errors.push(CompileIssue::new(
            IssueCode::SchemaValidationError,
            "workflow version must be a positive integer",
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for node in &description.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(
                CompileIssue::new(
                    IssueCode::DuplicateNodeId,
                    format!("node id `{}` appears more than once", node.id),
                )
                .for_node(node.id.as_str()),
            );
        }
    }

    match description.node(&description.trigger.id) {
        None => errors.push(
            CompileIssue::new(
                IssueCode::SchemaValidationError,
                format!(
                    "trigger node `{}` is missing from `nodes`",
                    description.trigger.id
                ),
            )
            .for_node(description.trigger.id.as_str()),
        ),
        Some(declared) if declared.node_type != description.trigger.node_type => errors.push(
            CompileIssue::new(
                IssueCode::SchemaValidationError,
                format!(
                    "trigger node `{}` is declared with a different type in `nodes`",
                    description.trigger.id
                ),
            )
            .for_node(description.trigger.id.as_str()),
        ),
        Some(_) => {}
    }

    for edge in &description.edges {
        for (side, node_id) in [("source", &edge.source), ("target", &edge.target)] {
            if !seen.contains(node_id.as_str()) {
                errors.push(
                    CompileIssue::new(
                        IssueCode::SchemaValidationError,
                        format!("edge `{}` {side} references unknown node `{node_id}`", edge.id),
                    )
                    .for_edge(edge.id.as_str()),
                );
            }
        }
        // An edge into the trigger can never be valid: downstream it would
        // always surface as a cycle or an unreachable source, so it is
        // reported here with its own code.
        if edge.target == description.trigger.id {
            errors.push(
                CompileIssue::new(
                    IssueCode::TriggerHasIncomingEdges,
                    format!("edge `{}` targets the trigger node", edge.id),
                )
                .for_edge(edge.id.as_str()),
            );
        }
    }

    errors
}

/// Build the directed graph and emit the reachable nodes in dependency
/// order (reversed DFS post-order). A back-edge means a cycle; a node
/// never discovered means it is unreachable from the trigger.
fn order_from_trigger(description: &WorkflowDescription) -> Result<Vec<String>, Vec<CompileIssue>> {
    let mut graph: DiGraph<&str, &str> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &description.nodes {
        let index = graph.add_node(node.id.as_str());
        indices.insert(node.id.as_str(), index);
    }
    for edge in &description.edges {
        graph.add_edge(
            indices[edge.source.as_str()],
            indices[edge.target.as_str()],
            edge.id.as_str(),
        );
    }

    let trigger = indices[description.trigger.id.as_str()];
    let mut finish_order: Vec<NodeIndex> = Vec::new();
    let mut cycle: Option<(NodeIndex, NodeIndex)> = None;

    depth_first_search(&graph, Some(trigger), |event| match event {
        DfsEvent::BackEdge(source, target) => {
            cycle = Some((source, target));
            Control::Break(())
        }
        DfsEvent::Finish(node, _) => {
            finish_order.push(node);
            Control::Continue
        }
        _ => Control::Continue,
    });

    if let Some((source, target)) = cycle {
        return Err(vec![CompileIssue::new(
            IssueCode::CycleDetected,
            format!(
                "cycle through edge `{}` -> `{}`",
                graph[source], graph[target]
            ),
        )]);
    }

    let discovered: HashSet<NodeIndex> = finish_order.iter().copied().collect();
    let unreachable: Vec<CompileIssue> = graph
        .node_indices()
        .filter(|index| !discovered.contains(index))
        .map(|index| {
            CompileIssue::new(
                IssueCode::UnreachableNode,
                format!("node `{}` is not reachable from the trigger", graph[index]),
            )
            .for_node(graph[index].to_string())
        })
        .collect();
    if !unreachable.is_empty() {
        return Err(unreachable);
    }

    finish_order.reverse();
    Ok(finish_order
        .into_iter()
        .map(|index| graph[index].to_string())
        .collect())
}

fn edge_refs(
    description: &WorkflowDescription,
    select: impl Fn(&crate::description::EdgeSpec) -> bool,
) -> Vec<EdgeRef> {
    description
        .edges
        .iter()
        .filter(|edge| select(edge))
        .map(|edge| EdgeRef {
            edge_id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            source_handle: edge.source_handle.clone(),
            target_handle: edge.target_handle.clone(),
        })
        .collect()
}
