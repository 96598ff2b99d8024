//! The graph walker.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use tawi_action::{ActionContext, ActionOutcome, Dispatcher};
use tawi_core::ExecutionId;
use tawi_execution::{
    ExecutionJournal, ExecutionRecord, ExecutionState, NodeError, NodeExecutionResult,
    error::codes,
};
use tawi_expression::Scope;
use tawi_session::{SessionRecord, SessionStore};
use tawi_workflow::{EdgeRef, ExecutionGraph, ExecutionNode};

use crate::context::ExecutionContext;
use crate::options::{ExecuteOptions, ExecutionReport};

/// Drives compiled graphs to completion.
///
/// Nodes execute sequentially in `execution_order`; concurrency lives
/// across invocations, which share only the session store and the
/// journal.
pub struct Engine {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<dyn SessionStore>,
    journal: Arc<dyn ExecutionJournal>,
}

/// Book-keeping for one walk of the graph.
#[derive(Default)]
struct Walk {
    /// Output of every successfully executed node (the trigger's output
    /// is its payload).
    outputs: HashMap<String, Map<String, Value>>,
    /// Edges suppressed by conditional routing.
    suppressed: HashSet<String>,
    /// Nodes that did not run (disabled or on an unselected branch).
    skipped: HashSet<String>,
    /// Every attempt of every node, in execution order.
    results: Vec<NodeExecutionResult>,
}

/// What one attempt produced.
enum Attempt {
    Done(ActionOutcome),
    Failed(NodeError),
    TimedOut,
    Cancelled,
}

impl Engine {
    /// Create an engine over its collaborators.
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<dyn SessionStore>,
        journal: Arc<dyn ExecutionJournal>,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            journal,
        }
    }

    /// The session store this engine runs against.
    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    /// Execute a compiled graph against a trigger payload.
    pub async fn execute(
        &self,
        graph: Arc<ExecutionGraph>,
        trigger_payload: Map<String, Value>,
        session_id: Option<String>,
        options: ExecuteOptions,
    ) -> ExecutionReport {
        let execution_id = ExecutionId::v4();
        let started = Instant::now();
        let deadline = started + Duration::from_millis(options.max_execution_ms);

        self.journal
            .log_start(execution_id, graph.workflow_id, graph.workflow_version)
            .await;
        tracing::info!(
            execution_id = %execution_id,
            workflow_id = %graph.workflow_id,
            version = graph.workflow_version,
            "execution started"
        );

        let mut ctx = ExecutionContext::new(
            execution_id,
            graph.workflow_id,
            graph.workflow_version,
            trigger_payload,
            session_id,
        );
        let mut walk = Walk::default();

        let (state, error) = match self.check_session(&graph, &ctx).await {
            Err(error) => (ExecutionState::Failed, Some(error)),
            Ok(()) => {
                walk.outputs
                    .insert(graph.trigger_node.clone(), ctx.trigger_payload.clone());
                self.run(&graph, &mut ctx, &mut walk, &options, deadline).await
            }
        };

        let duration = started.elapsed();
        let output = (state == ExecutionState::Completed).then(|| ctx.variables.clone());

        let mut record = ExecutionRecord::started(execution_id, graph.workflow_id, graph.workflow_version);
        record.started_at = ctx.started_at;
        record.node_results = walk.results.clone();
        record.output = output.clone();
        record.error = error.clone();
        record.finish(state);
        self.journal.store(record).await;

        tracing::info!(execution_id = %execution_id, %state, ?duration, "execution finished");
        ExecutionReport {
            execution_id,
            status: state,
            output,
            error,
            node_results: walk.results,
            duration,
            session_id: ctx.session_id,
        }
    }

    /// The engine accepts a missing session only when no node needs one.
    async fn check_session(
        &self,
        graph: &ExecutionGraph,
        ctx: &ExecutionContext,
    ) -> Result<(), NodeError> {
        if !graph.metadata.requires_session {
            return Ok(());
        }
        match &ctx.session_id {
            None => Err(NodeError::validation(
                codes::SESSION_REQUIRED,
                "this workflow requires a session and none was supplied",
            )),
            Some(session_id) => match self.sessions.get(session_id).await {
                None => Err(NodeError::permanent(
                    codes::SESSION_NOT_FOUND,
                    format!("session `{session_id}` is not active"),
                )),
                Some(_) => {
                    self.sessions.touch(session_id).await;
                    Ok(())
                }
            },
        }
    }

    async fn run(
        &self,
        graph: &ExecutionGraph,
        ctx: &mut ExecutionContext,
        walk: &mut Walk,
        options: &ExecuteOptions,
        deadline: Instant,
    ) -> (ExecutionState, Option<NodeError>) {
        for node_id in &graph.execution_order {
            if *node_id == graph.trigger_node {
                continue;
            }
            let node = graph
                .node(node_id)
                .expect("execution order references known nodes");

            if options.cancellation.is_cancelled() {
                return (ExecutionState::Cancelled, None);
            }
            if Instant::now() >= deadline {
                return (
                    ExecutionState::Failed,
                    Some(execution_timeout(options.max_execution_ms)),
                );
            }

            // Gating: disabled nodes are recorded and their branch dies.
            if node.disabled {
                self.record(walk, ctx.execution_id, NodeExecutionResult::skipped(node_id.as_str(), "disabled"))
                    .await;
                walk.skipped.insert(node_id.clone());
                continue;
            }

            // Gating: a node whose every incoming edge is suppressed sits
            // on an unselected branch.
            let active: Vec<&EdgeRef> = node
                .incoming
                .iter()
                .filter(|edge| {
                    !walk.suppressed.contains(&edge.edge_id)
                        && !walk.skipped.contains(&edge.source)
                })
                .collect();
            if !node.incoming.is_empty() && active.is_empty() {
                self.record(
                    walk,
                    ctx.execution_id,
                    NodeExecutionResult::skipped(node_id.as_str(), "unselected_branch"),
                )
                .await;
                walk.skipped.insert(node_id.clone());
                continue;
            }

            let input = assemble_input(node, &active, &walk.outputs);
            let session = self.session_snapshot(ctx).await;
            let action_ctx = ActionContext {
                execution_id: ctx.execution_id,
                workflow_id: ctx.workflow_id,
                scope: node_scope(ctx, &input, session.as_ref()),
                session,
                sessions: self.sessions.clone(),
                cancellation: options.cancellation.clone(),
            };

            match self
                .run_with_retries(node, &action_ctx, &input, walk, ctx, options, deadline)
                .await
            {
                NodeVerdict::Completed(outcome) => {
                    walk.outputs.insert(node_id.clone(), outcome.output.clone());
                    ctx.absorb_output(node_id, &outcome.output);
                    route(node, outcome.handle.as_deref(), &mut walk.suppressed);

                    if node.ends_session {
                        tracing::debug!(node = %node.id, "session-ending node reached, stopping walk");
                        break;
                    }
                }
                NodeVerdict::Routed => {
                    // The error went down the node's `error` branch;
                    // everything else from this node is suppressed.
                }
                NodeVerdict::Abort(state, error) => return (state, error),
            }
        }

        (ExecutionState::Completed, None)
    }

    /// Run one node through its retry policy.
    #[allow(clippy::too_many_arguments)]
    async fn run_with_retries(
        &self,
        node: &ExecutionNode,
        action_ctx: &ActionContext,
        input: &Map<String, Value>,
        walk: &mut Walk,
        ctx: &ExecutionContext,
        options: &ExecuteOptions,
        deadline: Instant,
    ) -> NodeVerdict {
        let handler = match self.dispatcher.get(&node.node_type) {
            Ok(handler) => handler,
            Err(e) => {
                let error = NodeError::permanent(codes::NODE_EXECUTION_ERROR, e.to_string());
                self.record(
                    walk,
                    ctx.execution_id,
                    NodeExecutionResult::error(node.id.as_str(), error.clone(), 0, 0),
                )
                .await;
                return NodeVerdict::Abort(ExecutionState::Failed, Some(error));
            }
        };

        let mut attempt: u32 = 0;
        loop {
            if Instant::now() >= deadline {
                return NodeVerdict::Abort(
                    ExecutionState::Failed,
                    Some(execution_timeout(options.max_execution_ms)),
                );
            }

            let window = node
                .timeout
                .min(deadline.saturating_duration_since(Instant::now()));
            let attempt_started = Instant::now();
            let outcome = tokio::select! {
                result = tokio::time::timeout(window, handler.execute(node, action_ctx, input)) => {
                    match result {
                        Ok(Ok(outcome)) => Attempt::Done(outcome),
                        Ok(Err(error)) => Attempt::Failed(error),
                        Err(_) => Attempt::TimedOut,
                    }
                }
                () = options.cancellation.cancelled() => Attempt::Cancelled,
            };
            let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

            let error = match outcome {
                Attempt::Done(outcome) => {
                    self.record(
                        walk,
                        ctx.execution_id,
                        NodeExecutionResult::success(
                            node.id.as_str(),
                            outcome.output.clone(),
                            elapsed_ms,
                            attempt,
                        ),
                    )
                    .await;
                    return NodeVerdict::Completed(outcome);
                }
                Attempt::Cancelled => {
                    let error = NodeError::permanent("cancelled", "execution cancelled");
                    self.record(
                        walk,
                        ctx.execution_id,
                        NodeExecutionResult::error(node.id.as_str(), error, elapsed_ms, attempt),
                    )
                    .await;
                    return NodeVerdict::Abort(ExecutionState::Cancelled, None);
                }
                Attempt::TimedOut => {
                    let error = NodeError::transient(
                        codes::NODE_TIMEOUT,
                        format!("node `{}` exceeded its {:?} timeout", node.id, node.timeout),
                    );
                    self.record(
                        walk,
                        ctx.execution_id,
                        NodeExecutionResult::timeout(node.id.as_str(), error.clone(), elapsed_ms, attempt),
                    )
                    .await;
                    error
                }
                Attempt::Failed(error) => {
                    self.record(
                        walk,
                        ctx.execution_id,
                        NodeExecutionResult::error(node.id.as_str(), error.clone(), elapsed_ms, attempt),
                    )
                    .await;
                    error
                }
            };

            // Retry decision.
            let eligible = options.enable_retries
                && attempt + 1 < node.retry.max_attempts
                && !matches!(
                    error.kind,
                    tawi_execution::NodeErrorKind::Permanent
                        | tawi_execution::NodeErrorKind::Validation
                )
                && node.retry.allows(&error.code, error.is_retryable_by_default());

            if eligible {
                attempt += 1;
                let backoff = node.retry.delay_before(attempt);
                tracing::debug!(node = %node.id, attempt, ?backoff, "retrying node");
                let capped = backoff.min(deadline.saturating_duration_since(Instant::now()));
                tokio::select! {
                    () = tokio::time::sleep(capped) => {}
                    () = options.cancellation.cancelled() => {
                        return NodeVerdict::Abort(ExecutionState::Cancelled, None);
                    }
                }
                continue;
            }

            // Unrecovered: an `error` branch, when wired, handles it.
            if has_error_branch(node) {
                let mut output = Map::new();
                output.insert("error".into(), serde_json::to_value(&error).unwrap_or(Value::Null));
                walk.outputs.insert(node.id.clone(), output);
                suppress_except(node, "error", &mut walk.suppressed);
                return NodeVerdict::Routed;
            }
            return NodeVerdict::Abort(ExecutionState::Failed, Some(error));
        }
    }

    async fn record(&self, walk: &mut Walk, execution_id: ExecutionId, result: NodeExecutionResult) {
        self.journal.log_node(execution_id, result.clone()).await;
        walk.results.push(result);
    }

    async fn session_snapshot(&self, ctx: &ExecutionContext) -> Option<SessionRecord> {
        match &ctx.session_id {
            Some(session_id) => self.sessions.get(session_id).await,
            None => None,
        }
    }
}

/// What the walk does after a node is dealt with.
enum NodeVerdict {
    /// The node produced an outcome; propagate and continue.
    Completed(ActionOutcome),
    /// The node failed but its `error` branch absorbs the failure.
    Routed,
    /// Stop the walk with a terminal state.
    Abort(ExecutionState, Option<NodeError>),
}

fn execution_timeout(budget_ms: u64) -> NodeError {
    NodeError::transient(
        codes::EXECUTION_TIMEOUT,
        format!("invocation exceeded its {budget_ms} ms budget"),
    )
}

/// Merge the outputs feeding a node, one edge at a time.
///
/// An edge with a `source_handle` projects only that key from the
/// source's output; handles that label pure routing (`true`, `false`, a
/// switch case) have no matching output key, and the whole output flows
/// through. Merge nodes combine per their configured strategy.
fn assemble_input(
    node: &ExecutionNode,
    active: &[&EdgeRef],
    outputs: &HashMap<String, Map<String, Value>>,
) -> Map<String, Value> {
    let per_edge: Vec<Map<String, Value>> = active
        .iter()
        .map(|edge| {
            let source = outputs.get(&edge.source).cloned().unwrap_or_default();
            let projected = edge.source_handle.as_ref().and_then(|handle| {
                source.get(handle).map(|value| {
                    let mut map = Map::new();
                    map.insert(handle.clone(), value.clone());
                    map
                })
            });
            projected.unwrap_or(source)
        })
        .collect();

    if node.entry.allows_multiple_inputs {
        let strategy = node
            .config
            .get("strategy")
            .and_then(Value::as_str)
            .unwrap_or("merge");
        return combine(per_edge, strategy);
    }
    combine(per_edge, "merge")
}

fn combine(per_edge: Vec<Map<String, Value>>, strategy: &str) -> Map<String, Value> {
    match strategy {
        "first" => per_edge.into_iter().next().unwrap_or_default(),
        "last" => per_edge.into_iter().next_back().unwrap_or_default(),
        "all" => {
            let mut combined = Map::new();
            combined.insert(
                "inputs".into(),
                Value::Array(per_edge.into_iter().map(Value::Object).collect()),
            );
            combined
        }
        _ => {
            let mut combined = Map::new();
            for map in per_edge {
                for (key, value) in map {
                    combined.insert(key, value);
                }
            }
            combined
        }
    }
}

/// Compose the template scope for one node: context variables, overlaid
/// by the node input, overlaid with the well-known `session` view.
fn node_scope(
    ctx: &ExecutionContext,
    input: &Map<String, Value>,
    session: Option<&SessionRecord>,
) -> Scope {
    let mut scope = Scope::from_map(ctx.variables.clone());
    scope.overlay(input);
    if let Some(record) = session {
        scope.set(
            "session",
            serde_json::json!({
                "session_id": record.session_id,
                "subscriber": record.subscriber,
                "channel": record.channel,
                "data": record.data,
            }),
        );
    }
    scope
}

/// Suppress outgoing edges that do not match the chosen handle. Edges
/// without a `source_handle` are unconditional and always survive.
fn route(node: &ExecutionNode, chosen: Option<&str>, suppressed: &mut HashSet<String>) {
    let Some(chosen) = chosen else {
        return;
    };
    for edge in &node.outgoing {
        if let Some(handle) = &edge.source_handle {
            if handle != chosen {
                suppressed.insert(edge.edge_id.clone());
            }
        }
    }
}

fn has_error_branch(node: &ExecutionNode) -> bool {
    node.outgoing
        .iter()
        .any(|edge| edge.source_handle.as_deref() == Some("error"))
}

fn suppress_except(node: &ExecutionNode, keep: &str, suppressed: &mut HashSet<String>) {
    for edge in &node.outgoing {
        if edge.source_handle.as_deref() != Some(keep) {
            suppressed.insert(edge.edge_id.clone());
        }
    }
}
