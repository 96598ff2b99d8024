//! Built-in flow-control handlers.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tawi_execution::{NodeError, error::codes};
use tawi_expression::evaluate_predicate;
use tawi_workflow::ExecutionNode;

use crate::context::ActionContext;
use crate::handler::{ActionHandler, ActionOutcome};

/// `condition`: routes its input to the `true` or `false` handle.
#[derive(Debug, Default)]
pub struct ConditionHandler;

#[async_trait]
impl ActionHandler for ConditionHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let expression = required_str(node, "expression")?;
        let branch = evaluate_predicate(expression, &ctx.scope);
        tracing::debug!(node = %node.id, expression, branch, "condition evaluated");
        Ok(ActionOutcome::on(
            if branch { "true" } else { "false" },
            input.clone(),
        ))
    }
}

/// `switch`: routes to the case matching the rendered value, else
/// `default`.
#[derive(Debug, Default)]
pub struct SwitchHandler;

#[async_trait]
impl ActionHandler for SwitchHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let value = ctx.render(required_str(node, "value")?);
        let cases = node
            .config
            .get("cases")
            .and_then(Value::as_array)
            .ok_or_else(|| config_error(node, "cases must be an array"))?;

        let matched = cases
            .iter()
            .filter_map(|case| case.get("value").and_then(Value::as_str))
            .find(|case_value| ctx.render(case_value) == value);

        Ok(ActionOutcome::on(
            matched.unwrap_or("default"),
            input.clone(),
        ))
    }
}

/// `delay`: passes its input through after a pause.
#[derive(Debug, Default)]
pub struct DelayHandler;

#[async_trait]
impl ActionHandler for DelayHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let duration_ms = node
            .config
            .get("duration_ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| config_error(node, "duration_ms must be a non-negative integer"))?;

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(duration_ms)) => {
                Ok(ActionOutcome::success(input.clone()))
            }
            () = ctx.cancellation.cancelled() => {
                Err(NodeError::permanent("cancelled", "delay interrupted by cancellation"))
            }
        }
    }
}

/// `retry`: the policy wrapper node. Retries themselves are a per-node
/// policy applied by the engine; this node re-exposes its input on the
/// `success` handle so descriptions can branch on `max_retries` from
/// handler-reported exhaustion.
#[derive(Debug, Default)]
pub struct RetryHandler;

#[async_trait]
impl ActionHandler for RetryHandler {
    async fn execute(
        &self,
        _node: &ExecutionNode,
        _ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        Ok(ActionOutcome::success(input.clone()))
    }
}

/// `merge`: the engine coordinates the join and pre-combines predecessor
/// outputs per the configured strategy; the handler passes the combined
/// input through.
#[derive(Debug, Default)]
pub struct MergeHandler;

#[async_trait]
impl ActionHandler for MergeHandler {
    async fn execute(
        &self,
        _node: &ExecutionNode,
        _ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        Ok(ActionOutcome::success(input.clone()))
    }
}

/// `rate_limit`: counts invocations per key in a shared window table and
/// routes over-limit traffic to the `limited` handle.
#[derive(Debug, Default)]
pub struct RateLimitHandler {
    windows: DashMap<String, WindowState>,
}

#[derive(Debug)]
enum WindowState {
    Fixed { started: Instant, count: u64 },
    Sliding(VecDeque<Instant>),
}

impl RateLimitHandler {
    /// A handler with an empty window table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn admit(&self, key: String, sliding: bool, max_requests: u64, window: Duration) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key).or_insert_with(|| {
            if sliding {
                WindowState::Sliding(VecDeque::new())
            } else {
                WindowState::Fixed {
                    started: now,
                    count: 0,
                }
            }
        });

        match entry.value_mut() {
            WindowState::Fixed { started, count } => {
                if now.duration_since(*started) >= window {
                    *started = now;
                    *count = 0;
                }
                *count += 1;
                *count <= max_requests
            }
            WindowState::Sliding(hits) => {
                while hits
                    .front()
                    .is_some_and(|hit| now.duration_since(*hit) >= window)
                {
                    hits.pop_front();
                }
                hits.push_back(now);
                hits.len() as u64 <= max_requests
            }
        }
    }
}

#[async_trait]
impl ActionHandler for RateLimitHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let max_requests = node
            .config
            .get("max_requests")
            .and_then(Value::as_u64)
            .ok_or_else(|| config_error(node, "max_requests must be a positive integer"))?;
        let window_ms = node
            .config
            .get("window_ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| config_error(node, "window_ms must be a positive integer"))?;
        let sliding = node.config.get("strategy").and_then(Value::as_str) == Some("sliding");

        let key = node
            .config
            .get("key")
            .and_then(Value::as_str)
            .map(|k| ctx.render(k))
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| format!("{}:{}", ctx.workflow_id, node.id));

        if self.admit(key, sliding, max_requests, Duration::from_millis(window_ms)) {
            Ok(ActionOutcome::success(input.clone()))
        } else {
            let mut output = input.clone();
            output.insert("rate_limited".into(), Value::Bool(true));
            Ok(ActionOutcome::on("limited", output))
        }
    }
}

fn required_str<'a>(node: &'a ExecutionNode, field: &str) -> Result<&'a str, NodeError> {
    node.config
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| config_error(node, format!("{field} must be a string")))
}

fn config_error(node: &ExecutionNode, message: impl Into<String>) -> NodeError {
    NodeError::validation(
        codes::NODE_EXECUTION_ERROR,
        format!("node `{}`: {}", node.id, message.into()),
    )
}
