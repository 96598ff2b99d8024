//! Built-in session state handlers.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tawi_execution::{NodeError, error::codes};
use tawi_session::SessionStore;
use tawi_workflow::ExecutionNode;

use crate::context::ActionContext;
use crate::handler::{ActionHandler, ActionOutcome};

/// `session_read`: projects keys from the session data into the output.
#[derive(Debug, Default)]
pub struct SessionReadHandler;

#[async_trait]
impl ActionHandler for SessionReadHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let session_id = ctx.require_session()?.session_id.clone();
        let record = ctx.sessions.get(&session_id).await.ok_or_else(|| {
            NodeError::permanent(codes::SESSION_NOT_FOUND, format!("session `{session_id}`"))
        })?;

        let output = match node.config.get("keys").and_then(Value::as_array) {
            Some(keys) => keys
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|key| record.data.get(key).map(|v| (key.to_string(), v.clone())))
                .collect(),
            None => record.data.clone(),
        };
        Ok(ActionOutcome::success(output))
    }
}

/// `session_write`: renders the configured values and writes them into
/// the session data. `merge=false` replaces the data wholesale.
#[derive(Debug, Default)]
pub struct SessionWriteHandler;

#[async_trait]
impl ActionHandler for SessionWriteHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let session_id = ctx.require_session()?.session_id.clone();

        let data = node
            .config
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                NodeError::validation(
                    codes::NODE_EXECUTION_ERROR,
                    format!("node `{}`: data must be an object", node.id),
                )
            })?;
        let rendered = tawi_expression::render_map(data, &ctx.scope);
        let merge = node
            .config
            .get("merge")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let result = if merge {
            ctx.sessions.update_data(&session_id, rendered.clone()).await
        } else {
            ctx.sessions.replace_data(&session_id, rendered.clone()).await
        };
        result.map_err(|e| NodeError::permanent(e.code(), e.to_string()))?;

        Ok(ActionOutcome::success(rendered))
    }
}

/// `session_end`: marks the session inactive. The engine stops the walk
/// after this node (`ends_session` on the catalog entry).
#[derive(Debug, Default)]
pub struct SessionEndHandler;

#[async_trait]
impl ActionHandler for SessionEndHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let session_id = ctx.require_session()?.session_id.clone();
        ctx.sessions.end(&session_id).await;
        tracing::debug!(session_id, "session ended");

        let mut output = Map::new();
        output.insert("ended".into(), Value::Bool(true));
        if let Some(message) = node.config.get("message").and_then(Value::as_str) {
            output.insert("message".into(), Value::String(ctx.render(message)));
        }
        Ok(ActionOutcome::terminal(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tawi_catalog::builtin_catalog;
    use tawi_core::{Channel, ExecutionId, WorkflowId};
    use tawi_expression::Scope;
    use tawi_session::{InMemorySessionStore, NewSession, SessionStore};
    use tokio_util::sync::CancellationToken;

    fn test_node(node_type: &str, config: Value) -> ExecutionNode {
        let entry = builtin_catalog().lookup(node_type).unwrap();
        let config = match config {
            Value::Object(map) => map,
            _ => panic!("config must be an object"),
        };
        ExecutionNode {
            id: format!("{node_type}-1"),
            node_type: node_type.into(),
            requires_session: entry.requires_session,
            ends_session: entry.ends_session,
            entry,
            config,
            retry: tawi_catalog::RetryPolicy::none(),
            timeout: Duration::from_secs(30),
            disabled: false,
            incoming: vec![],
            outgoing: vec![],
            ordinal: 1,
        }
    }

    async fn context_with_session(
        scope_value: Value,
    ) -> (ActionContext, Arc<InMemorySessionStore>) {
        let sessions = Arc::new(InMemorySessionStore::new());
        let record = sessions
            .create(NewSession::new(Channel::Ussd, "+254700000002", None).with_id("s1"))
            .await
            .unwrap();
        let scope = match scope_value {
            Value::Object(map) => Scope::from_map(map),
            _ => panic!("scope must be an object"),
        };
        let ctx = ActionContext {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            scope,
            session: Some(record),
            sessions: sessions.clone(),
            cancellation: CancellationToken::new(),
        };
        (ctx, sessions)
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let (ctx, sessions) = context_with_session(json!({"step": "1"})).await;

        let write = test_node(
            "session_write",
            json!({"data": {"step": "{{step}}"}, "merge": true}),
        );
        let outcome = SessionWriteHandler
            .execute(&write, &ctx, &Map::new())
            .await
            .unwrap();
        assert_eq!(outcome.output["step"], json!("1"));

        let read = test_node("session_read", json!({"keys": ["step"]}));
        let outcome = SessionReadHandler
            .execute(&read, &ctx, &Map::new())
            .await
            .unwrap();
        assert_eq!(outcome.output["step"], json!("1"));

        let stored = sessions.get("s1").await.unwrap();
        assert_eq!(stored.data["step"], json!("1"));
    }

    #[tokio::test]
    async fn read_without_keys_returns_all_data() {
        let (ctx, sessions) = context_with_session(json!({})).await;
        let mut data = Map::new();
        data.insert("a".into(), json!(1));
        data.insert("b".into(), json!(2));
        sessions.update_data("s1", data).await.unwrap();

        let read = test_node("session_read", json!({}));
        let outcome = SessionReadHandler
            .execute(&read, &ctx, &Map::new())
            .await
            .unwrap();
        assert_eq!(outcome.output.len(), 2);
    }

    #[tokio::test]
    async fn write_with_merge_false_replaces() {
        let (ctx, sessions) = context_with_session(json!({})).await;
        let mut data = Map::new();
        data.insert("old".into(), json!("value"));
        sessions.update_data("s1", data).await.unwrap();

        let write = test_node(
            "session_write",
            json!({"data": {"fresh": "yes"}, "merge": false}),
        );
        SessionWriteHandler
            .execute(&write, &ctx, &Map::new())
            .await
            .unwrap();

        let stored = sessions.get("s1").await.unwrap();
        assert!(stored.data.get("old").is_none());
        assert_eq!(stored.data["fresh"], json!("yes"));
    }

    #[tokio::test]
    async fn end_marks_session_inactive() {
        let (ctx, sessions) = context_with_session(json!({})).await;
        let end = test_node("session_end", json!({"message": "bye {{name}}"}));

        let outcome = SessionEndHandler
            .execute(&end, &ctx, &Map::new())
            .await
            .unwrap();
        assert!(outcome.handle.is_none());
        assert_eq!(outcome.output["ended"], json!(true));

        assert!(sessions.get("s1").await.is_none());
        assert!(
            sessions
                .find_active("+254700000002", Channel::Ussd)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn handlers_require_a_session() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let ctx = ActionContext {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            scope: Scope::new(),
            session: None,
            sessions,
            cancellation: CancellationToken::new(),
        };

        let read = test_node("session_read", json!({}));
        let err = SessionReadHandler
            .execute(&read, &ctx, &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::SESSION_REQUIRED);
    }
}
