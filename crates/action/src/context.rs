//! Per-node execution context handed to handlers.

use serde_json::{Map, Value};
use std::sync::Arc;
use tawi_core::{ExecutionId, WorkflowId};
use tawi_execution::{NodeError, error::codes};
use tawi_expression::Scope;
use tawi_session::{SessionRecord, SessionStore};
use tawi_workflow::ExecutionNode;
use tokio_util::sync::CancellationToken;

use tawi_core::Channel;

/// What a handler sees of the invocation it runs inside.
///
/// The engine assembles a fresh context per node: the scope already
/// layers context variables, the node's input, and the well-known keys
/// (`subscriber`, `message`, `session.*`, `node_<id>.*`).
#[derive(Clone)]
pub struct ActionContext {
    /// The invocation this node belongs to.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// Template scope for rendering the node's configuration.
    pub scope: Scope,
    /// Snapshot of the session at node start, when one is attached.
    pub session: Option<SessionRecord>,
    /// The session store, for state handlers.
    pub sessions: Arc<dyn SessionStore>,
    /// Cooperative cancellation signal.
    pub cancellation: CancellationToken,
}

impl ActionContext {
    /// Render the node's configuration against the scope.
    #[must_use]
    pub fn render_config(&self, node: &ExecutionNode) -> Map<String, Value> {
        tawi_expression::render_map(&node.config, &self.scope)
    }

    /// Render a single string against the scope.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        tawi_expression::render(template, &self.scope)
    }

    /// The attached session, or a `session_required` error.
    pub fn require_session(&self) -> Result<&SessionRecord, NodeError> {
        self.session.as_ref().ok_or_else(|| {
            NodeError::validation(codes::SESSION_REQUIRED, "this node requires an open session")
        })
    }

    /// The attached session, which must be on the voice channel.
    pub fn require_voice_session(&self) -> Result<&SessionRecord, NodeError> {
        let session = self.require_session()?;
        if session.channel != Channel::Voice {
            return Err(NodeError::validation(
                codes::VOICE_SESSION_REQUIRED,
                format!(
                    "this node requires a voice session, found {}",
                    session.channel
                ),
            ));
        }
        Ok(session)
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("execution_id", &self.execution_id)
            .field("workflow_id", &self.workflow_id)
            .field("session", &self.session.as_ref().map(|s| &s.session_id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tawi_session::InMemorySessionStore;

    fn context(session: Option<SessionRecord>) -> ActionContext {
        ActionContext {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            scope: Scope::new(),
            session,
            sessions: Arc::new(InMemorySessionStore::new()),
            cancellation: CancellationToken::new(),
        }
    }

    fn session(channel: Channel) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: "s1".into(),
            channel,
            subscriber: "+254700000001".into(),
            data: Map::new(),
            created_at: now,
            last_activity_at: now,
            expires_at: None,
            active: true,
        }
    }

    #[test]
    fn require_session_without_one() {
        let ctx = context(None);
        let err = ctx.require_session().unwrap_err();
        assert_eq!(err.code, codes::SESSION_REQUIRED);
    }

    #[test]
    fn require_voice_session_rejects_ussd() {
        let ctx = context(Some(session(Channel::Ussd)));
        let err = ctx.require_voice_session().unwrap_err();
        assert_eq!(err.code, codes::VOICE_SESSION_REQUIRED);
    }

    #[test]
    fn require_voice_session_accepts_voice() {
        let ctx = context(Some(session(Channel::Voice)));
        assert!(ctx.require_voice_session().is_ok());
    }
}
