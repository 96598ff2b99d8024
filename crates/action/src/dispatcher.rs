//! The handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use tawi_catalog::builtin::types;

use crate::handler::ActionHandler;
use crate::http::HttpRequestHandler;
use crate::logic::{
    ConditionHandler, DelayHandler, MergeHandler, RateLimitHandler, RetryHandler, SwitchHandler,
};
use crate::provider::{
    CollectDtmfHandler, InitiateCallHandler, PlayIvrHandler, RefundPaymentHandler,
    RequestPaymentHandler, SendSmsHandler, SendUssdResponseHandler,
};
use crate::state::{SessionEndHandler, SessionReadHandler, SessionWriteHandler};
use crate::telecom::TelecomClient;

/// Error type for dispatcher operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A handler was registered twice for one node type.
    #[error("a handler for `{0}` is already registered")]
    AlreadyRegistered(String),

    /// No handler is registered for the node type.
    #[error("no handler registered for node type `{0}`")]
    NotFound(String),
}

/// Maps node types to their handlers.
///
/// The engine never dispatches on node type itself; it asks this
/// registry. Tests swap in fakes the same way the production wiring
/// installs the built-ins.
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl Dispatcher {
    /// An empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A dispatcher with every built-in handler installed, wired to the
    /// given provider client.
    #[must_use]
    pub fn builtin(client: Arc<dyn TelecomClient>) -> Self {
        let mut dispatcher = Self::new();
        let register = |d: &mut Self, ty: &str, handler: Arc<dyn ActionHandler>| {
            d.register(ty, handler)
                .expect("built-in handlers are registered once");
        };

        register(&mut dispatcher, types::CONDITION, Arc::new(ConditionHandler));
        register(&mut dispatcher, types::SWITCH, Arc::new(SwitchHandler));
        register(&mut dispatcher, types::DELAY, Arc::new(DelayHandler));
        register(&mut dispatcher, types::RETRY, Arc::new(RetryHandler));
        register(
            &mut dispatcher,
            types::RATE_LIMIT,
            Arc::new(RateLimitHandler::new()),
        );
        register(&mut dispatcher, types::MERGE, Arc::new(MergeHandler));

        register(
            &mut dispatcher,
            types::SESSION_READ,
            Arc::new(SessionReadHandler),
        );
        register(
            &mut dispatcher,
            types::SESSION_WRITE,
            Arc::new(SessionWriteHandler),
        );
        register(
            &mut dispatcher,
            types::SESSION_END,
            Arc::new(SessionEndHandler),
        );

        register(
            &mut dispatcher,
            types::SEND_SMS,
            Arc::new(SendSmsHandler::new(client.clone())),
        );
        register(
            &mut dispatcher,
            types::SEND_USSD_RESPONSE,
            Arc::new(SendUssdResponseHandler::new(client.clone())),
        );
        register(
            &mut dispatcher,
            types::INITIATE_CALL,
            Arc::new(InitiateCallHandler::new(client.clone())),
        );
        register(
            &mut dispatcher,
            types::PLAY_IVR,
            Arc::new(PlayIvrHandler::new(client.clone())),
        );
        register(
            &mut dispatcher,
            types::COLLECT_DTMF,
            Arc::new(CollectDtmfHandler::new(client.clone())),
        );
        register(
            &mut dispatcher,
            types::REQUEST_PAYMENT,
            Arc::new(RequestPaymentHandler::new(client.clone())),
        );
        register(
            &mut dispatcher,
            types::REFUND_PAYMENT,
            Arc::new(RefundPaymentHandler::new(client)),
        );
        register(
            &mut dispatcher,
            types::HTTP_REQUEST,
            Arc::new(HttpRequestHandler::default()),
        );

        dispatcher
    }

    /// Register a handler. Fails if the type already has one.
    pub fn register(
        &mut self,
        node_type: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), DispatchError> {
        let node_type = node_type.into();
        if self.handlers.contains_key(&node_type) {
            return Err(DispatchError::AlreadyRegistered(node_type));
        }
        self.handlers.insert(node_type, handler);
        Ok(())
    }

    /// Register or replace a handler (tests swap fakes in).
    pub fn register_or_replace(
        &mut self,
        node_type: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) {
        self.handlers.insert(node_type.into(), handler);
    }

    /// Look up the handler for a node type.
    pub fn get(&self, node_type: &str) -> Result<Arc<dyn ActionHandler>, DispatchError> {
        self.handlers
            .get(node_type)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(node_type.to_string()))
    }

    /// Whether a handler exists for a node type.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the dispatcher is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut node_types: Vec<_> = self.handlers.keys().collect();
        node_types.sort();
        f.debug_struct("Dispatcher")
            .field("count", &self.handlers.len())
            .field("types", &node_types)
            .finish()
    }
}
