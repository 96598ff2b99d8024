//! The runtime bundle injected into every handler.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use tawi_action::{Dispatcher, TelecomClient};
use tawi_catalog::{NodeCatalog, builtin_catalog};
use tawi_core::{Channel, WorkflowId};
use tawi_engine::Engine;
use tawi_execution::{ExecutionJournal, InMemoryJournal};
use tawi_session::{InMemorySessionStore, SessionStore};
use tawi_workflow::{
    CompileFailure, CompileIssue, Compiler, ExecutionGraph, WorkflowDescription,
};

/// Shared handle to the runtime.
pub type SharedRuntime = Arc<Runtime>;

/// Everything the entry points need, constructed once in the binary.
pub struct Runtime {
    /// The node catalog snapshot.
    pub catalog: Arc<NodeCatalog>,
    /// The compiler over that snapshot.
    pub compiler: Compiler,
    /// The execution engine.
    pub engine: Engine,
    /// The session store shared with the engine.
    pub sessions: Arc<dyn SessionStore>,
    /// The execution journal shared with the engine.
    pub journal: Arc<dyn ExecutionJournal>,
    /// Workflows seen by this process, addressable by the scheduler.
    pub workflows: DashMap<WorkflowId, WorkflowDescription>,
    /// Session TTL applied to sessions the entry points open.
    pub session_ttl: Option<Duration>,
    /// Compiled graphs keyed by `(workflow_id, version)`. Versions are
    /// monotonic, so a cached entry never goes stale.
    graph_cache: DashMap<(WorkflowId, u32), Arc<ExecutionGraph>>,
}

impl Runtime {
    /// Assemble a runtime over a provider client, with in-memory stores.
    #[must_use]
    pub fn new(telecom: Arc<dyn TelecomClient>, session_ttl: Option<Duration>) -> SharedRuntime {
        let catalog = Arc::new(builtin_catalog());
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let journal: Arc<dyn ExecutionJournal> = Arc::new(InMemoryJournal::new());
        let dispatcher = Arc::new(Dispatcher::builtin(telecom));

        Arc::new(Self {
            compiler: Compiler::new(catalog.clone()),
            engine: Engine::new(dispatcher, sessions.clone(), journal.clone()),
            catalog,
            sessions,
            journal,
            workflows: DashMap::new(),
            session_ttl,
            graph_cache: DashMap::new(),
        })
    }

    /// Compile a description, reusing the cache when the same workflow
    /// version was compiled before.
    pub fn compile_cached(
        &self,
        description: &WorkflowDescription,
    ) -> Result<(Arc<ExecutionGraph>, Vec<CompileIssue>), CompileFailure> {
        let key = (description.metadata.id, description.metadata.version);
        if let Some(graph) = self.graph_cache.get(&key) {
            return Ok((graph.clone(), vec![]));
        }

        let compiled = self.compiler.compile(description)?;
        let graph = Arc::new(compiled.graph);
        self.graph_cache.insert(key, graph.clone());
        Ok((graph, compiled.warnings))
    }

    /// Remember a workflow so the scheduler can fire it.
    pub fn remember_workflow(&self, description: &WorkflowDescription) {
        self.workflows
            .insert(description.metadata.id, description.clone());
    }

    /// Number of cached graphs (diagnostics).
    #[must_use]
    pub fn cached_graphs(&self) -> usize {
        self.graph_cache.len()
    }
}

/// The session channel implied by a trigger type.
#[must_use]
pub fn trigger_channel(trigger_type: &str) -> Channel {
    match trigger_type {
        "incoming_call" => Channel::Voice,
        "payment_callback" => Channel::Payment,
        "sms_received" => Channel::Sms,
        _ => Channel::Ussd,
    }
}
