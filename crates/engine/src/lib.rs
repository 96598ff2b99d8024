#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi Engine
//!
//! Walks a compiled [`ExecutionGraph`](tawi_workflow::ExecutionGraph) in
//! topological order, asking the dispatcher for each node's handler and
//! applying per-node retry and timeout, conditional branch gating,
//! merge-node joins, and the invocation-wide deadline.
//!
//! One engine serves many concurrent invocations; each `execute` call
//! owns its context and shares only the session store and the journal.

pub mod context;
pub mod engine;
pub mod options;

pub use context::ExecutionContext;
pub use engine::Engine;
pub use options::{ExecuteOptions, ExecutionReport};
