#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi Workflow
//!
//! The user-facing workflow description and the compiler that turns it
//! into a validated, topologically ordered [`ExecutionGraph`].
//!
//! Compilation is pure over the description and a catalog snapshot, so
//! compiled graphs are safe to cache by `(workflow_id, version)` and to
//! share across concurrent invocations.

pub mod compiler;
pub mod description;
pub mod graph;
pub mod issue;

pub use compiler::{CompileFailure, CompiledWorkflow, Compiler, ValidationReport};
pub use description::{EdgeSpec, NodeSpec, Position, WorkflowDescription, WorkflowMetadata};
pub use graph::{EdgeRef, ExecutionGraph, ExecutionNode, GraphMetadata};
pub use issue::{CompileIssue, IssueCode};
