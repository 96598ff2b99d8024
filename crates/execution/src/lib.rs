#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi Execution
//!
//! Execution-time contracts shared by the engine and the entry points —
//! this crate models state, it does not orchestrate:
//!
//! - [`ExecutionState`] — invocation-level state machine
//! - [`NodeStatus`] and [`NodeExecutionResult`] — one record per attempt
//! - [`NodeError`] / [`NodeErrorKind`] — structured, retry-classified errors
//! - [`ExecutionRecord`] — the append-only log of one invocation
//! - [`ExecutionJournal`] and [`InMemoryJournal`] — the queryable log store

pub mod error;
pub mod journal;
pub mod record;
pub mod result;
pub mod status;

pub use error::{NodeError, NodeErrorKind};
pub use journal::{ExecutionJournal, InMemoryJournal, JournalQuery};
pub use record::ExecutionRecord;
pub use result::{NodeExecutionResult, NodeStatus};
pub use status::ExecutionState;
