#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi Core
//!
//! Shared building blocks for the Tawi workflow engine:
//!
//! - [`WorkflowId`] and [`ExecutionId`] — strongly-typed UUID identifiers
//! - [`Channel`] — the interaction channel a session or event belongs to
//! - [`serde_ms`] — serde helpers for durations carried as milliseconds
//!
//! Node ids and session ids are caller-supplied strings (node ids come from
//! the workflow author, session ids usually from the telecom gateway), so
//! they deliberately stay `String` rather than becoming typed UUIDs.

pub mod channel;
pub mod id;
pub mod serde_ms;

pub use channel::Channel;
pub use id::{ExecutionId, WorkflowId};
