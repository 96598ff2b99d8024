//! Request handlers.

pub mod executions;
pub mod health;
pub mod workflows;
