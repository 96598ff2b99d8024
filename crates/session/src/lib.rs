#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi Session
//!
//! Interaction state for multi-turn channels (USSD menus, voice calls).
//! A [`SessionRecord`] is keyed by session id and indexed by
//! `(subscriber, channel)`; at most one active session may exist per
//! pair. Expiry is wall-clock at access time, plus a [`sweep`] for
//! periodic cleanup.
//!
//! [`sweep`]: SessionStore::sweep

pub mod error;
pub mod memory;
pub mod record;
pub mod store;

pub use error::SessionError;
pub use memory::InMemorySessionStore;
pub use record::SessionRecord;
pub use store::{NewSession, SessionStore};
