//! The session store interface.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tawi_core::Channel;

use crate::error::SessionError;
use crate::record::SessionRecord;

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Caller-supplied session id (gateways assign USSD/voice ids).
    /// When `None`, the store generates a UUID string.
    pub session_id: Option<String>,
    /// The channel the session belongs to.
    pub channel: Channel,
    /// The subscriber the session belongs to.
    pub subscriber: String,
    /// Initial session data.
    pub data: Map<String, Value>,
    /// Time-to-live; `None` means the session never expires on its own.
    pub ttl: Option<Duration>,
}

impl NewSession {
    /// A session with empty data and no caller-supplied id.
    #[must_use]
    pub fn new(channel: Channel, subscriber: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            session_id: None,
            channel,
            subscriber: subscriber.into(),
            data: Map::new(),
            ttl,
        }
    }

    /// Use a gateway-assigned session id.
    #[must_use]
    pub fn with_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Seed initial data.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

/// Keyed store of interaction state.
///
/// Implementations must linearize operations per session id, and must
/// uphold the invariant that a `(subscriber, channel)` pair has at most
/// one active session. Inactive or expired records never satisfy
/// lookups; expiry is evaluated against the wall clock at access time.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open a session.
    ///
    /// Fails with [`SessionError::Conflict`] when an active session is
    /// already indexed for the `(subscriber, channel)` pair.
    async fn create(&self, new: NewSession) -> Result<SessionRecord, SessionError>;

    /// Fetch a session by id. `None` if absent, inactive, or expired;
    /// an expired record is transitioned to inactive before returning.
    async fn get(&self, session_id: &str) -> Option<SessionRecord>;

    /// Fetch the active session for a subscriber on a channel, with the
    /// same expiry handling as [`get`](Self::get).
    async fn find_active(&self, subscriber: &str, channel: Channel) -> Option<SessionRecord>;

    /// Merge `partial_data` into the session data (incoming keys win)
    /// and refresh `last_activity_at`. `expires_at` is preserved.
    async fn update_data(
        &self,
        session_id: &str,
        partial_data: Map<String, Value>,
    ) -> Result<SessionRecord, SessionError>;

    /// Replace the session data wholesale and refresh `last_activity_at`.
    async fn replace_data(
        &self,
        session_id: &str,
        data: Map<String, Value>,
    ) -> Result<SessionRecord, SessionError>;

    /// Refresh `last_activity_at` only. No effect on inactive sessions.
    async fn touch(&self, session_id: &str);

    /// Mark the session inactive and drop its secondary index entry.
    async fn end(&self, session_id: &str);

    /// End every expired active record; returns how many were ended.
    async fn sweep(&self) -> usize;
}
