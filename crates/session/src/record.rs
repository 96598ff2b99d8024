//! Session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tawi_core::Channel;

/// Interaction state held across invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session key. Usually gateway-assigned for USSD/voice.
    pub session_id: String,
    /// The channel this session belongs to.
    pub channel: Channel,
    /// The remote party's phone identifier (MSISDN).
    pub subscriber: String,
    /// Arbitrary workflow-managed state.
    pub data: Map<String, Value>,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every touch or data update.
    pub last_activity_at: DateTime<Utc>,
    /// When set, the session expires at this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared by an explicit end or by expiry.
    pub active: bool,
}

impl SessionRecord {
    /// Whether the record has passed its expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whether the record satisfies lookups right now.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_in: Option<Duration>) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: "s1".into(),
            channel: Channel::Ussd,
            subscriber: "+254700000001".into(),
            data: Map::new(),
            created_at: now,
            last_activity_at: now,
            expires_at: expires_in.map(|d| now + d),
            active: true,
        }
    }

    #[test]
    fn no_expiry_never_expires() {
        let rec = record(None);
        assert!(!rec.is_expired(Utc::now() + Duration::days(365)));
        assert!(rec.is_live(Utc::now()));
    }

    #[test]
    fn expiry_is_wall_clock() {
        let rec = record(Some(Duration::seconds(60)));
        let now = Utc::now();
        assert!(!rec.is_expired(now));
        assert!(rec.is_expired(now + Duration::seconds(61)));
        assert!(!rec.is_live(now + Duration::seconds(61)));
    }

    #[test]
    fn inactive_record_is_not_live() {
        let mut rec = record(None);
        rec.active = false;
        assert!(!rec.is_live(Utc::now()));
    }
}
