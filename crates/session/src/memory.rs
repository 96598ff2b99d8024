//! In-memory session store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Map, Value};
use tawi_core::Channel;

use crate::error::SessionError;
use crate::record::SessionRecord;
use crate::store::{NewSession, SessionStore};

/// In-memory [`SessionStore`].
///
/// Records live in a dashmap keyed by session id; the per-shard entry
/// locks give every operation a single linearization point per session
/// without a global mutex. A second dashmap indexes active sessions by
/// `(subscriber, channel)`.
///
/// Lock discipline: no operation holds a `records` guard and an `index`
/// guard at the same time. Cross-map consistency is kept by always
/// flipping `active` first and then removing the index entry with
/// `remove_if`, so a reader can at worst observe a briefly stale index
/// entry pointing at an inactive record — which lookups already treat
/// as absent.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: DashMap<String, SessionRecord>,
    index: DashMap<(String, Channel), String>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove the index entry if it still points at `session_id`.
    fn unindex(&self, subscriber: &str, channel: Channel, session_id: &str) {
        self.index
            .remove_if(&(subscriber.to_string(), channel), |_, sid| {
                sid == session_id
            });
    }

    /// Mark an expired-but-active record inactive and drop its index
    /// entry. Returns the record if it is live after the transition.
    fn read_live(&self, session_id: &str) -> Option<SessionRecord> {
        let now = Utc::now();
        let mut expired_owner = None;

        let live = {
            let mut entry = self.records.get_mut(session_id)?;
            if entry.active && entry.is_expired(now) {
                entry.active = false;
                expired_owner = Some((entry.subscriber.clone(), entry.channel));
            }
            entry.is_live(now).then(|| entry.clone())
        };

        if let Some((subscriber, channel)) = expired_owner {
            self.unindex(&subscriber, channel, session_id);
        }
        live
    }

    /// Apply a mutation to a live record, refreshing `last_activity_at`.
    fn mutate_live(
        &self,
        session_id: &str,
        apply: impl FnOnce(&mut SessionRecord),
    ) -> Result<SessionRecord, SessionError> {
        let now = Utc::now();
        let mut expired_owner = None;

        let result = match self.records.get_mut(session_id) {
            None => Err(SessionError::NotFound(session_id.to_string())),
            Some(mut entry) => {
                if entry.active && entry.is_expired(now) {
                    entry.active = false;
                    expired_owner = Some((entry.subscriber.clone(), entry.channel));
                }
                if entry.is_live(now) {
                    apply(&mut entry);
                    entry.last_activity_at = now;
                    Ok(entry.clone())
                } else {
                    Err(SessionError::NotFound(session_id.to_string()))
                }
            }
        };

        if let Some((subscriber, channel)) = expired_owner {
            self.unindex(&subscriber, channel, session_id);
        }
        result
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, new: NewSession) -> Result<SessionRecord, SessionError> {
        let session_id = new
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let key = (new.subscriber.clone(), new.channel);

        // Check whether the currently indexed session (if any) is live.
        let observed = self.index.get(&key).map(|r| r.value().clone());
        if let Some(sid) = &observed {
            if self.read_live(sid).is_some() {
                return Err(SessionError::Conflict {
                    subscriber: new.subscriber,
                    channel: new.channel,
                });
            }
        }

        // Claim the index slot. If another create slipped in between the
        // check and the claim, the occupant differs from what we observed
        // and the claim is refused.
        match self.index.entry(key) {
            Entry::Occupied(mut occupied) => {
                if observed.as_deref() != Some(occupied.get().as_str()) {
                    return Err(SessionError::Conflict {
                        subscriber: new.subscriber,
                        channel: new.channel,
                    });
                }
                occupied.insert(session_id.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(session_id.clone());
            }
        }

        let now = Utc::now();
        let record = SessionRecord {
            session_id: session_id.clone(),
            channel: new.channel,
            subscriber: new.subscriber,
            data: new.data,
            created_at: now,
            last_activity_at: now,
            expires_at: new.ttl.and_then(|ttl| {
                chrono::Duration::from_std(ttl).ok().map(|ttl| now + ttl)
            }),
            active: true,
        };
        self.records.insert(session_id, record.clone());
        Ok(record)
    }

    async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.read_live(session_id)
    }

    async fn find_active(&self, subscriber: &str, channel: Channel) -> Option<SessionRecord> {
        let session_id = self
            .index
            .get(&(subscriber.to_string(), channel))
            .map(|r| r.value().clone())?;
        self.read_live(&session_id)
    }

    async fn update_data(
        &self,
        session_id: &str,
        partial_data: Map<String, Value>,
    ) -> Result<SessionRecord, SessionError> {
        self.mutate_live(session_id, |record| {
            for (key, value) in partial_data {
                record.data.insert(key, value);
            }
        })
    }

    async fn replace_data(
        &self,
        session_id: &str,
        data: Map<String, Value>,
    ) -> Result<SessionRecord, SessionError> {
        self.mutate_live(session_id, |record| {
            record.data = data;
        })
    }

    async fn touch(&self, session_id: &str) {
        let _ = self.mutate_live(session_id, |_| {});
    }

    async fn end(&self, session_id: &str) {
        let owner = {
            match self.records.get_mut(session_id) {
                None => None,
                Some(mut entry) => {
                    entry.active = false;
                    Some((entry.subscriber.clone(), entry.channel))
                }
            }
        };
        if let Some((subscriber, channel)) = owner {
            self.unindex(&subscriber, channel, session_id);
        }
    }

    async fn sweep(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.active && entry.is_expired(now))
            .map(|entry| entry.session_id.clone())
            .collect();

        let mut ended = 0;
        for session_id in expired {
            let owner = {
                match self.records.get_mut(&session_id) {
                    Some(mut entry) if entry.active && entry.is_expired(now) => {
                        entry.active = false;
                        Some((entry.subscriber.clone(), entry.channel))
                    }
                    _ => None,
                }
            };
            if let Some((subscriber, channel)) = owner {
                self.unindex(&subscriber, channel, &session_id);
                ended += 1;
            }
        }
        ended
    }
}
