//! Session store errors.

use tawi_core::Channel;

/// Error type for session store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session does not exist or is no longer active.
    #[error("session `{0}` not found or inactive")]
    NotFound(String),

    /// An active session already exists for the subscriber on the channel.
    #[error("an active {channel} session already exists for {subscriber}")]
    Conflict {
        /// The subscriber holding the existing session.
        subscriber: String,
        /// The contested channel.
        channel: Channel,
    },
}

impl SessionError {
    /// The stable error code exposed to callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "session_not_found",
            Self::Conflict { .. } => "session_conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SessionError::NotFound("s".into()).code(), "session_not_found");
        assert_eq!(
            SessionError::Conflict {
                subscriber: "+254".into(),
                channel: Channel::Ussd,
            }
            .code(),
            "session_conflict"
        );
    }

    #[test]
    fn display_mentions_the_session() {
        let err = SessionError::NotFound("abc".into());
        assert!(err.to_string().contains("abc"));
    }
}
