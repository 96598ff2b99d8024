//! Structured node errors.
//!
//! Failures cross layer boundaries as values, not panics. Every error
//! carries a stable code (part of the public API surface), a
//! human-readable message, a kind that drives retry eligibility, and
//! optional structured details.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable error codes shared across crates.
pub mod codes {
    /// A node handler failed for an unclassified reason.
    pub const NODE_EXECUTION_ERROR: &str = "node_execution_error";
    /// The invocation exceeded its wall-clock budget.
    pub const EXECUTION_TIMEOUT: &str = "execution_timeout";
    /// A single node exceeded its timeout.
    pub const NODE_TIMEOUT: &str = "node_timeout";
    /// A remote call failed at the transport level.
    pub const NETWORK_ERROR: &str = "network_error";
    /// The provider rejected a call for rate reasons.
    pub const RATE_LIMIT: &str = "rate_limit";
    /// A node needing a session ran without one.
    pub const SESSION_REQUIRED: &str = "session_required";
    /// A voice node ran outside a voice session.
    pub const VOICE_SESSION_REQUIRED: &str = "voice_session_required";
    /// The referenced session does not exist or is inactive.
    pub const SESSION_NOT_FOUND: &str = "session_not_found";
    /// An active session already exists for the subscriber/channel pair.
    pub const SESSION_CONFLICT: &str = "session_conflict";
    /// SMS delivery failed.
    pub const SMS_SEND_ERROR: &str = "sms_send_error";
    /// USSD response delivery failed.
    pub const USSD_RESPONSE_ERROR: &str = "ussd_response_error";
    /// Outbound call placement failed.
    pub const CALL_INITIATION_ERROR: &str = "call_initiation_error";
    /// IVR playback failed.
    pub const IVR_PLAY_ERROR: &str = "ivr_play_error";
    /// DTMF collection failed.
    pub const DTMF_COLLECTION_ERROR: &str = "dtmf_collection_error";
    /// Payment initiation failed.
    pub const PAYMENT_REQUEST_ERROR: &str = "payment_request_error";
    /// Payment refund failed.
    pub const PAYMENT_REFUND_ERROR: &str = "payment_refund_error";
}

/// The retry classification of a node error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeErrorKind {
    /// Temporary failure; retry-eligible by default.
    Transient,
    /// Permanent failure; never retried.
    Permanent,
    /// Provider throttling; retry-eligible by default.
    RateLimit,
    /// Bad configuration or input; never retried.
    Validation,
}

impl NodeErrorKind {
    /// Whether this kind is retry-eligible when no explicit code list
    /// restricts the node's policy.
    #[must_use]
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimit)
    }
}

/// A structured node failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct NodeError {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Retry classification.
    #[serde(rename = "type")]
    pub kind: NodeErrorKind,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl NodeError {
    /// Create an error.
    pub fn new(code: impl Into<String>, message: impl Into<String>, kind: NodeErrorKind) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind,
            details: None,
        }
    }

    /// A transient (retry-eligible) error.
    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, NodeErrorKind::Transient)
    }

    /// A permanent error.
    pub fn permanent(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, NodeErrorKind::Permanent)
    }

    /// A rate-limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(codes::RATE_LIMIT, message, NodeErrorKind::RateLimit)
    }

    /// A validation error.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, NodeErrorKind::Validation)
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether the error's kind is retry-eligible by default.
    #[must_use]
    pub fn is_retryable_by_default(&self) -> bool {
        self.kind.is_retryable_by_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(
            NodeError::transient(codes::NETWORK_ERROR, "reset").kind,
            NodeErrorKind::Transient
        );
        assert_eq!(
            NodeError::permanent(codes::SMS_SEND_ERROR, "rejected").kind,
            NodeErrorKind::Permanent
        );
        assert_eq!(NodeError::rate_limit("slow down").code, codes::RATE_LIMIT);
        assert_eq!(
            NodeError::validation("bad_config", "missing to").kind,
            NodeErrorKind::Validation
        );
    }

    #[test]
    fn default_retry_eligibility() {
        assert!(NodeErrorKind::Transient.is_retryable_by_default());
        assert!(NodeErrorKind::RateLimit.is_retryable_by_default());
        assert!(!NodeErrorKind::Permanent.is_retryable_by_default());
        assert!(!NodeErrorKind::Validation.is_retryable_by_default());
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = NodeError::transient(codes::NETWORK_ERROR, "connection reset");
        assert_eq!(err.to_string(), "network_error: connection reset");
    }

    #[test]
    fn kind_serializes_as_type_field() {
        let err = NodeError::rate_limit("throttled").with_details(json!({"retry_after": 5}));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "rate_limit");
        assert_eq!(json["details"]["retry_after"], 5);

        let back: NodeError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn details_omitted_when_absent() {
        let err = NodeError::permanent("x", "y");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("details"));
    }
}
