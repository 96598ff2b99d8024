//! The telecom provider seam.
//!
//! Provider-backed handlers depend on this trait only; the HTTP gateway
//! implements it in production and tests inject fakes. Errors are
//! classified here once, so every handler maps failures to the retry
//! taxonomy the same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tawi_execution::{NodeError, error::codes};

/// An outbound SMS.
#[derive(Debug, Clone, Serialize)]
pub struct SmsRequest {
    /// Recipient MSISDN.
    pub to: String,
    /// Message body.
    pub message: String,
    /// Sender id or short code.
    pub from: Option<String>,
}

/// Provider acknowledgement of an SMS.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsDelivery {
    /// Provider-assigned message id.
    pub message_id: String,
    /// Provider delivery status.
    pub status: String,
}

/// A reply within an open USSD session.
#[derive(Debug, Clone, Serialize)]
pub struct UssdReply {
    /// The gateway session the reply belongs to.
    pub session_id: String,
    /// Menu text shown to the subscriber.
    pub message: String,
    /// Whether the session stays open for further input.
    pub expect_input: bool,
}

/// An outbound call.
#[derive(Debug, Clone, Serialize)]
pub struct CallRequest {
    /// Callee MSISDN.
    pub to: String,
    /// Caller id.
    pub from: Option<String>,
}

/// Provider acknowledgement of a placed call.
#[derive(Debug, Clone, Deserialize)]
pub struct CallHandle {
    /// Provider-assigned call session id.
    pub call_session_id: String,
}

/// An IVR prompt. Exactly one of `text`/`audio_url` is set, enforced by
/// the catalog's config validation.
#[derive(Debug, Clone, Serialize)]
pub struct IvrPrompt {
    /// The voice session to play into.
    pub call_session_id: String,
    /// Text for speech synthesis.
    pub text: Option<String>,
    /// Pre-recorded audio to play.
    pub audio_url: Option<String>,
}

/// A DTMF collection request.
#[derive(Debug, Clone, Serialize)]
pub struct DtmfRequest {
    /// The voice session to collect from.
    pub call_session_id: String,
    /// Optional prompt played before collection.
    pub prompt: Option<String>,
    /// Maximum digits to collect.
    pub max_digits: u32,
    /// How long to wait for input, in milliseconds.
    pub timeout_ms: u64,
    /// Key that ends collection early.
    pub finish_on_key: Option<String>,
}

/// Digits collected from the keypad, `None` on caller silence.
#[derive(Debug, Clone, Deserialize)]
pub struct DtmfResult {
    /// The collected digits.
    pub digits: Option<String>,
}

/// A mobile-money transaction request.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    /// `checkout`, `b2c`, or `b2b`.
    pub transaction_type: String,
    /// Amount in the given currency.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// The paying or receiving MSISDN.
    pub phone_number: String,
    /// Product name registered with the provider.
    pub product_name: String,
    /// Free-form metadata passed through to the provider.
    pub metadata: Map<String, Value>,
}

/// A refund of a prior transaction.
#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    /// The transaction to refund.
    pub transaction_id: String,
    /// Partial amount; `None` refunds in full.
    pub amount: Option<f64>,
}

/// Provider acknowledgement of a payment operation.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentReceipt {
    /// Provider-assigned transaction id.
    pub transaction_id: String,
    /// Provider status (`queued`, `success`, ...).
    pub status: String,
}

/// A failure reported by (or on the way to) the provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The request never completed at the transport level.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its own deadline.
    #[error("provider call timed out: {0}")]
    Timeout(String),

    /// The provider throttled the account.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider answered with an HTTP error status.
    #[error("provider returned status {status}: {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The provider rejected the request outright.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Classify into the node error taxonomy.
    ///
    /// Transport failures and 5xx are transient, throttling is
    /// `rate_limit`, everything else is permanent under the
    /// action-specific code.
    #[must_use]
    pub fn into_node_error(self, action_code: &str) -> NodeError {
        match self {
            Self::Network(message) | Self::Timeout(message) => {
                NodeError::transient(codes::NETWORK_ERROR, message)
            }
            Self::RateLimited(message) => NodeError::rate_limit(message),
            Self::Status { status, message } if status == 429 => NodeError::rate_limit(message),
            Self::Status { status, message } if status >= 500 => NodeError::transient(
                action_code,
                format!("provider returned status {status}: {message}"),
            ),
            Self::Status { status, message } => NodeError::permanent(
                action_code,
                format!("provider returned status {status}: {message}"),
            ),
            Self::Rejected(message) => NodeError::permanent(action_code, message),
        }
    }
}

/// The provider surface used by the built-in action handlers.
#[async_trait]
pub trait TelecomClient: Send + Sync {
    /// Send an SMS.
    async fn send_sms(&self, request: SmsRequest) -> Result<SmsDelivery, ProviderError>;

    /// Reply within a USSD session.
    async fn send_ussd_response(&self, reply: UssdReply) -> Result<(), ProviderError>;

    /// Place an outbound call.
    async fn initiate_call(&self, request: CallRequest) -> Result<CallHandle, ProviderError>;

    /// Play an IVR prompt.
    async fn play_ivr(&self, prompt: IvrPrompt) -> Result<(), ProviderError>;

    /// Collect DTMF digits.
    async fn collect_dtmf(&self, request: DtmfRequest) -> Result<DtmfResult, ProviderError>;

    /// Initiate a payment.
    async fn request_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt, ProviderError>;

    /// Refund a payment.
    async fn refund_payment(&self, request: RefundRequest)
    -> Result<PaymentReceipt, ProviderError>;
}
