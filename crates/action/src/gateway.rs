//! HTTP gateway to the telecom provider.
//!
//! Implements [`TelecomClient`] against the provider's REST surface.
//! Credentials and environment come from the server configuration; the
//! sandbox and production environments differ only in base URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::telecom::{
    CallHandle, CallRequest, DtmfRequest, DtmfResult, IvrPrompt, PaymentReceipt, PaymentRequest,
    ProviderError, RefundRequest, SmsDelivery, SmsRequest, TelecomClient, UssdReply,
};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Which provider environment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEnvironment {
    /// The provider's sandbox.
    Sandbox,
    /// Live traffic.
    Production,
}

impl ProviderEnvironment {
    fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://api.sandbox.africastalking.com",
            Self::Production => "https://api.africastalking.com",
        }
    }
}

impl std::str::FromStr for ProviderEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown provider environment: {other}")),
        }
    }
}

/// REST gateway to the provider.
pub struct AfricasTalkingGateway {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_key: String,
}

impl AfricasTalkingGateway {
    /// Create a gateway for the given environment and credentials.
    #[must_use]
    pub fn new(
        environment: ProviderEnvironment,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: environment.base_url().to_string(),
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    /// Point the gateway at a custom base URL (tests use a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("apiKey", &self.api_key)
            .header("Accept", "application/json")
            .timeout(DEFAULT_CALL_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited(text));
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::Rejected(format!(
            "unparseable provider response: {e}"
        )))
    }
}

fn classify_transport(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else {
        ProviderError::Network(error.to_string())
    }
}

#[derive(Deserialize)]
struct SmsRecipient {
    #[serde(rename = "messageId")]
    message_id: String,
    status: String,
}

#[derive(Deserialize)]
struct SmsResponse {
    recipients: Vec<SmsRecipient>,
}

#[derive(Deserialize)]
struct CallResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    #[serde(rename = "transactionId")]
    transaction_id: String,
    status: String,
}

#[async_trait]
impl TelecomClient for AfricasTalkingGateway {
    async fn send_sms(&self, request: SmsRequest) -> Result<SmsDelivery, ProviderError> {
        let body = json!({
            "username": self.username,
            "to": request.to,
            "message": request.message,
            "from": request.from,
        });
        let value = self.post("/version1/messaging", body).await?;
        let parsed: SmsResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Rejected(format!("unexpected sms response: {e}")))?;
        let recipient = parsed
            .recipients
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Rejected("no recipients in response".into()))?;
        Ok(SmsDelivery {
            message_id: recipient.message_id,
            status: recipient.status,
        })
    }

    async fn send_ussd_response(&self, reply: UssdReply) -> Result<(), ProviderError> {
        let body = json!({
            "username": self.username,
            "sessionId": reply.session_id,
            "response": format!(
                "{} {}",
                if reply.expect_input { "CON" } else { "END" },
                reply.message
            ),
        });
        self.post("/ussd/respond", body).await.map(|_| ())
    }

    async fn initiate_call(&self, request: CallRequest) -> Result<CallHandle, ProviderError> {
        let body = json!({
            "username": self.username,
            "to": request.to,
            "from": request.from,
        });
        let value = self.post("/voice/call", body).await?;
        let parsed: CallResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Rejected(format!("unexpected call response: {e}")))?;
        Ok(CallHandle {
            call_session_id: parsed.session_id,
        })
    }

    async fn play_ivr(&self, prompt: IvrPrompt) -> Result<(), ProviderError> {
        let body = json!({
            "username": self.username,
            "sessionId": prompt.call_session_id,
            "say": prompt.text,
            "play": prompt.audio_url,
        });
        self.post("/voice/play", body).await.map(|_| ())
    }

    async fn collect_dtmf(&self, request: DtmfRequest) -> Result<DtmfResult, ProviderError> {
        let body = json!({
            "username": self.username,
            "sessionId": request.call_session_id,
            "say": request.prompt,
            "numDigits": request.max_digits,
            "timeout": request.timeout_ms / 1_000,
            "finishOnKey": request.finish_on_key,
        });
        let value = self.post("/voice/getDigits", body).await?;
        let digits = value
            .get("dtmfDigits")
            .and_then(serde_json::Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Ok(DtmfResult { digits })
    }

    async fn request_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt, ProviderError> {
        let path = match request.transaction_type.as_str() {
            "checkout" => "/mobile/checkout/request",
            "b2c" => "/mobile/b2c/request",
            "b2b" => "/mobile/b2b/request",
            other => {
                return Err(ProviderError::Rejected(format!(
                    "unknown transaction type: {other}"
                )));
            }
        };
        let body = json!({
            "username": self.username,
            "productName": request.product_name,
            "phoneNumber": request.phone_number,
            "currencyCode": request.currency,
            "amount": request.amount,
            "metadata": request.metadata,
        });
        let value = self.post(path, body).await?;
        let parsed: PaymentResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Rejected(format!("unexpected payment response: {e}")))?;
        Ok(PaymentReceipt {
            transaction_id: parsed.transaction_id,
            status: parsed.status,
        })
    }

    async fn refund_payment(
        &self,
        request: RefundRequest,
    ) -> Result<PaymentReceipt, ProviderError> {
        let body = json!({
            "username": self.username,
            "transactionId": request.transaction_id,
            "amount": request.amount,
        });
        let value = self.post("/mobile/refund", body).await?;
        let parsed: PaymentResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Rejected(format!("unexpected refund response: {e}")))?;
        Ok(PaymentReceipt {
            transaction_id: parsed.transaction_id,
            status: parsed.status,
        })
    }
}
