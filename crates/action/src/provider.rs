//! Provider-backed action handlers.
//!
//! Each handler renders its configuration against the node scope,
//! validates what the schema could not (unresolved placeholders, numeric
//! amounts), calls the [`TelecomClient`], and classifies failures
//! through [`ProviderError::into_node_error`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tawi_execution::{NodeError, error::codes};
use tawi_workflow::ExecutionNode;

use crate::context::ActionContext;
use crate::handler::{ActionHandler, ActionOutcome};
use crate::telecom::{
    CallRequest, DtmfRequest, IvrPrompt, PaymentRequest, ProviderError, RefundRequest, SmsRequest,
    TelecomClient, UssdReply,
};

/// `send_sms`.
pub struct SendSmsHandler {
    client: Arc<dyn TelecomClient>,
}

impl SendSmsHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for SendSmsHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let config = ctx.render_config(node);
        let to = rendered_str(&config, "to", codes::SMS_SEND_ERROR)?;
        let message = rendered_str(&config, "message", codes::SMS_SEND_ERROR)?;
        let from = config
            .get("from")
            .and_then(Value::as_str)
            .map(str::to_string);

        tracing::info!(node = %node.id, to, "sending sms");
        let delivery = self
            .client
            .send_sms(SmsRequest {
                to: to.clone(),
                message,
                from,
            })
            .await
            .map_err(|e| e.into_node_error(codes::SMS_SEND_ERROR))?;

        let mut output = Map::new();
        output.insert("message_id".into(), Value::String(delivery.message_id));
        output.insert("status".into(), Value::String(delivery.status));
        output.insert("to".into(), Value::String(to));
        Ok(ActionOutcome::success(output))
    }
}

/// `send_ussd_response`.
pub struct SendUssdResponseHandler {
    client: Arc<dyn TelecomClient>,
}

impl SendUssdResponseHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for SendUssdResponseHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let session_id = ctx.require_session()?.session_id.clone();
        let config = ctx.render_config(node);
        let message = rendered_str(&config, "message", codes::USSD_RESPONSE_ERROR)?;
        let expect_input = config
            .get("expect_input")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        self.client
            .send_ussd_response(UssdReply {
                session_id,
                message: message.clone(),
                expect_input,
            })
            .await
            .map_err(|e| e.into_node_error(codes::USSD_RESPONSE_ERROR))?;

        let mut output = Map::new();
        output.insert("message".into(), Value::String(message));
        output.insert("expect_input".into(), Value::Bool(expect_input));
        Ok(ActionOutcome::success(output))
    }
}

/// `initiate_call`.
pub struct InitiateCallHandler {
    client: Arc<dyn TelecomClient>,
}

impl InitiateCallHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for InitiateCallHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        ctx.require_voice_session()?;
        let config = ctx.render_config(node);
        let to = rendered_str(&config, "to", codes::CALL_INITIATION_ERROR)?;
        let from = config
            .get("from")
            .and_then(Value::as_str)
            .map(str::to_string);

        let handle = self
            .client
            .initiate_call(CallRequest { to, from })
            .await
            .map_err(|e| e.into_node_error(codes::CALL_INITIATION_ERROR))?;

        let mut output = Map::new();
        output.insert(
            "call_session_id".into(),
            Value::String(handle.call_session_id),
        );
        Ok(ActionOutcome::success(output))
    }
}

/// `play_ivr`.
pub struct PlayIvrHandler {
    client: Arc<dyn TelecomClient>,
}

impl PlayIvrHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for PlayIvrHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let session = ctx.require_voice_session()?;
        let config = ctx.render_config(node);

        self.client
            .play_ivr(IvrPrompt {
                call_session_id: session.session_id.clone(),
                text: config.get("text").and_then(Value::as_str).map(str::to_string),
                audio_url: config
                    .get("audio_url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .await
            .map_err(|e| e.into_node_error(codes::IVR_PLAY_ERROR))?;

        let mut output = Map::new();
        output.insert("played".into(), Value::Bool(true));
        Ok(ActionOutcome::success(output))
    }
}

/// `collect_dtmf`.
pub struct CollectDtmfHandler {
    client: Arc<dyn TelecomClient>,
}

impl CollectDtmfHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for CollectDtmfHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let session = ctx.require_voice_session()?;
        let config = ctx.render_config(node);

        let result = self
            .client
            .collect_dtmf(DtmfRequest {
                call_session_id: session.session_id.clone(),
                prompt: config
                    .get("prompt")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                max_digits: config
                    .get("max_digits")
                    .and_then(Value::as_u64)
                    .unwrap_or(1) as u32,
                timeout_ms: config
                    .get("timeout_ms")
                    .and_then(Value::as_u64)
                    .unwrap_or(10_000),
                finish_on_key: config
                    .get("finish_on_key")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .await
            .map_err(|e| e.into_node_error(codes::DTMF_COLLECTION_ERROR))?;

        match result.digits {
            Some(digits) => {
                let mut output = Map::new();
                output.insert("digits".into(), Value::String(digits));
                Ok(ActionOutcome::success(output))
            }
            None => {
                let mut output = Map::new();
                output.insert("digits".into(), Value::Null);
                Ok(ActionOutcome::on("timeout", output))
            }
        }
    }
}

/// `request_payment`.
pub struct RequestPaymentHandler {
    client: Arc<dyn TelecomClient>,
}

impl RequestPaymentHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for RequestPaymentHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let config = ctx.render_config(node);
        let transaction_type =
            rendered_str(&config, "transaction_type", codes::PAYMENT_REQUEST_ERROR)?;
        let amount = rendered_amount(&config, "amount", codes::PAYMENT_REQUEST_ERROR)?
            .ok_or_else(|| {
                NodeError::validation(codes::PAYMENT_REQUEST_ERROR, "amount is required")
            })?;
        let currency = rendered_str(&config, "currency", codes::PAYMENT_REQUEST_ERROR)?;
        let phone_number = rendered_str(&config, "phone_number", codes::PAYMENT_REQUEST_ERROR)?;
        let product_name = rendered_str(&config, "product_name", codes::PAYMENT_REQUEST_ERROR)?;
        let metadata = config
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let receipt = self
            .client
            .request_payment(PaymentRequest {
                transaction_type,
                amount,
                currency: currency.clone(),
                phone_number,
                product_name,
                metadata,
            })
            .await
            .map_err(|e| e.into_node_error(codes::PAYMENT_REQUEST_ERROR))?;

        let mut output = Map::new();
        output.insert("transaction_id".into(), Value::String(receipt.transaction_id));
        output.insert("status".into(), Value::String(receipt.status));
        output.insert("amount".into(), Value::from(amount));
        output.insert("currency".into(), Value::String(currency));
        Ok(ActionOutcome::success(output))
    }
}

/// `refund_payment`.
pub struct RefundPaymentHandler {
    client: Arc<dyn TelecomClient>,
}

impl RefundPaymentHandler {
    /// Create the handler over a provider client.
    #[must_use]
    pub fn new(client: Arc<dyn TelecomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for RefundPaymentHandler {
    async fn execute(
        &self,
        node: &ExecutionNode,
        ctx: &ActionContext,
        _input: &Map<String, Value>,
    ) -> Result<ActionOutcome, NodeError> {
        let config = ctx.render_config(node);
        let transaction_id = rendered_str(&config, "transaction_id", codes::PAYMENT_REFUND_ERROR)?;
        let amount = rendered_amount(&config, "amount", codes::PAYMENT_REFUND_ERROR)?;

        let receipt = self
            .client
            .refund_payment(RefundRequest {
                transaction_id,
                amount,
            })
            .await
            .map_err(|e| e.into_node_error(codes::PAYMENT_REFUND_ERROR))?;

        let mut output = Map::new();
        output.insert("transaction_id".into(), Value::String(receipt.transaction_id));
        output.insert("status".into(), Value::String(receipt.status));
        Ok(ActionOutcome::success(output))
    }
}

/// A required string field after rendering. Unresolved placeholders are
/// a validation failure — the provider should never see `{{...}}`.
fn rendered_str(
    config: &Map<String, Value>,
    field: &str,
    error_code: &str,
) -> Result<String, NodeError> {
    let value = config
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            NodeError::validation(error_code, format!("{field} is required"))
        })?;
    if value.contains("{{") {
        return Err(NodeError::validation(
            error_code,
            format!("{field} contains an unresolved placeholder: {value}"),
        ));
    }
    Ok(value.to_string())
}

/// An optional numeric field that may arrive as a number or a rendered
/// numeric string.
fn rendered_amount(
    config: &Map<String, Value>,
    field: &str,
    error_code: &str,
) -> Result<Option<f64>, NodeError> {
    match config.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s.parse::<f64>().map(Some).map_err(|_| {
            NodeError::validation(error_code, format!("{field} is not a number: {s}"))
        }),
        Some(other) => Err(NodeError::validation(
            error_code,
            format!("{field} is not a number: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telecom::{CallHandle, DtmfResult, PaymentReceipt, SmsDelivery};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tawi_catalog::builtin_catalog;
    use tawi_core::{Channel, ExecutionId, WorkflowId};
    use tawi_expression::Scope;
    use tawi_session::{InMemorySessionStore, SessionRecord};
    use tokio_util::sync::CancellationToken;

    /// Records calls and returns canned responses.
    #[derive(Default)]
    struct FakeTelecom {
        sms_calls: Mutex<Vec<SmsRequest>>,
        fail_sms: Mutex<Option<ProviderError>>,
        dtmf_digits: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TelecomClient for FakeTelecom {
        async fn send_sms(&self, request: SmsRequest) -> Result<SmsDelivery, ProviderError> {
            if let Some(err) = self.fail_sms.lock().unwrap().clone() {
                return Err(err);
            }
            self.sms_calls.lock().unwrap().push(request);
            Ok(SmsDelivery {
                message_id: "msg-123".into(),
                status: "sent".into(),
            })
        }

        async fn send_ussd_response(&self, _reply: UssdReply) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn initiate_call(&self, _request: CallRequest) -> Result<CallHandle, ProviderError> {
            Ok(CallHandle {
                call_session_id: "call-1".into(),
            })
        }

        async fn play_ivr(&self, _prompt: IvrPrompt) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn collect_dtmf(
            &self,
            _request: DtmfRequest,
        ) -> Result<DtmfResult, ProviderError> {
            Ok(DtmfResult {
                digits: self.dtmf_digits.lock().unwrap().clone(),
            })
        }

        async fn request_payment(
            &self,
            request: PaymentRequest,
        ) -> Result<PaymentReceipt, ProviderError> {
            Ok(PaymentReceipt {
                transaction_id: format!("txn-{}", request.transaction_type),
                status: "queued".into(),
            })
        }

        async fn refund_payment(
            &self,
            request: RefundRequest,
        ) -> Result<PaymentReceipt, ProviderError> {
            Ok(PaymentReceipt {
                transaction_id: request.transaction_id,
                status: "refunded".into(),
            })
        }
    }

    fn test_node(node_type: &str, config: Value) -> ExecutionNode {
        let entry = builtin_catalog().lookup(node_type).unwrap();
        let config = match config {
            Value::Object(map) => map,
            _ => panic!("config must be an object"),
        };
        ExecutionNode {
            id: format!("{node_type}-1"),
            node_type: node_type.into(),
            requires_session: entry.requires_session,
            ends_session: entry.ends_session,
            entry,
            config,
            retry: tawi_catalog::RetryPolicy::none(),
            timeout: Duration::from_secs(30),
            disabled: false,
            incoming: vec![],
            outgoing: vec![],
            ordinal: 1,
        }
    }

    fn context(scope_value: Value, session: Option<SessionRecord>) -> ActionContext {
        let scope = match scope_value {
            Value::Object(map) => Scope::from_map(map),
            _ => panic!("scope must be an object"),
        };
        ActionContext {
            execution_id: ExecutionId::v4(),
            workflow_id: WorkflowId::v4(),
            scope,
            session,
            sessions: Arc::new(InMemorySessionStore::new()),
            cancellation: CancellationToken::new(),
        }
    }

    fn voice_session() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: "call-7".into(),
            channel: Channel::Voice,
            subscriber: "+254700000001".into(),
            data: Map::new(),
            created_at: now,
            last_activity_at: now,
            expires_at: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn send_sms_renders_templates_and_calls_provider() {
        let fake = Arc::new(FakeTelecom::default());
        let handler = SendSmsHandler::new(fake.clone());
        let node = test_node(
            "send_sms",
            json!({"to": "{{subscriber}}", "message": "You said: {{message}}"}),
        );
        let ctx = context(
            json!({"subscriber": "+254700000001", "message": "hello"}),
            None,
        );

        let outcome = handler.execute(&node, &ctx, &Map::new()).await.unwrap();
        assert_eq!(outcome.handle.as_deref(), Some("success"));
        assert_eq!(outcome.output["message_id"], json!("msg-123"));

        let calls = fake.sms_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, "+254700000001");
        assert_eq!(calls[0].message, "You said: hello");
    }

    #[tokio::test]
    async fn send_sms_rejects_unresolved_recipient() {
        let handler = SendSmsHandler::new(Arc::new(FakeTelecom::default()));
        let node = test_node("send_sms", json!({"to": "{{missing}}", "message": "hi"}));
        let ctx = context(json!({}), None);

        let err = handler.execute(&node, &ctx, &Map::new()).await.unwrap_err();
        assert_eq!(err.code, codes::SMS_SEND_ERROR);
        assert!(err.message.contains("unresolved"));
    }

    #[tokio::test]
    async fn send_sms_classifies_provider_failures() {
        let fake = Arc::new(FakeTelecom::default());
        *fake.fail_sms.lock().unwrap() = Some(ProviderError::Network("reset".into()));
        let handler = SendSmsHandler::new(fake);
        let node = test_node("send_sms", json!({"to": "+254700000001", "message": "hi"}));
        let ctx = context(json!({}), None);

        let err = handler.execute(&node, &ctx, &Map::new()).await.unwrap_err();
        assert_eq!(err.code, codes::NETWORK_ERROR);
        assert!(err.is_retryable_by_default());
    }

    #[tokio::test]
    async fn ussd_response_requires_session() {
        let handler = SendUssdResponseHandler::new(Arc::new(FakeTelecom::default()));
        let node = test_node("send_ussd_response", json!({"message": "Welcome"}));
        let ctx = context(json!({}), None);

        let err = handler.execute(&node, &ctx, &Map::new()).await.unwrap_err();
        assert_eq!(err.code, codes::SESSION_REQUIRED);
    }

    #[tokio::test]
    async fn voice_handlers_require_voice_channel() {
        let handler = InitiateCallHandler::new(Arc::new(FakeTelecom::default()));
        let node = test_node("initiate_call", json!({"to": "+254700000001"}));

        let now = Utc::now();
        let ussd = SessionRecord {
            session_id: "s1".into(),
            channel: Channel::Ussd,
            subscriber: "+254700000001".into(),
            data: Map::new(),
            created_at: now,
            last_activity_at: now,
            expires_at: None,
            active: true,
        };
        let ctx = context(json!({}), Some(ussd));
        let err = handler.execute(&node, &ctx, &Map::new()).await.unwrap_err();
        assert_eq!(err.code, codes::VOICE_SESSION_REQUIRED);
    }

    #[tokio::test]
    async fn collect_dtmf_routes_silence_to_timeout() {
        let fake = Arc::new(FakeTelecom::default());
        let handler = CollectDtmfHandler::new(fake.clone());
        let node = test_node("collect_dtmf", json!({"max_digits": 4}));
        let ctx = context(json!({}), Some(voice_session()));

        let outcome = handler.execute(&node, &ctx, &Map::new()).await.unwrap();
        assert_eq!(outcome.handle.as_deref(), Some("timeout"));
        assert_eq!(outcome.output["digits"], Value::Null);

        *fake.dtmf_digits.lock().unwrap() = Some("1234".into());
        let outcome = handler.execute(&node, &ctx, &Map::new()).await.unwrap();
        assert_eq!(outcome.handle.as_deref(), Some("success"));
        assert_eq!(outcome.output["digits"], json!("1234"));
    }

    #[tokio::test]
    async fn request_payment_parses_templated_amount() {
        let handler = RequestPaymentHandler::new(Arc::new(FakeTelecom::default()));
        let node = test_node(
            "request_payment",
            json!({
                "transaction_type": "checkout",
                "amount": "{{amount}}",
                "currency": "KES",
                "phone_number": "{{subscriber}}",
                "product_name": "airtime"
            }),
        );
        let ctx = context(
            json!({"amount": 150, "subscriber": "+254700000001"}),
            None,
        );

        let outcome = handler.execute(&node, &ctx, &Map::new()).await.unwrap();
        assert_eq!(outcome.output["transaction_id"], json!("txn-checkout"));
        assert_eq!(outcome.output["amount"], json!(150.0));
    }

    #[tokio::test]
    async fn request_payment_rejects_non_numeric_amount() {
        let handler = RequestPaymentHandler::new(Arc::new(FakeTelecom::default()));
        let node = test_node(
            "request_payment",
            json!({
                "transaction_type": "checkout",
                "amount": "lots",
                "currency": "KES",
                "phone_number": "+254700000001",
                "product_name": "airtime"
            }),
        );
        let ctx = context(json!({}), None);

        let err = handler.execute(&node, &ctx, &Map::new()).await.unwrap_err();
        assert_eq!(err.code, codes::PAYMENT_REQUEST_ERROR);
    }

    #[tokio::test]
    async fn refund_payment_roundtrip() {
        let handler = RefundPaymentHandler::new(Arc::new(FakeTelecom::default()));
        let node = test_node(
            "refund_payment",
            json!({"transaction_id": "txn-9", "amount": 50}),
        );
        let ctx = context(json!({}), None);

        let outcome = handler.execute(&node, &ctx, &Map::new()).await.unwrap();
        assert_eq!(outcome.output["transaction_id"], json!("txn-9"));
        assert_eq!(outcome.output["status"], json!("refunded"));
    }
}
