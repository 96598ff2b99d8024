//! Endpoint contract tests over the router with a fake provider.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use tawi_action::telecom::{
    CallHandle, CallRequest, DtmfRequest, DtmfResult, IvrPrompt, PaymentReceipt, PaymentRequest,
    RefundRequest, SmsDelivery, SmsRequest, UssdReply,
};
use tawi_action::{ProviderError, TelecomClient};
use tawi_api::{Runtime, router};
use tawi_core::WorkflowId;

#[derive(Default)]
struct RecordingTelecom {
    sms_calls: Mutex<Vec<SmsRequest>>,
}

#[async_trait]
impl TelecomClient for RecordingTelecom {
    async fn send_sms(&self, request: SmsRequest) -> Result<SmsDelivery, ProviderError> {
        self.sms_calls.lock().unwrap().push(request);
        Ok(SmsDelivery {
            message_id: "msg-1".into(),
            status: "sent".into(),
        })
    }
    async fn send_ussd_response(&self, _r: UssdReply) -> Result<(), ProviderError> {
        Ok(())
    }
    async fn initiate_call(&self, _r: CallRequest) -> Result<CallHandle, ProviderError> {
        Ok(CallHandle {
            call_session_id: "call-1".into(),
        })
    }
    async fn play_ivr(&self, _p: IvrPrompt) -> Result<(), ProviderError> {
        Ok(())
    }
    async fn collect_dtmf(&self, _r: DtmfRequest) -> Result<DtmfResult, ProviderError> {
        Ok(DtmfResult { digits: None })
    }
    async fn request_payment(&self, _r: PaymentRequest) -> Result<PaymentReceipt, ProviderError> {
        Ok(PaymentReceipt {
            transaction_id: "txn-1".into(),
            status: "queued".into(),
        })
    }
    async fn refund_payment(&self, _r: RefundRequest) -> Result<PaymentReceipt, ProviderError> {
        Ok(PaymentReceipt {
            transaction_id: "txn-1".into(),
            status: "refunded".into(),
        })
    }
}

fn app() -> (Router, Arc<RecordingTelecom>) {
    let telecom = Arc::new(RecordingTelecom::default());
    let runtime = Runtime::new(telecom.clone(), None);
    (router(runtime), telecom)
}

fn sms_echo_workflow(workflow_id: WorkflowId) -> Value {
    json!({
        "metadata": {
            "id": workflow_id,
            "version": 1,
            "name": "sms echo",
            "created_at": Utc::now(),
        },
        "trigger": {"id": "t", "type": "sms_received", "config": {}},
        "nodes": [
            {"id": "t", "type": "sms_received", "config": {}},
            {
                "id": "reply",
                "type": "send_sms",
                "config": {"to": "{{subscriber}}", "message": "You said: {{message}}"}
            }
        ],
        "edges": [{"id": "e1", "source": "t", "target": "reply"}]
    })
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn validate_agrees_with_compile() {
    let (app, _) = app();
    let good = sms_echo_workflow(WorkflowId::v4());

    let (status, body) = request(&app, "POST", "/workflows/validate", Some(good.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["errors"], json!([]));

    let (status, body) = request(&app, "POST", "/workflows/compile", Some(good)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["graph"]["execution_order"], json!(["t", "reply"]));
    assert_eq!(body["graph"]["metadata"]["has_cycles"], json!(false));
}

#[tokio::test]
async fn compile_rejects_a_cycle_with_the_stable_code() {
    let (app, _) = app();
    let mut workflow = sms_echo_workflow(WorkflowId::v4());
    workflow["nodes"].as_array_mut().unwrap().push(json!({
        "id": "again",
        "type": "send_sms",
        "config": {"to": "x", "message": "y"}
    }));
    let edges = workflow["edges"].as_array_mut().unwrap();
    edges.push(json!({"id": "e2", "source": "reply", "target": "again"}));
    edges.push(json!({"id": "e3", "source": "again", "target": "reply"}));

    let (status, body) = request(&app, "POST", "/workflows/compile", Some(workflow.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["errors"][0]["code"], json!("cycle_detected"));

    let (_, validation) = request(&app, "POST", "/workflows/validate", Some(workflow)).await;
    assert_eq!(validation["valid"], json!(false));
}

#[tokio::test]
async fn execute_runs_the_workflow_and_logs_it() {
    let (app, telecom) = app();
    let body = json!({
        "workflow": sms_echo_workflow(WorkflowId::v4()),
        "trigger_payload": {
            "subscriber": "+254700000001",
            "message": "hello",
            "message_id": "m-1"
        }
    });

    let (status, response) = request(&app, "POST", "/workflows/execute", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], json!("completed"));
    assert_eq!(response["node_results"][0]["status"], json!("success"));
    assert_eq!(response["output"]["message_id"], json!("msg-1"));

    {
        let calls = telecom.sms_calls.lock().unwrap();
        assert_eq!(calls[0].to, "+254700000001");
        assert_eq!(calls[0].message, "You said: hello");
    }

    // The invocation is retrievable by id.
    let execution_id = response["execution_id"].as_str().unwrap().to_string();
    let (status, record) = request(
        &app,
        "GET",
        &format!("/workflows/executions/{execution_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["state"], json!("completed"));
    assert_eq!(record["node_results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn execute_rejects_uncompilable_workflows() {
    let (app, _) = app();
    let mut workflow = sms_echo_workflow(WorkflowId::v4());
    workflow["edges"].as_array_mut().unwrap().push(json!({
        "id": "e9", "source": "reply", "target": "ghost"
    }));

    let (status, body) = request(
        &app,
        "POST",
        "/workflows/execute",
        Some(json!({"workflow": workflow, "trigger_payload": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["errors"][0]["code"], json!("schema_validation_error"));
}

#[tokio::test]
async fn executions_query_filters_by_workflow_and_state() {
    let (app, _) = app();
    let target = WorkflowId::v4();
    let other = WorkflowId::v4();

    for workflow_id in [target, target, other] {
        let body = json!({
            "workflow": sms_echo_workflow(workflow_id),
            "trigger_payload": {"subscriber": "+254700000001", "message": "hi"}
        });
        let (status, _) = request(&app, "POST", "/workflows/execute", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = request(
        &app,
        "GET",
        &format!("/workflows/executions?workflow_id={target}&state=completed&limit=10"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let executions = body["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 2);
    for execution in executions {
        assert_eq!(execution["workflow_id"], json!(target.to_string()));
        assert_eq!(execution["state"], json!("completed"));
    }
}

#[tokio::test]
async fn unknown_execution_is_a_404() {
    let (app, _) = app();
    let (status, body) = request(
        &app,
        "GET",
        "/workflows/executions/00000000-0000-0000-0000-000000000001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("execution"));
}
