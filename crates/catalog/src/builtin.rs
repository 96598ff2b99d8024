//! The built-in node types.
//!
//! [`builtin_catalog`] assembles the full catalog the platform ships
//! with: six triggers, eight actions, six logic nodes, and three state
//! nodes. Entry points call it once at startup.

use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::entry::{CatalogEntry, HandleSpec, NodeCategory};
use crate::registry::NodeCatalog;
use crate::retry::RetryPolicy;
use crate::schema::{ConfigSchema, FieldSchema, SchemaViolation};

/// Node type keys, so other crates don't scatter string literals.
pub mod types {
    /// `sms_received` trigger.
    pub const SMS_RECEIVED: &str = "sms_received";
    /// `ussd_session_start` trigger.
    pub const USSD_SESSION_START: &str = "ussd_session_start";
    /// `incoming_call` trigger.
    pub const INCOMING_CALL: &str = "incoming_call";
    /// `payment_callback` trigger.
    pub const PAYMENT_CALLBACK: &str = "payment_callback";
    /// `scheduled` trigger.
    pub const SCHEDULED: &str = "scheduled";
    /// `http_webhook` trigger.
    pub const HTTP_WEBHOOK: &str = "http_webhook";

    /// `send_sms` action.
    pub const SEND_SMS: &str = "send_sms";
    /// `send_ussd_response` action.
    pub const SEND_USSD_RESPONSE: &str = "send_ussd_response";
    /// `initiate_call` action.
    pub const INITIATE_CALL: &str = "initiate_call";
    /// `play_ivr` action.
    pub const PLAY_IVR: &str = "play_ivr";
    /// `collect_dtmf` action.
    pub const COLLECT_DTMF: &str = "collect_dtmf";
    /// `request_payment` action.
    pub const REQUEST_PAYMENT: &str = "request_payment";
    /// `refund_payment` action.
    pub const REFUND_PAYMENT: &str = "refund_payment";
    /// `http_request` action.
    pub const HTTP_REQUEST: &str = "http_request";

    /// `condition` logic node.
    pub const CONDITION: &str = "condition";
    /// `switch` logic node.
    pub const SWITCH: &str = "switch";
    /// `delay` logic node.
    pub const DELAY: &str = "delay";
    /// `retry` logic node.
    pub const RETRY: &str = "retry";
    /// `rate_limit` logic node.
    pub const RATE_LIMIT: &str = "rate_limit";
    /// `merge` logic node.
    pub const MERGE: &str = "merge";

    /// `session_read` state node.
    pub const SESSION_READ: &str = "session_read";
    /// `session_write` state node.
    pub const SESSION_WRITE: &str = "session_write";
    /// `session_end` state node.
    pub const SESSION_END: &str = "session_end";
}

const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the catalog of built-in node types.
///
/// # Panics
/// Panics on a duplicate registration, which would be a programming error
/// in this module.
#[must_use]
pub fn builtin_catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();

    let entries = triggers()
        .into_iter()
        .chain(actions())
        .chain(logic())
        .chain(state());
    for entry in entries {
        catalog
            .register(entry)
            .expect("built-in node types must be unique");
    }
    catalog
}

fn trigger(node_type: &str, name: &str) -> crate::entry::CatalogEntryBuilder {
    CatalogEntry::builder(node_type, name, NodeCategory::Trigger)
        .output(HandleSpec::output("output", "Event"))
}

fn action(node_type: &str, name: &str) -> crate::entry::CatalogEntryBuilder {
    CatalogEntry::builder(node_type, name, NodeCategory::Action)
        .input(HandleSpec::input("input", "Input"))
        .output(HandleSpec::output("success", "Success"))
        .output(HandleSpec::output("error", "Error"))
        .default_timeout(DEFAULT_ACTION_TIMEOUT)
}

fn triggers() -> Vec<CatalogEntry> {
    vec![
        trigger(types::SMS_RECEIVED, "SMS Received")
            .description("Fires when an inbound SMS arrives, optionally filtered by keyword")
            .schema(ConfigSchema::object([
                FieldSchema::optional("phone_number", ConfigSchema::string()),
                FieldSchema::optional("keyword", ConfigSchema::string()),
                FieldSchema::with_default("case_sensitive", ConfigSchema::Bool, json!(false)),
            ]))
            .build(),
        trigger(types::USSD_SESSION_START, "USSD Session Start")
            .description("Fires when a subscriber dials the service code")
            .schema(ConfigSchema::object([FieldSchema::optional(
                "service_code",
                ConfigSchema::string(),
            )]))
            .requires_session()
            .build(),
        trigger(types::INCOMING_CALL, "Incoming Call")
            .description("Fires when a voice call reaches a registered number")
            .schema(ConfigSchema::object([FieldSchema::optional(
                "phone_number",
                ConfigSchema::string(),
            )]))
            .requires_session()
            .build(),
        trigger(types::PAYMENT_CALLBACK, "Payment Callback")
            .description("Fires on mobile-money transaction notifications")
            .schema(ConfigSchema::object([
                FieldSchema::optional("transaction_type", ConfigSchema::string()),
                FieldSchema::optional("status", ConfigSchema::string()),
            ]))
            .build(),
        trigger(types::SCHEDULED, "Schedule")
            .description("Fires on a cron schedule")
            .schema(ConfigSchema::object([
                FieldSchema::required("cron_expression", ConfigSchema::string_non_empty()),
                FieldSchema::with_default("timezone", ConfigSchema::string(), json!("UTC")),
            ]))
            .custom_validate(validate_cron_fields)
            .build(),
        trigger(types::HTTP_WEBHOOK, "HTTP Webhook")
            .description("Fires on an inbound HTTP request to a registered path")
            .schema(ConfigSchema::object([
                FieldSchema::with_default(
                    "method",
                    ConfigSchema::string_one_of(["GET", "POST", "PUT", "DELETE", "PATCH"]),
                    json!("POST"),
                ),
                FieldSchema::required(
                    "path",
                    ConfigSchema::string_pattern("^/[A-Za-z0-9/_-]*$"),
                ),
                FieldSchema::with_default("require_auth", ConfigSchema::Bool, json!(false)),
                FieldSchema::optional("auth_token", ConfigSchema::string()),
            ]))
            .build(),
    ]
}

fn actions() -> Vec<CatalogEntry> {
    vec![
        action(types::SEND_SMS, "Send SMS")
            .description("Sends an SMS through the provider")
            .schema(ConfigSchema::object([
                FieldSchema::required("to", ConfigSchema::string_non_empty()),
                FieldSchema::required("message", ConfigSchema::string_non_empty()),
                FieldSchema::optional("from", ConfigSchema::string()),
            ]))
            .default_retry(RetryPolicy::for_codes(["rate_limit", "network_error"]))
            .build(),
        action(types::SEND_USSD_RESPONSE, "Send USSD Response")
            .description("Replies within an open USSD session")
            .schema(ConfigSchema::object([
                FieldSchema::required("message", ConfigSchema::string_non_empty()),
                FieldSchema::with_default("expect_input", ConfigSchema::Bool, json!(true)),
            ]))
            .requires_session()
            .build(),
        action(types::INITIATE_CALL, "Initiate Call")
            .description("Places an outbound voice call")
            .schema(ConfigSchema::object([
                FieldSchema::required("to", ConfigSchema::string_non_empty()),
                FieldSchema::optional("from", ConfigSchema::string()),
            ]))
            .requires_session()
            .build(),
        action(types::PLAY_IVR, "Play IVR")
            .description("Plays a prompt (text-to-speech or audio) in a voice session")
            .schema(ConfigSchema::object([
                FieldSchema::optional("text", ConfigSchema::string()),
                FieldSchema::optional("audio_url", ConfigSchema::string()),
            ]))
            .custom_validate(validate_ivr_source)
            .requires_session()
            .build(),
        action(types::COLLECT_DTMF, "Collect DTMF")
            .description("Collects keypad digits in a voice session")
            .schema(ConfigSchema::object([
                FieldSchema::optional("prompt", ConfigSchema::string()),
                FieldSchema::with_default("max_digits", ConfigSchema::integer_min(1.0), json!(1)),
                FieldSchema::with_default(
                    "timeout_ms",
                    ConfigSchema::integer_min(0.0),
                    json!(10_000),
                ),
                FieldSchema::optional("finish_on_key", ConfigSchema::string()),
            ]))
            .output(HandleSpec::output("timeout", "Timed Out"))
            .requires_session()
            .build(),
        action(types::REQUEST_PAYMENT, "Request Payment")
            .description("Initiates a mobile-money transaction")
            .schema(ConfigSchema::object([
                FieldSchema::required(
                    "transaction_type",
                    ConfigSchema::string_one_of(["checkout", "b2c", "b2b"]),
                ),
                FieldSchema::required("amount", ConfigSchema::Any),
                FieldSchema::required("currency", ConfigSchema::string_non_empty()),
                FieldSchema::required("phone_number", ConfigSchema::string_non_empty()),
                FieldSchema::required("product_name", ConfigSchema::string_non_empty()),
                FieldSchema::optional("metadata", ConfigSchema::map(ConfigSchema::Any)),
            ]))
            .build(),
        action(types::REFUND_PAYMENT, "Refund Payment")
            .description("Refunds a prior mobile-money transaction")
            .schema(ConfigSchema::object([
                FieldSchema::required("transaction_id", ConfigSchema::string_non_empty()),
                FieldSchema::optional("amount", ConfigSchema::Any),
            ]))
            .build(),
        action(types::HTTP_REQUEST, "HTTP Request")
            .description("Calls an external HTTP endpoint")
            .schema(ConfigSchema::object([
                FieldSchema::with_default(
                    "method",
                    ConfigSchema::string_one_of(["GET", "POST", "PUT", "DELETE", "PATCH"]),
                    json!("GET"),
                ),
                FieldSchema::required("url", ConfigSchema::string_non_empty()),
                FieldSchema::optional("headers", ConfigSchema::map(ConfigSchema::string())),
                FieldSchema::optional("body", ConfigSchema::Any),
                FieldSchema::with_default(
                    "timeout_ms",
                    ConfigSchema::integer_min(1.0),
                    json!(30_000),
                ),
            ]))
            .build(),
    ]
}

fn logic() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::builder(types::CONDITION, "Condition", NodeCategory::Logic)
            .description("Routes to the true or false branch of a predicate")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("true", "True"))
            .output(HandleSpec::output("false", "False"))
            .schema(ConfigSchema::object([FieldSchema::required(
                "expression",
                ConfigSchema::string_non_empty(),
            )]))
            .multiple_outputs()
            .build(),
        CatalogEntry::builder(types::SWITCH, "Switch", NodeCategory::Logic)
            .description("Routes to the matching case, or default")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("default", "Default"))
            .schema(ConfigSchema::object([
                FieldSchema::required("value", ConfigSchema::string_non_empty()),
                FieldSchema::required(
                    "cases",
                    ConfigSchema::array(ConfigSchema::object([
                        FieldSchema::required("value", ConfigSchema::string()),
                        FieldSchema::optional("label", ConfigSchema::string()),
                    ])),
                ),
            ]))
            .multiple_outputs()
            .build(),
        CatalogEntry::builder(types::DELAY, "Delay", NodeCategory::Logic)
            .description("Waits before passing its input through")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("success", "Success"))
            .schema(ConfigSchema::object([FieldSchema::required(
                "duration_ms",
                ConfigSchema::integer_min(0.0),
            )]))
            // The sleep itself must fit inside the node deadline; the
            // invocation deadline still bounds the wait.
            .default_timeout(Duration::from_secs(3_600))
            .build(),
        CatalogEntry::builder(types::RETRY, "Retry", NodeCategory::Logic)
            .description("Wraps downstream work in an explicit retry policy")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("success", "Success"))
            .output(HandleSpec::output("max_retries", "Max Retries"))
            .schema(ConfigSchema::object([
                FieldSchema::with_default("max_attempts", ConfigSchema::integer_min(1.0), json!(3)),
                FieldSchema::with_default(
                    "initial_delay_ms",
                    ConfigSchema::integer_min(0.0),
                    json!(1_000),
                ),
                FieldSchema::with_default("backoff_multiplier", ConfigSchema::number(), json!(2.0)),
                FieldSchema::with_default(
                    "max_delay_ms",
                    ConfigSchema::integer_min(0.0),
                    json!(30_000),
                ),
            ]))
            .multiple_outputs()
            .build(),
        CatalogEntry::builder(types::RATE_LIMIT, "Rate Limit", NodeCategory::Logic)
            .description("Caps how often the branch below it may run")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("success", "Success"))
            .output(HandleSpec::output("limited", "Limited"))
            .schema(ConfigSchema::object([
                FieldSchema::required("max_requests", ConfigSchema::integer_min(1.0)),
                FieldSchema::required("window_ms", ConfigSchema::integer_min(1.0)),
                FieldSchema::with_default(
                    "strategy",
                    ConfigSchema::string_one_of(["fixed", "sliding"]),
                    json!("fixed"),
                ),
                FieldSchema::optional("key", ConfigSchema::string()),
            ]))
            .multiple_outputs()
            .build(),
        CatalogEntry::builder(types::MERGE, "Merge", NodeCategory::Logic)
            .description("Joins parallel branches into one output")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("success", "Success"))
            .schema(ConfigSchema::object([FieldSchema::with_default(
                "strategy",
                ConfigSchema::string_one_of(["first", "last", "all", "merge"]),
                json!("merge"),
            )]))
            .multiple_inputs()
            .build(),
    ]
}

fn state() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::builder(types::SESSION_READ, "Session Read", NodeCategory::State)
            .description("Projects keys from the session data into the output")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("success", "Success"))
            .schema(ConfigSchema::object([FieldSchema::optional(
                "keys",
                ConfigSchema::array(ConfigSchema::string()),
            )]))
            .requires_session()
            .build(),
        CatalogEntry::builder(types::SESSION_WRITE, "Session Write", NodeCategory::State)
            .description("Writes rendered values into the session data")
            .input(HandleSpec::input("input", "Input"))
            .output(HandleSpec::output("success", "Success"))
            .schema(ConfigSchema::object([
                FieldSchema::required("data", ConfigSchema::map(ConfigSchema::string())),
                FieldSchema::with_default("merge", ConfigSchema::Bool, json!(true)),
            ]))
            .requires_session()
            .build(),
        CatalogEntry::builder(types::SESSION_END, "Session End", NodeCategory::State)
            .description("Closes the session; no further nodes execute")
            .input(HandleSpec::input("input", "Input"))
            .schema(ConfigSchema::object([FieldSchema::optional(
                "message",
                ConfigSchema::string(),
            )]))
            .requires_session()
            .ends_session()
            .build(),
    ]
}

/// `scheduled` requires a cron expression with 5 or 6 whitespace-separated
/// fields.
fn validate_cron_fields(config: &Map<String, Value>) -> Vec<SchemaViolation> {
    let Some(Value::String(expression)) = config.get("cron_expression") else {
        return vec![];
    };
    let fields = expression.split_whitespace().count();
    if fields == 5 || fields == 6 {
        vec![]
    } else {
        vec![SchemaViolation::new(
            "cron_expression",
            format!("cron expression must have 5 or 6 fields, found {fields}"),
        )]
    }
}

/// `play_ivr` requires exactly one of `text` or `audio_url`.
fn validate_ivr_source(config: &Map<String, Value>) -> Vec<SchemaViolation> {
    let has_text = matches!(config.get("text"), Some(Value::String(s)) if !s.is_empty());
    let has_audio = matches!(config.get("audio_url"), Some(Value::String(s)) if !s.is_empty());
    if has_text == has_audio {
        vec![SchemaViolation::new(
            "",
            "exactly one of text or audio_url is required",
        )]
    } else {
        vec![]
    }
}
