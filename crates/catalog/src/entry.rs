//! Catalog entries: the static description of a node type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::schema::{ConfigSchema, SchemaViolation};

/// The broad family a node type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Entry points that seed an invocation with an event payload.
    Trigger,
    /// Side-effecting steps (provider calls, HTTP requests).
    Action,
    /// Flow control (conditions, switches, delays, merges).
    Logic,
    /// Session state access.
    State,
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trigger => write!(f, "trigger"),
            Self::Action => write!(f, "action"),
            Self::Logic => write!(f, "logic"),
            Self::State => write!(f, "state"),
        }
    }
}

/// Direction of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleDirection {
    /// Receives data from an incoming edge.
    Input,
    /// Emits data onto outgoing edges.
    Output,
}

/// The shape of data flowing through a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataShape {
    /// Unconstrained.
    #[default]
    Any,
    /// A JSON object.
    Object,
    /// Plain text.
    Text,
    /// A number.
    Number,
    /// A boolean.
    Boolean,
    /// A list of values.
    List,
}

/// One input or output handle of a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleSpec {
    /// Stable handle id referenced by edge `source_handle`/`target_handle`.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Input or output.
    pub direction: HandleDirection,
    /// Data shape carried by the handle.
    #[serde(default)]
    pub shape: DataShape,
}

impl HandleSpec {
    /// An input handle.
    pub fn input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            direction: HandleDirection::Input,
            shape: DataShape::Any,
        }
    }

    /// An output handle.
    pub fn output(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            direction: HandleDirection::Output,
            shape: DataShape::Any,
        }
    }

    /// Override the handle's data shape.
    #[must_use]
    pub fn shaped(mut self, shape: DataShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Extra validation beyond what the declarative schema can express.
pub type CustomValidate = fn(&Map<String, Value>) -> Vec<SchemaViolation>;

/// The static description of one node type.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// The node type key (`send_sms`, `condition`, ...).
    pub node_type: String,
    /// Category of the type.
    pub category: NodeCategory,
    /// Human-readable name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Input handles (triggers have none).
    pub input_handles: Vec<HandleSpec>,
    /// Output handles.
    pub output_handles: Vec<HandleSpec>,
    /// Declarative schema of the node's configuration.
    pub config_schema: ConfigSchema,
    /// When set, only these source types may connect into this node.
    pub allowed_incoming_types: Option<Vec<String>>,
    /// When set, only these target types may be connected from this node.
    pub allowed_outgoing_types: Option<Vec<String>>,
    /// Whether the node needs an open session to run.
    pub requires_session: bool,
    /// Whether executing the node ends the session (and the invocation).
    pub ends_session: bool,
    /// Whether more than one incoming edge is allowed.
    pub allows_multiple_inputs: bool,
    /// Whether more than one outgoing edge is allowed.
    pub allows_multiple_outputs: bool,
    /// Default per-node timeout when the description does not set one.
    pub default_timeout: Option<Duration>,
    /// Default retry policy when the description does not set one.
    pub default_retry: Option<RetryPolicy>,
    /// Extra validation hook run after the declarative schema.
    pub custom_validate: Option<CustomValidate>,
}

impl CatalogEntry {
    /// Start building an entry.
    #[must_use]
    pub fn builder(
        node_type: impl Into<String>,
        name: impl Into<String>,
        category: NodeCategory,
    ) -> CatalogEntryBuilder {
        CatalogEntryBuilder {
            entry: CatalogEntry {
                node_type: node_type.into(),
                category,
                name: name.into(),
                description: String::new(),
                input_handles: Vec::new(),
                output_handles: Vec::new(),
                config_schema: ConfigSchema::Any,
                allowed_incoming_types: None,
                allowed_outgoing_types: None,
                requires_session: false,
                ends_session: false,
                allows_multiple_inputs: false,
                allows_multiple_outputs: false,
                default_timeout: None,
                default_retry: None,
                custom_validate: None,
            },
        }
    }

    /// Whether this type is a trigger.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }

    /// Validate a node configuration: declarative schema, then the custom
    /// hook if one is declared.
    #[must_use]
    pub fn validate_config(&self, config: &Map<String, Value>) -> Vec<SchemaViolation> {
        let mut violations = self.config_schema.validate(&Value::Object(config.clone()));
        if violations.is_empty() {
            if let Some(custom) = self.custom_validate {
                violations.extend(custom(config));
            }
        }
        violations
    }
}

/// Builder for [`CatalogEntry`].
#[derive(Debug)]
pub struct CatalogEntryBuilder {
    entry: CatalogEntry,
}

impl CatalogEntryBuilder {
    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.entry.description = description.into();
        self
    }

    /// Add an input handle.
    #[must_use]
    pub fn input(mut self, handle: HandleSpec) -> Self {
        self.entry.input_handles.push(handle);
        self
    }

    /// Add an output handle.
    #[must_use]
    pub fn output(mut self, handle: HandleSpec) -> Self {
        self.entry.output_handles.push(handle);
        self
    }

    /// Set the config schema.
    #[must_use]
    pub fn schema(mut self, schema: ConfigSchema) -> Self {
        self.entry.config_schema = schema;
        self
    }

    /// Restrict which node types may connect into this one.
    #[must_use]
    pub fn allowed_incoming<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.entry.allowed_incoming_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict which node types this one may connect to.
    #[must_use]
    pub fn allowed_outgoing<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.entry.allowed_outgoing_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Mark the type as requiring an open session.
    #[must_use]
    pub fn requires_session(mut self) -> Self {
        self.entry.requires_session = true;
        self
    }

    /// Mark the type as ending the session.
    #[must_use]
    pub fn ends_session(mut self) -> Self {
        self.entry.ends_session = true;
        self
    }

    /// Allow multiple incoming edges.
    #[must_use]
    pub fn multiple_inputs(mut self) -> Self {
        self.entry.allows_multiple_inputs = true;
        self
    }

    /// Allow multiple outgoing edges.
    #[must_use]
    pub fn multiple_outputs(mut self) -> Self {
        self.entry.allows_multiple_outputs = true;
        self
    }

    /// Set the default timeout.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.entry.default_timeout = Some(timeout);
        self
    }

    /// Set the default retry policy.
    #[must_use]
    pub fn default_retry(mut self, policy: RetryPolicy) -> Self {
        self.entry.default_retry = Some(policy);
        self
    }

    /// Attach a custom validation hook.
    #[must_use]
    pub fn custom_validate(mut self, hook: CustomValidate) -> Self {
        self.entry.custom_validate = Some(hook);
        self
    }

    /// Finish the entry.
    #[must_use]
    pub fn build(self) -> CatalogEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::json;

    fn entry_with_hook() -> CatalogEntry {
        fn exactly_one(config: &Map<String, Value>) -> Vec<SchemaViolation> {
            let has_text = config.get("text").is_some();
            let has_audio = config.get("audio_url").is_some();
            if has_text == has_audio {
                vec![SchemaViolation::new(
                    "",
                    "exactly one of text or audio_url is required",
                )]
            } else {
                vec![]
            }
        }

        CatalogEntry::builder("play_ivr", "Play IVR", NodeCategory::Action)
            .schema(ConfigSchema::object([
                FieldSchema::optional("text", ConfigSchema::string()),
                FieldSchema::optional("audio_url", ConfigSchema::string()),
            ]))
            .custom_validate(exactly_one)
            .build()
    }

    #[test]
    fn builder_sets_flags() {
        let entry = CatalogEntry::builder("session_end", "End Session", NodeCategory::State)
            .requires_session()
            .ends_session()
            .build();
        assert!(entry.requires_session);
        assert!(entry.ends_session);
        assert!(!entry.allows_multiple_inputs);
        assert!(!entry.is_trigger());
    }

    #[test]
    fn custom_hook_runs_after_schema() {
        let entry = entry_with_hook();

        let config = match json!({"text": "welcome"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(entry.validate_config(&config).is_empty());

        let both = match json!({"text": "a", "audio_url": "b"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let violations = entry.validate_config(&both);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("exactly one"));

        let neither = Map::new();
        assert_eq!(entry.validate_config(&neither).len(), 1);
    }

    #[test]
    fn custom_hook_skipped_when_schema_fails() {
        let entry = entry_with_hook();
        let config = match json!({"text": 42}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let violations = entry.validate_config(&config);
        // Only the type violation; the hook did not add a second entry.
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "text");
    }

    #[test]
    fn category_display() {
        assert_eq!(NodeCategory::Trigger.to_string(), "trigger");
        assert_eq!(NodeCategory::State.to_string(), "state");
    }
}
