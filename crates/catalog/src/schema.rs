//! Declarative configuration schemas.
//!
//! Schemas are plain data composed from combinators, so node definitions
//! can describe their configuration shape without custom validation code.
//! Validation walks the config value alongside the schema and collects
//! every violation with its dotted path.
//!
//! String rules (enum, pattern, length) are skipped for values that still
//! contain `{{ }}` placeholders — those are validated after rendering, at
//! execution time.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// A single schema violation, addressed by dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// Dotted path to the offending value (`""` for the root).
    pub path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl SchemaViolation {
    /// Create a violation.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A declarative schema for a configuration value.
#[derive(Debug, Clone, Default)]
pub enum ConfigSchema {
    /// Any value is accepted.
    #[default]
    Any,
    /// A boolean.
    Bool,
    /// A string, optionally constrained.
    String(StringSchema),
    /// A number, optionally constrained.
    Number(NumberSchema),
    /// An array with uniformly-typed items.
    Array {
        /// Schema every item must satisfy.
        items: Box<ConfigSchema>,
    },
    /// An object with arbitrary keys and uniformly-typed values.
    Map {
        /// Schema every value must satisfy.
        values: Box<ConfigSchema>,
    },
    /// An object with declared fields.
    Object(ObjectSchema),
}

/// Constraints on a string value.
#[derive(Debug, Clone, Default)]
pub struct StringSchema {
    /// Closed set of allowed values.
    pub one_of: Option<Vec<String>>,
    /// Regex the full value must match.
    pub pattern: Option<Regex>,
    /// Minimum length in characters.
    pub min_len: Option<usize>,
    /// Maximum length in characters.
    pub max_len: Option<usize>,
}

/// Constraints on a numeric value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberSchema {
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
    /// Whether the value must be an integer.
    pub integer: bool,
}

/// An object schema: declared fields plus an unknown-key policy.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    /// The declared fields.
    pub fields: Vec<FieldSchema>,
    /// Whether keys outside `fields` are tolerated.
    pub allow_unknown: bool,
}

/// One declared field of an object schema.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Schema the field value must satisfy.
    pub schema: ConfigSchema,
    /// Whether the field must be present.
    pub required: bool,
    /// Value filled in when an optional field is absent.
    pub default: Option<Value>,
}

impl FieldSchema {
    /// A required field.
    pub fn required(name: impl Into<String>, schema: ConfigSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
            default: None,
        }
    }

    /// An optional field with no default.
    pub fn optional(name: impl Into<String>, schema: ConfigSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            default: None,
        }
    }

    /// An optional field filled with `default` when absent.
    pub fn with_default(name: impl Into<String>, schema: ConfigSchema, default: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            default: Some(default),
        }
    }
}

impl ConfigSchema {
    /// An unconstrained string.
    #[must_use]
    pub fn string() -> Self {
        Self::String(StringSchema::default())
    }

    /// A string restricted to a closed set of values.
    #[must_use]
    pub fn string_one_of<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::String(StringSchema {
            one_of: Some(values.into_iter().map(Into::into).collect()),
            ..StringSchema::default()
        })
    }

    /// A string matching a regex pattern.
    ///
    /// # Panics
    /// Panics if the pattern is not a valid regex; schemas are built from
    /// literals at startup, so a bad pattern is a programming error.
    #[must_use]
    pub fn string_pattern(pattern: &str) -> Self {
        Self::String(StringSchema {
            pattern: Some(Regex::new(pattern).expect("invalid schema pattern")),
            ..StringSchema::default()
        })
    }

    /// A non-empty string.
    #[must_use]
    pub fn string_non_empty() -> Self {
        Self::String(StringSchema {
            min_len: Some(1),
            ..StringSchema::default()
        })
    }

    /// An unconstrained number.
    #[must_use]
    pub fn number() -> Self {
        Self::Number(NumberSchema::default())
    }

    /// An integer with an inclusive lower bound.
    #[must_use]
    pub fn integer_min(min: f64) -> Self {
        Self::Number(NumberSchema {
            min: Some(min),
            integer: true,
            ..NumberSchema::default()
        })
    }

    /// An array of uniformly-typed items.
    #[must_use]
    pub fn array(items: ConfigSchema) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    /// An open object with uniformly-typed values.
    #[must_use]
    pub fn map(values: ConfigSchema) -> Self {
        Self::Map {
            values: Box::new(values),
        }
    }

    /// An object with declared fields; unknown keys are tolerated.
    #[must_use]
    pub fn object(fields: impl IntoIterator<Item = FieldSchema>) -> Self {
        Self::Object(ObjectSchema {
            fields: fields.into_iter().collect(),
            allow_unknown: true,
        })
    }

    /// Validate a value, collecting every violation.
    #[must_use]
    pub fn validate(&self, value: &Value) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        self.validate_at(value, "", &mut violations);
        violations
    }

    /// Insert defaults for absent optional fields of an object schema.
    ///
    /// Only the top level is filled; nested defaults would complicate the
    /// merge semantics without a current use.
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        if let Self::Object(object) = self {
            for field in &object.fields {
                if let Some(default) = &field.default {
                    config
                        .entry(field.name.clone())
                        .or_insert_with(|| default.clone());
                }
            }
        }
    }

    fn validate_at(&self, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
        match self {
            Self::Any => {}
            Self::Bool => {
                if !value.is_boolean() {
                    out.push(type_violation(path, "boolean", value));
                }
            }
            Self::String(rules) => validate_string(rules, value, path, out),
            Self::Number(rules) => validate_number(rules, value, path, out),
            Self::Array { items } => match value {
                Value::Array(entries) => {
                    for (index, entry) in entries.iter().enumerate() {
                        items.validate_at(entry, &child_path(path, &index.to_string()), out);
                    }
                }
                other => out.push(type_violation(path, "array", other)),
            },
            Self::Map { values } => match value {
                Value::Object(entries) => {
                    for (key, entry) in entries {
                        values.validate_at(entry, &child_path(path, key), out);
                    }
                }
                other => out.push(type_violation(path, "object", other)),
            },
            Self::Object(object) => match value {
                Value::Object(entries) => {
                    for field in &object.fields {
                        match entries.get(&field.name) {
                            Some(entry) => {
                                field
                                    .schema
                                    .validate_at(entry, &child_path(path, &field.name), out);
                            }
                            None if field.required => out.push(SchemaViolation::new(
                                child_path(path, &field.name),
                                "required field is missing",
                            )),
                            None => {}
                        }
                    }
                    if !object.allow_unknown {
                        for key in entries.keys() {
                            if !object.fields.iter().any(|f| &f.name == key) {
                                out.push(SchemaViolation::new(
                                    child_path(path, key),
                                    "unknown field",
                                ));
                            }
                        }
                    }
                }
                other => out.push(type_violation(path, "object", other)),
            },
        }
    }
}

fn validate_string(rules: &StringSchema, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Value::String(s) = value else {
        out.push(type_violation(path, "string", value));
        return;
    };

    // Placeholder-bearing values are rendered at execution time; content
    // rules cannot be checked until then.
    if s.contains("{{") {
        return;
    }

    if let Some(allowed) = &rules.one_of {
        if !allowed.iter().any(|a| a == s) {
            out.push(SchemaViolation::new(
                path,
                format!("must be one of: {}", allowed.join(", ")),
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        if !pattern.is_match(s) {
            out.push(SchemaViolation::new(
                path,
                format!("must match pattern {}", pattern.as_str()),
            ));
        }
    }
    if let Some(min) = rules.min_len {
        if s.chars().count() < min {
            out.push(SchemaViolation::new(
                path,
                format!("must be at least {min} characters"),
            ));
        }
    }
    if let Some(max) = rules.max_len {
        if s.chars().count() > max {
            out.push(SchemaViolation::new(
                path,
                format!("must be at most {max} characters"),
            ));
        }
    }
}

fn validate_number(rules: &NumberSchema, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(n) = value.as_f64() else {
        out.push(type_violation(path, "number", value));
        return;
    };

    if rules.integer && n.fract() != 0.0 {
        out.push(SchemaViolation::new(path, "must be an integer"));
    }
    if let Some(min) = rules.min {
        if n < min {
            out.push(SchemaViolation::new(path, format!("must be >= {min}")));
        }
    }
    if let Some(max) = rules.max {
        if n > max {
            out.push(SchemaViolation::new(path, format!("must be <= {max}")));
        }
    }
}

fn type_violation(path: &str, expected: &str, actual: &Value) -> SchemaViolation {
    SchemaViolation::new(path, format!("expected {expected}, got {}", json_type_name(actual)))
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Human-readable name of a JSON value's type.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
