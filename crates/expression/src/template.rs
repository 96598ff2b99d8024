//! `{{path}}` template parsing and rendering.
//!
//! A template is parsed once into static and placeholder parts, then
//! rendered against a [`Scope`]. Parsing never fails: an unclosed `{{`
//! is treated as static text, which keeps rendering total and idempotent.

use serde_json::{Map, Value};

use crate::scope::Scope;

/// A template part — static text or a placeholder to resolve.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text copied to the output unchanged.
    Static(String),
    /// A `{{path}}` placeholder.
    Placeholder {
        /// The dotted path inside the braces, trimmed.
        path: String,
        /// The original `{{ ... }}` text, reinserted verbatim when the
        /// path does not resolve.
        raw: String,
    },
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template string into parts.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut parts = Vec::new();
        let mut current_static = String::new();

        let chars: Vec<char> = source.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if i + 1 < len && chars[i] == '{' && chars[i + 1] == '{' {
                // Find the closing }}
                let mut j = i + 2;
                while j + 1 < len && !(chars[j] == '}' && chars[j + 1] == '}') {
                    j += 1;
                }

                if j + 1 < len {
                    if !current_static.is_empty() {
                        parts.push(TemplatePart::Static(std::mem::take(&mut current_static)));
                    }
                    let inner: String = chars[i + 2..j].iter().collect();
                    let raw: String = chars[i..j + 2].iter().collect();
                    parts.push(TemplatePart::Placeholder {
                        path: inner.trim().to_string(),
                        raw,
                    });
                    i = j + 2;
                } else {
                    // Unclosed `{{` — keep the remainder as static text.
                    current_static.extend(&chars[i..]);
                    i = len;
                }
            } else {
                current_static.push(chars[i]);
                i += 1;
            }
        }

        if !current_static.is_empty() {
            parts.push(TemplatePart::Static(current_static));
        }

        Self { parts }
    }

    /// The parsed parts.
    #[must_use]
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Whether the template contains any placeholders.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, TemplatePart::Placeholder { .. }))
    }

    /// Render against a scope.
    ///
    /// Placeholders whose path resolves to a non-null value are replaced
    /// by that value's text form; everything else is emitted verbatim.
    #[must_use]
    pub fn render(&self, scope: &Scope) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Static(text) => out.push_str(text),
                TemplatePart::Placeholder { path, raw } => match scope.resolve(path) {
                    Some(Value::Null) | None => out.push_str(raw),
                    Some(value) => out.push_str(&value_to_text(value)),
                },
            }
        }
        out
    }
}

/// Render a value into its template text form.
///
/// Strings render without surrounding quotes; compound values render as
/// compact JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse and render a template in one call.
#[must_use]
pub fn render(template: &str, scope: &Scope) -> String {
    // Fast path: nothing to substitute.
    if !template.contains("{{") {
        return template.to_string();
    }
    Template::parse(template).render(scope)
}

/// Apply [`render`] to every string value in a JSON value, recursively.
///
/// Non-string leaves are preserved unchanged.
#[must_use]
pub fn render_value(value: &Value, scope: &Scope) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, scope)),
        Value::Object(map) => Value::Object(render_map(map, scope)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, scope)).collect()),
        other => other.clone(),
    }
}

/// Apply [`render`] to every string value in a JSON object, recursively.
#[must_use]
pub fn render_map(map: &Map<String, Value>, scope: &Scope) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), render_value(v, scope)))
        .collect()
}
