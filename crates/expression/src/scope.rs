//! Variable scope for template resolution.

use serde_json::{Map, Value};

/// A layered variable scope templates resolve against.
///
/// Internally a single JSON object; layering is expressed by overlay
/// order — later [`Scope::overlay`] calls win over earlier values for
/// the same top-level key. Dotted paths walk nested objects and index
/// into arrays.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    root: Map<String, Value>,
}

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self { root: Map::new() }
    }

    /// Create a scope from an existing JSON object.
    #[must_use]
    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Set a single top-level key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.root.insert(key.into(), value);
    }

    /// Overlay every key of `layer` onto this scope; `layer` wins.
    pub fn overlay(&mut self, layer: &Map<String, Value>) {
        for (key, value) in layer {
            self.root.insert(key.clone(), value.clone());
        }
    }

    /// Resolve a dotted path to a value.
    ///
    /// Object members are looked up by key, array elements by numeric
    /// index. Returns `None` for any missing segment.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// The underlying JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Consume the scope, returning the underlying JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.root
    }
}

impl From<Map<String, Value>> for Scope {
    fn from(root: Map<String, Value>) -> Self {
        Self::from_map(root)
    }
}
