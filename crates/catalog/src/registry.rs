//! The in-memory node type registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::entry::{CatalogEntry, NodeCategory};
use crate::schema::SchemaViolation;

/// Error type for catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// A node type was registered twice.
    #[error("node type `{0}` is already registered")]
    AlreadyRegistered(String),

    /// A node type is not in the catalog.
    #[error("unknown node type `{0}`")]
    NotFound(String),
}

/// Registry of node types, populated at startup and read-only afterwards.
///
/// Shared across threads behind an `Arc` — no interior locking is needed
/// because registration happens before the catalog is shared.
pub struct NodeCatalog {
    entries: HashMap<String, Arc<CatalogEntry>>,
}

impl NodeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a node type. Fails if the type already exists.
    pub fn register(&mut self, entry: CatalogEntry) -> Result<(), CatalogError> {
        if self.entries.contains_key(&entry.node_type) {
            return Err(CatalogError::AlreadyRegistered(entry.node_type));
        }
        self.entries.insert(entry.node_type.clone(), Arc::new(entry));
        Ok(())
    }

    /// Look up a node type.
    pub fn lookup(&self, node_type: &str) -> Result<Arc<CatalogEntry>, CatalogError> {
        self.entries
            .get(node_type)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(node_type.to_string()))
    }

    /// Whether a node type exists.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// All entries in a category.
    #[must_use]
    pub fn by_category(&self, category: NodeCategory) -> Vec<Arc<CatalogEntry>> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.category == category)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        entries
    }

    /// Validate a configuration for the given node type.
    ///
    /// Returns the collected violations (empty means valid), or
    /// [`CatalogError::NotFound`] for an unknown type.
    pub fn validate_config(
        &self,
        node_type: &str,
        config: &Map<String, Value>,
    ) -> Result<Vec<SchemaViolation>, CatalogError> {
        Ok(self.lookup(node_type)?.validate_config(config))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NodeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.entries.keys().collect();
        types.sort();
        f.debug_struct("NodeCatalog")
            .field("count", &self.entries.len())
            .field("types", &types)
            .finish()
    }
}
