//! Field types and the capabilities the discovery engine understands.
//!
//! A field's kind is derived from what its type can do, not from what it is
//! called. A third-party field type that holds references implements
//! [`RelationCapable`] and is treated exactly like the built-in relation
//! fields; one that holds nested blocks implements [`CompositeCapable`].

mod builtin;

pub use builtin::{CompositeField, PlainField, RelationField};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Capability of fields whose value references other items.
///
/// Values of such fields must come back from the store as
/// [`FieldValue::Single`](crate::model::FieldValue) or
/// [`FieldValue::Collection`](crate::model::FieldValue).
pub trait RelationCapable: Send + Sync {}

/// Capability of fields whose value is an ordered list of nested instances.
pub trait CompositeCapable: Send + Sync {
    /// Whether instances are meaningless without a declared sub-type.
    fn requires_sub_type(&self) -> bool {
        false
    }
}

/// A field type as registered with a store.
pub trait FieldType: fmt::Debug + Send + Sync {
    /// Registry name, e.g. `entries` or `matrix`.
    fn name(&self) -> &str;

    fn as_relation(&self) -> Option<&dyn RelationCapable> {
        None
    }

    fn as_composite(&self) -> Option<&dyn CompositeCapable> {
        None
    }
}

/// Closed classification of a field, derived from its type's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Relation,
    Composite { requires_sub_type: bool },
    Other,
}

impl FieldKind {
    /// Relation capability wins when a type declares both.
    pub fn of(field_type: &dyn FieldType) -> Self {
        if field_type.as_relation().is_some() {
            FieldKind::Relation
        } else if let Some(composite) = field_type.as_composite() {
            FieldKind::Composite {
                requires_sub_type: composite.requires_sub_type(),
            }
        } else {
            FieldKind::Other
        }
    }
}

/// Name → field type lookup used by stores that persist type names.
pub struct FieldTypeRegistry {
    types: HashMap<String, Arc<dyn FieldType>>,
}

impl FieldTypeRegistry {
    /// Create a registry with all built-in field types
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(RelationField::new("entries")));
        registry.register(Arc::new(RelationField::new("categories")));
        registry.register(Arc::new(RelationField::new("assets")));
        registry.register(Arc::new(CompositeField::new("matrix")));
        registry.register(Arc::new(CompositeField::requiring_sub_type("block_tree")));
        registry.register(Arc::new(PlainField::new("plain_text")));
        registry.register(Arc::new(PlainField::new("number")));
        registry.register(Arc::new(PlainField::new("toggle")));
        registry.register(Arc::new(PlainField::new("date")));

        registry
    }

    /// Registry with no types at all.
    pub fn empty() -> Self {
        Self { types: HashMap::new() }
    }

    /// Register a field type, replacing any previous type of the same name.
    pub fn register(&mut self, field_type: Arc<dyn FieldType>) {
        self.types.insert(field_type.name().to_string(), field_type);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FieldType>> {
        self.types.get(name).cloned()
    }

    /// Look up a type; unknown names become plain fields so the engine ignores them.
    pub fn resolve(&self, name: &str) -> Arc<dyn FieldType> {
        match self.get(name) {
            Some(field_type) => field_type,
            None => {
                log::debug!("Unknown field type '{}', treating as plain field", name);
                Arc::new(PlainField::new(name))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
