use std::sync::Arc;

use crate::fields::FieldType;

/// A field descriptor within a schema.
#[derive(Debug, Clone)]
pub struct Field {
    /// Addressing key; fields without one cannot be read.
    pub handle: Option<String>,
    /// Display name, used to build nesting paths.
    pub name: String,
    pub field_type: Arc<dyn FieldType>,
}

impl Field {
    pub fn new(handle: impl Into<String>, name: impl Into<String>, field_type: Arc<dyn FieldType>) -> Self {
        Self {
            handle: Some(handle.into()),
            name: name.into(),
            field_type,
        }
    }

    /// A field the store knows about but cannot address.
    pub fn unaddressable(name: impl Into<String>, field_type: Arc<dyn FieldType>) -> Self {
        Self {
            handle: None,
            name: name.into(),
            field_type,
        }
    }

    /// Handle, if present and non-empty.
    pub fn addressable_handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|h| !h.is_empty())
    }
}

/// Ordered field list of one item or one composite instance.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
