use super::{CompositeCapable, FieldType, RelationCapable};

/// Field holding references to other items (entries, categories, assets).
#[derive(Debug, Clone)]
pub struct RelationField {
    name: String,
}

impl RelationField {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RelationCapable for RelationField {}

impl FieldType for RelationField {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_relation(&self) -> Option<&dyn RelationCapable> {
        Some(self)
    }
}

/// Field holding repeatable blocks, each with its own schema.
#[derive(Debug, Clone)]
pub struct CompositeField {
    name: String,
    requires_sub_type: bool,
}

impl CompositeField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires_sub_type: false,
        }
    }

    /// Block field whose blocks must declare a block type to be usable.
    pub fn requiring_sub_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires_sub_type: true,
        }
    }
}

impl CompositeCapable for CompositeField {
    fn requires_sub_type(&self) -> bool {
        self.requires_sub_type
    }
}

impl FieldType for CompositeField {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_composite(&self) -> Option<&dyn CompositeCapable> {
        Some(self)
    }
}

/// Any field the engine ignores.
#[derive(Debug, Clone)]
pub struct PlainField {
    name: String,
}

impl PlainField {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl FieldType for PlainField {
    fn name(&self) -> &str {
        &self.name
    }
}
