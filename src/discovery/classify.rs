//! Field classification by capability.

use crate::fields::FieldKind;
use crate::model::{Field, Schema};

/// A schema field paired with its addressable handle and its kind.
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedField<'s> {
    pub field: &'s Field,
    pub handle: &'s str,
    pub kind: FieldKind,
}

/// Tag every addressable field of a schema. Fields without a handle are skipped.
pub fn classify(schema: &Schema) -> Vec<ClassifiedField<'_>> {
    schema
        .fields
        .iter()
        .filter_map(|field| {
            let handle = field.addressable_handle()?;
            Some(ClassifiedField {
                field,
                handle,
                kind: FieldKind::of(field.field_type.as_ref()),
            })
        })
        .collect()
}

pub fn relation_fields(schema: &Schema) -> impl Iterator<Item = ClassifiedField<'_>> {
    classify(schema).into_iter().filter(|f| f.kind == FieldKind::Relation)
}

pub fn composite_fields(schema: &Schema) -> impl Iterator<Item = ClassifiedField<'_>> {
    classify(schema)
        .into_iter()
        .filter(|f| matches!(f.kind, FieldKind::Composite { .. }))
}
