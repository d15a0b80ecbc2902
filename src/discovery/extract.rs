//! Relation value extraction.
//!
//! Stores return relation values in three shapes: nothing, a single item, or
//! a collection. [`extract`] flattens all of them into an ordered list of
//! items and turns read failures into an empty list.

use super::{DiagnosticContext, DiagnosticKind, Session};
use crate::model::{FieldValue, Item, Node, ValueEntry};
use crate::store::ContentStore;

/// Items currently referenced by one relation field of `node`.
///
/// A failed read is recorded as a `FieldRead` diagnostic and yields nothing.
pub fn extract<S: ContentStore + ?Sized>(
    session: &mut Session<'_, S>,
    node: Node<'_>,
    handle: &str,
    path: Option<&str>,
) -> Vec<Item> {
    let value = session.guard(
        DiagnosticKind::FieldRead,
        || DiagnosticContext::node(node.id()).field(handle).path(path),
        |store| store.field_value(node, handle),
    );
    match value {
        Some(value) => normalize(value),
        None => Vec::new(),
    }
}

/// Flatten a raw field value into referenced items, dropping anything that is not an item.
pub fn normalize(value: FieldValue) -> Vec<Item> {
    match value {
        FieldValue::Empty => Vec::new(),
        FieldValue::Single(item) => vec![item],
        FieldValue::Collection(entries) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                ValueEntry::Item(item) => Some(item),
                ValueEntry::Other(raw) => {
                    log::debug!("Discarding non-item entry in relation value: {}", raw);
                    None
                }
            })
            .collect(),
        FieldValue::Scalar(raw) => {
            log::debug!("Discarding malformed relation value: {}", raw);
            Vec::new()
        }
    }
}
