//! Items that reference the subject.
//!
//! The store's relation index is only a candidate source: it matches in both
//! directions and may keep rows for fields that no longer exist. Each
//! candidate is confirmed by reading its own relation fields.

use super::classify::relation_fields;
use super::extract::extract;
use super::{DiagnosticContext, DiagnosticKind, RelationSet, Session};
use crate::model::{Item, ItemId, ItemType, Node};
use crate::store::ContentStore;

/// Query candidates per target type, keep only those that really reference `subject`.
pub fn resolve_incoming<S: ContentStore + ?Sized>(
    session: &mut Session<'_, S>,
    subject: &Item,
    target_types: &[ItemType],
) -> RelationSet {
    let mut relations = RelationSet::default();

    for &item_type in target_types {
        let candidates = session.guard(
            DiagnosticKind::StoreQuery,
            || DiagnosticContext::node(subject.id).target(item_type),
            |store| store.query_related_to(Node::Item(subject), item_type, subject.site_id),
        );
        let candidates = match candidates {
            Some(candidates) => candidates,
            None => continue,
        };

        for candidate in candidates {
            if candidate.id == subject.id || candidate.item_type != item_type {
                continue;
            }
            if relations.contains(item_type, candidate.id) {
                continue;
            }
            if references(session, Node::Item(&candidate), subject.id, None) {
                relations.insert(candidate);
            } else {
                log::debug!(
                    "Index listed {} {} as related to {}, but none of its fields reference it",
                    candidate.item_type,
                    candidate.id,
                    subject.id
                );
            }
        }
    }

    relations
}

/// Whether any relation field of `node` currently holds `target`.
///
/// Stops at the first field that does. A node without a schema references nothing.
pub fn references<S: ContentStore + ?Sized>(
    session: &mut Session<'_, S>,
    node: Node<'_>,
    target: ItemId,
    path: Option<&str>,
) -> bool {
    let schema = match session.schema_of(node, path) {
        Some(schema) => schema,
        None => return false,
    };

    for field in relation_fields(&schema) {
        if extract(session, node, field.handle, path)
            .iter()
            .any(|item| item.id == target)
        {
            return true;
        }
    }
    false
}
