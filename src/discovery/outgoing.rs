//! Items the subject references directly.

use super::classify::relation_fields;
use super::extract::extract;
use super::{RelationSet, Session};
use crate::model::{Item, Node};
use crate::store::ContentStore;

/// Walk the subject's relation fields and collect every referenced item.
///
/// Self-references, unsupported types and items without a schema are
/// dropped. A failing field only removes that field's references.
pub fn resolve_outgoing<S: ContentStore + ?Sized>(session: &mut Session<'_, S>, subject: &Item) -> RelationSet {
    let mut relations = RelationSet::default();
    let node = Node::Item(subject);

    let schema = match session.schema_of(node, None) {
        Some(schema) => schema,
        None => return relations,
    };

    for field in relation_fields(&schema) {
        for item in extract(session, node, field.handle, None) {
            if item.id == subject.id {
                continue;
            }
            if !session.options().supports(item.item_type) {
                log::debug!(
                    "Skipping {} {} from field {}: type not targeted",
                    item.item_type,
                    item.id,
                    field.handle
                );
                continue;
            }
            if relations.contains(item.item_type, item.id) {
                continue;
            }
            if session.schema_of(Node::Item(&item), None).is_none() {
                continue;
            }
            relations.insert(item);
        }
    }

    relations
}
