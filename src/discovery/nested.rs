//! Relations found inside composite fields.
//!
//! Composite fields hold instances that carry their own schema and may hold
//! further composite fields. The walk uses an explicit stack instead of
//! recursion and visits instances depth-first in field order, so results come
//! out in the order a reader scans the item. An instance that appears among
//! its own ancestors is not entered again, and nothing deeper than
//! `max_nesting_depth` is visited. An instance shared by two owners is visited
//! under each of them.
//!
//! Results are keyed by nesting path: the display names of the composite
//! fields passed through, joined with [`PATH_SEPARATOR`].

use std::collections::HashSet;
use std::rc::Rc;

use super::classify::{composite_fields, relation_fields};
use super::extract::extract;
use super::{DiagnosticContext, DiagnosticKind, NestedRelationSet, Session, PATH_SEPARATOR};
use crate::fields::FieldKind;
use crate::model::{CompositeInstance, Item, ItemId, Node, Schema};
use crate::store::ContentStore;

enum Owner {
    Item(Item),
    Instance(CompositeInstance),
}

impl Owner {
    fn as_node(&self) -> Node<'_> {
        match self {
            Owner::Item(item) => Node::Item(item),
            Owner::Instance(instance) => Node::Instance(instance),
        }
    }
}

enum Frame {
    /// Expand one composite field of `owner` into its instances.
    Field {
        owner: Rc<Owner>,
        ancestors: Rc<Vec<ItemId>>,
        handle: String,
        path: String,
        requires_sub_type: bool,
        depth: usize,
    },
    /// Collect one instance's relations, then descend into its composite fields.
    Visit {
        instance: CompositeInstance,
        ancestors: Rc<Vec<ItemId>>,
        path: String,
        depth: usize,
    },
}

/// Walk the subject's composite sub-tree and collect related items per nesting path.
pub fn resolve_nested<S: ContentStore + ?Sized>(session: &mut Session<'_, S>, subject: &Item) -> NestedRelationSet {
    let mut nested = NestedRelationSet::default();

    let schema = match session.schema_of(Node::Item(subject), None) {
        Some(schema) => schema,
        None => return nested,
    };

    let mut stack = Vec::new();
    push_fields(
        &mut stack,
        Rc::new(Owner::Item(subject.clone())),
        Rc::new(vec![subject.id]),
        &schema,
        None,
        0,
    );

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Field {
                owner,
                ancestors,
                handle,
                path,
                requires_sub_type,
                depth,
            } => {
                let node = owner.as_node();
                let instances = session.guard(
                    DiagnosticKind::StoreQuery,
                    || DiagnosticContext::node(node.id()).field(&handle).path(Some(&path)),
                    |store| store.composite_instances(node, &handle),
                );
                let instances = match instances {
                    Some(instances) => instances,
                    None => continue,
                };

                for instance in instances.into_iter().rev() {
                    if requires_sub_type && instance.sub_type.is_none() {
                        log::debug!("Skipping instance {} in {}: no declared sub-type", instance.id, path);
                        continue;
                    }
                    stack.push(Frame::Visit {
                        instance,
                        ancestors: Rc::clone(&ancestors),
                        path: path.clone(),
                        depth: depth + 1,
                    });
                }
            }
            Frame::Visit {
                instance,
                ancestors,
                path,
                depth,
            } => {
                if ancestors.contains(&instance.id) {
                    session.record(
                        DiagnosticKind::Cycle,
                        DiagnosticContext::node(instance.id).path(Some(&path)),
                        "instance contains itself, not descending again",
                    );
                    continue;
                }

                let schema = match session.schema_of(Node::Instance(&instance), Some(&path)) {
                    Some(schema) => schema,
                    None => continue,
                };

                collect_instance_relations(session, &instance, &schema, subject.id, &path, &mut nested);

                if composite_fields(&schema).next().is_none() {
                    continue;
                }
                if depth >= session.options().max_nesting_depth {
                    session.record(
                        DiagnosticKind::DepthLimit,
                        DiagnosticContext::node(instance.id).path(Some(&path)),
                        format!("not descending past depth {}", depth),
                    );
                    continue;
                }
                let mut chain = Vec::with_capacity(ancestors.len() + 1);
                chain.extend_from_slice(&ancestors);
                chain.push(instance.id);
                push_fields(
                    &mut stack,
                    Rc::new(Owner::Instance(instance)),
                    Rc::new(chain),
                    &schema,
                    Some(&path),
                    depth,
                );
            }
        }
    }

    nested
}

/// Push one frame per composite field, reversed so the first field is popped first.
fn push_fields(
    stack: &mut Vec<Frame>,
    owner: Rc<Owner>,
    ancestors: Rc<Vec<ItemId>>,
    schema: &Schema,
    prefix: Option<&str>,
    depth: usize,
) {
    let fields: Vec<_> = composite_fields(schema).collect();
    for field in fields.into_iter().rev() {
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, PATH_SEPARATOR, field.field.name),
            None => field.field.name.clone(),
        };
        let requires_sub_type = matches!(field.kind, FieldKind::Composite { requires_sub_type: true });
        stack.push(Frame::Field {
            owner: Rc::clone(&owner),
            ancestors: Rc::clone(&ancestors),
            handle: field.handle.to_string(),
            path,
            requires_sub_type,
            depth,
        });
    }
}

/// Query-then-verify discovery scoped to one instance.
///
/// Candidates come from the relation index; only those the instance's own
/// relation fields reference, and that have a schema, are kept.
fn collect_instance_relations<S: ContentStore + ?Sized>(
    session: &mut Session<'_, S>,
    instance: &CompositeInstance,
    schema: &Schema,
    subject_id: ItemId,
    path: &str,
    nested: &mut NestedRelationSet,
) {
    let node = Node::Instance(instance);
    let mut referenced: Option<HashSet<ItemId>> = None;

    for &item_type in &session.options().target_types {
        let candidates = session.guard(
            DiagnosticKind::StoreQuery,
            || DiagnosticContext::node(instance.id).target(item_type).path(Some(path)),
            |store| store.query_related_to(node, item_type, instance.site_id),
        );
        let candidates = match candidates {
            Some(candidates) => candidates,
            None => continue,
        };

        for candidate in candidates {
            if candidate.id == subject_id || candidate.item_type != item_type {
                continue;
            }
            if nested.contains(path, item_type, candidate.id) {
                continue;
            }
            let referenced = referenced.get_or_insert_with(|| referenced_ids(session, node, schema, path));
            if !referenced.contains(&candidate.id) {
                log::debug!(
                    "Index listed {} {} for instance {}, but the instance does not reference it",
                    candidate.item_type,
                    candidate.id,
                    instance.id
                );
                continue;
            }
            if session.schema_of(Node::Item(&candidate), Some(path)).is_none() {
                continue;
            }
            nested.insert(path, candidate);
        }
    }
}

fn referenced_ids<S: ContentStore + ?Sized>(
    session: &mut Session<'_, S>,
    node: Node<'_>,
    schema: &Schema,
    path: &str,
) -> HashSet<ItemId> {
    let mut ids = HashSet::new();
    for field in relation_fields(schema) {
        ids.extend(extract(session, node, field.handle, Some(path)).into_iter().map(|item| item.id));
    }
    ids
}
