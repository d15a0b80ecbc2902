#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use relmap::fields::{CompositeField, RelationField};
use relmap::model::{CompositeInstance, Field, FieldValue, Item, ItemId, ItemType, Node, Schema, SiteId};
use relmap::store::{ContentStore, MemoryStore};
use relmap::{RelmapError, Result};

pub fn relation_field(handle: &str, name: &str) -> Field {
    Field::new(handle, name, Arc::new(RelationField::new("entries")))
}

pub fn composite_field(handle: &str, name: &str) -> Field {
    Field::new(handle, name, Arc::new(CompositeField::new("matrix")))
}

pub fn item(id: u64, item_type: ItemType, title: &str) -> Item {
    Item::new(id, item_type, 1, title)
}

pub fn block(id: u64, owner: u64, handle: &str) -> CompositeInstance {
    CompositeInstance {
        id: ItemId(id),
        owner_id: ItemId(owner),
        field_handle: handle.to_string(),
        sub_type: Some("text".to_string()),
        site_id: SiteId(1),
    }
}

/// Add items that have a schema holding one relation field, `related`.
pub fn add_linkable(store: &mut MemoryStore, items: &[Item]) {
    for item in items {
        store
            .add_item(item.clone())
            .set_schema(item.id, Schema::new(vec![relation_field("related", "Related")]));
    }
}

/// Wraps a store and injects failures or latency into selected calls.
pub struct FaultyStore<S> {
    inner: S,
    failing_queries: HashSet<ItemType>,
    slow_schemas: HashSet<ItemId>,
    latency: Duration,
}

impl<S: ContentStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_queries: HashSet::new(),
            slow_schemas: HashSet::new(),
            latency: Duration::ZERO,
        }
    }

    /// Every relation index lookup for `item_type` fails.
    pub fn fail_queries_for(mut self, item_type: ItemType) -> Self {
        self.failing_queries.insert(item_type);
        self
    }

    /// Schema reads of `id` take `latency` before answering.
    pub fn slow_schema(mut self, id: ItemId, latency: Duration) -> Self {
        self.slow_schemas.insert(id);
        self.latency = latency;
        self
    }
}

impl<S: ContentStore> ContentStore for FaultyStore<S> {
    fn field_schema(&self, node: Node<'_>) -> Result<Option<Schema>> {
        if self.slow_schemas.contains(&node.id()) {
            thread::sleep(self.latency);
        }
        self.inner.field_schema(node)
    }

    fn field_value(&self, node: Node<'_>, handle: &str) -> Result<FieldValue> {
        self.inner.field_value(node, handle)
    }

    fn query_related_to(&self, target: Node<'_>, item_type: ItemType, prefer_site: SiteId) -> Result<Vec<Item>> {
        if self.failing_queries.contains(&item_type) {
            return Err(RelmapError::Store(format!("{} index offline", item_type)));
        }
        self.inner.query_related_to(target, item_type, prefer_site)
    }

    fn composite_instances(&self, node: Node<'_>, handle: &str) -> Result<Vec<CompositeInstance>> {
        self.inner.composite_instances(node, handle)
    }
}
