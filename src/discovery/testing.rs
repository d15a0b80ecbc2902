//! Shared fixtures for the resolver unit tests.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{RelmapError, Result};
use crate::fields::{CompositeField, PlainField, RelationField};
use crate::model::{CompositeInstance, Field, FieldValue, Item, ItemId, ItemType, Node, Schema, SiteId};
use crate::store::{ContentStore, MemoryStore};

pub fn relation_field(handle: &str, name: &str) -> Field {
    Field::new(handle, name, Arc::new(RelationField::new("entries")))
}

pub fn composite_field(handle: &str, name: &str) -> Field {
    Field::new(handle, name, Arc::new(CompositeField::new("matrix")))
}

pub fn block_tree_field(handle: &str, name: &str) -> Field {
    Field::new(handle, name, Arc::new(CompositeField::requiring_sub_type("block_tree")))
}

pub fn plain_field(handle: &str, name: &str) -> Field {
    Field::new(handle, name, Arc::new(PlainField::new("plain_text")))
}

pub fn doc(id: u64, title: &str) -> Item {
    Item::new(id, ItemType::Document, 1, title)
}

pub fn tag(id: u64, title: &str) -> Item {
    Item::new(id, ItemType::TaxonomyNode, 1, title)
}

pub fn asset(id: u64, title: &str) -> Item {
    Item::new(id, ItemType::MediaAsset, 1, title)
}

pub fn block(id: u64, owner: u64, handle: &str, sub_type: Option<&str>) -> CompositeInstance {
    CompositeInstance {
        id: ItemId(id),
        owner_id: ItemId(owner),
        field_handle: handle.to_string(),
        sub_type: sub_type.map(str::to_string),
        site_id: SiteId(1),
    }
}

/// Add items with an empty schema so they count as resolvable.
pub fn add_items(store: &mut MemoryStore, items: &[Item]) {
    for item in items {
        store.add_item(item.clone());
        store.set_schema(item.id, Schema::default());
    }
}

/// Memory store with failures injected per node, field or query.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub failing_schemas: HashSet<ItemId>,
    pub failing_fields: HashSet<(ItemId, String)>,
    pub failing_queries: HashSet<(ItemId, ItemType)>,
    pub failing_instances: HashSet<(ItemId, String)>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

impl ContentStore for FlakyStore {
    fn field_schema(&self, node: Node<'_>) -> Result<Option<Schema>> {
        if self.failing_schemas.contains(&node.id()) {
            return Err(RelmapError::Store(format!("layout lookup failed for {}", node.id())));
        }
        self.inner.field_schema(node)
    }

    fn field_value(&self, node: Node<'_>, handle: &str) -> Result<FieldValue> {
        if self.failing_fields.contains(&(node.id(), handle.to_string())) {
            return Err(RelmapError::Store(format!("lazy load of {} failed", handle)));
        }
        self.inner.field_value(node, handle)
    }

    fn query_related_to(&self, target: Node<'_>, item_type: ItemType, prefer_site: SiteId) -> Result<Vec<Item>> {
        if self.failing_queries.contains(&(target.id(), item_type)) {
            return Err(RelmapError::Store("relation index unavailable".to_string()));
        }
        self.inner.query_related_to(target, item_type, prefer_site)
    }

    fn composite_instances(&self, node: Node<'_>, handle: &str) -> Result<Vec<CompositeInstance>> {
        if self.failing_instances.contains(&(node.id(), handle.to_string())) {
            return Err(RelmapError::Store(format!("blocks of {} unavailable", handle)));
        }
        self.inner.composite_instances(node, handle)
    }
}
