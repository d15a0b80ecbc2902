//! Content Store abstraction and its implementations.
//!
//! The discovery engine only ever reads through [`ContentStore`]. Two
//! implementations ship with the crate: an in-process [`MemoryStore`] and a
//! SQLite-backed [`SqliteStore`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use crate::error::Result;
use crate::model::{CompositeInstance, FieldValue, Item, ItemType, Node, Schema, SiteId};

/// Read-only view of a content-graph store.
pub trait ContentStore: Send + Sync {
    /// Schema of an item or composite instance; `None` when none is configured.
    fn field_schema(&self, node: Node<'_>) -> Result<Option<Schema>>;

    /// Current value of one field of a node.
    fn field_value(&self, node: Node<'_>, handle: &str) -> Result<FieldValue>;

    /// Items of `item_type` the relation index links to `target` in either
    /// direction, one per item id, preferring variants from `prefer_site`.
    /// The target itself may be included.
    fn query_related_to(&self, target: Node<'_>, item_type: ItemType, prefer_site: SiteId) -> Result<Vec<Item>>;

    /// Instances currently held by a composite field, in field order.
    fn composite_instances(&self, node: Node<'_>, handle: &str) -> Result<Vec<CompositeInstance>>;
}

impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    fn field_schema(&self, node: Node<'_>) -> Result<Option<Schema>> {
        (**self).field_schema(node)
    }

    fn field_value(&self, node: Node<'_>, handle: &str) -> Result<FieldValue> {
        (**self).field_value(node, handle)
    }

    fn query_related_to(&self, target: Node<'_>, item_type: ItemType, prefer_site: SiteId) -> Result<Vec<Item>> {
        (**self).query_related_to(target, item_type, prefer_site)
    }

    fn composite_instances(&self, node: Node<'_>, handle: &str) -> Result<Vec<CompositeInstance>> {
        (**self).composite_instances(node, handle)
    }
}
