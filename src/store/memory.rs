//! In-process content store.
//!
//! Holds items (one variant per site), schemas, field values and composite
//! instances in plain maps. The relation index is derived from the reference
//! values written through [`MemoryStore::set_references`], plus any stale
//! entries added explicitly to imitate an index that has drifted from the
//! content it describes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::json;

use super::ContentStore;
use crate::error::Result;
use crate::model::{CompositeInstance, FieldValue, Item, ItemId, ItemType, Node, Schema, SiteId, ValueEntry};

#[derive(Debug, Clone)]
enum StoredValue {
    References { targets: Vec<ItemId>, single: bool },
    Raw(FieldValue),
}

/// Content store backed by in-memory maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: BTreeMap<ItemId, Vec<Item>>,
    schemas: HashMap<ItemId, Schema>,
    values: HashMap<(ItemId, String), StoredValue>,
    instances: HashMap<(ItemId, String), Vec<CompositeInstance>>,
    stale_index: Vec<(ItemId, ItemId)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item variant. Adding the same id for another site adds a locale variant.
    pub fn add_item(&mut self, item: Item) -> &mut Self {
        let variants = self.items.entry(item.id).or_default();
        variants.retain(|v| v.site_id != item.site_id);
        variants.push(item);
        self
    }

    pub fn set_schema(&mut self, id: ItemId, schema: Schema) -> &mut Self {
        self.schemas.insert(id, schema);
        self
    }

    /// Multi-valued reference field.
    pub fn set_references(&mut self, source: ItemId, handle: &str, targets: &[ItemId]) -> &mut Self {
        self.values.insert(
            (source, handle.to_string()),
            StoredValue::References {
                targets: targets.to_vec(),
                single: false,
            },
        );
        self
    }

    /// Single-valued reference field.
    pub fn set_single_reference(&mut self, source: ItemId, handle: &str, target: ItemId) -> &mut Self {
        self.values.insert(
            (source, handle.to_string()),
            StoredValue::References {
                targets: vec![target],
                single: true,
            },
        );
        self
    }

    /// Store a value verbatim, bypassing the relation index.
    pub fn set_raw_value(&mut self, source: ItemId, handle: &str, value: FieldValue) -> &mut Self {
        self.values.insert((source, handle.to_string()), StoredValue::Raw(value));
        self
    }

    /// Append an instance to its owner's composite field.
    pub fn add_instance(&mut self, instance: CompositeInstance) -> &mut Self {
        self.instances
            .entry((instance.owner_id, instance.field_handle.clone()))
            .or_default()
            .push(instance);
        self
    }

    /// Index entry with no backing field value.
    pub fn add_stale_index_entry(&mut self, source: ItemId, target: ItemId) -> &mut Self {
        self.stale_index.push((source, target));
        self
    }

    /// Look up an item, preferring the variant from `prefer_site`.
    pub fn item(&self, id: ItemId, prefer_site: SiteId) -> Option<&Item> {
        let variants = self.items.get(&id)?;
        variants
            .iter()
            .find(|v| v.site_id == prefer_site)
            .or_else(|| variants.first())
    }

    fn index_edges(&self) -> impl Iterator<Item = (ItemId, ItemId)> + '_ {
        let from_values = self.values.iter().flat_map(|((source, _), value)| {
            let targets: &[ItemId] = match value {
                StoredValue::References { targets, .. } => targets,
                StoredValue::Raw(_) => &[],
            };
            targets.iter().map(move |target| (*source, *target))
        });
        from_values.chain(self.stale_index.iter().copied())
    }
}

impl ContentStore for MemoryStore {
    fn field_schema(&self, node: Node<'_>) -> Result<Option<Schema>> {
        Ok(self.schemas.get(&node.id()).cloned())
    }

    fn field_value(&self, node: Node<'_>, handle: &str) -> Result<FieldValue> {
        let stored = match self.values.get(&(node.id(), handle.to_string())) {
            Some(stored) => stored,
            None => return Ok(FieldValue::Empty),
        };

        let value = match stored {
            StoredValue::Raw(value) => value.clone(),
            StoredValue::References { targets, single: true } => {
                match targets.first().and_then(|id| self.item(*id, node.site_id())) {
                    Some(item) => FieldValue::Single(item.clone()),
                    None => FieldValue::Empty,
                }
            }
            StoredValue::References { targets, single: false } => FieldValue::Collection(
                targets
                    .iter()
                    .map(|id| match self.item(*id, node.site_id()) {
                        Some(item) => ValueEntry::Item(item.clone()),
                        None => ValueEntry::Other(json!({ "missing_id": id.0 })),
                    })
                    .collect(),
            ),
        };
        Ok(value)
    }

    fn query_related_to(&self, target: Node<'_>, item_type: ItemType, prefer_site: SiteId) -> Result<Vec<Item>> {
        let target_id = target.id();
        let ids: BTreeSet<ItemId> = self
            .index_edges()
            .filter_map(|(source, dest)| {
                if dest == target_id {
                    Some(source)
                } else if source == target_id {
                    Some(dest)
                } else {
                    None
                }
            })
            .collect();

        let mut related: Vec<Item> = ids
            .into_iter()
            .filter_map(|id| self.item(id, prefer_site))
            .filter(|item| item.item_type == item_type)
            .cloned()
            .collect();
        related.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(related)
    }

    fn composite_instances(&self, node: Node<'_>, handle: &str) -> Result<Vec<CompositeInstance>> {
        Ok(self
            .instances
            .get(&(node.id(), handle.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .add_item(Item::new(1, ItemType::Document, 1, "Home"))
            .add_item(Item::new(2, ItemType::Document, 1, "About"))
            .add_item(Item::new(2, ItemType::Document, 2, "Über uns"))
            .add_item(Item::new(3, ItemType::MediaAsset, 1, "Logo"));
        store
    }

    #[test]
    fn test_item_prefers_requested_site() {
        let store = store();
        assert_eq!(store.item(ItemId(2), SiteId(2)).unwrap().title, "Über uns");
        assert_eq!(store.item(ItemId(2), SiteId(9)).unwrap().title, "About");
        assert!(store.item(ItemId(99), SiteId(1)).is_none());
    }

    #[test]
    fn test_reference_values_resolve_items() {
        let mut store = store();
        store.set_references(ItemId(1), "related", &[ItemId(2), ItemId(404), ItemId(3)]);
        let home = store.item(ItemId(1), SiteId(1)).unwrap().clone();

        match store.field_value(Node::from(&home), "related").unwrap() {
            FieldValue::Collection(entries) => {
                assert_eq!(entries.len(), 3);
                assert!(matches!(entries[1], ValueEntry::Other(_)));
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert_eq!(store.field_value(Node::from(&home), "nothing").unwrap(), FieldValue::Empty);
    }

    #[test]
    fn test_query_matches_both_directions_and_stale_entries() {
        let mut store = store();
        store.set_references(ItemId(1), "related", &[ItemId(2)]);
        store.add_stale_index_entry(ItemId(3), ItemId(2));
        let about = store.item(ItemId(2), SiteId(1)).unwrap().clone();

        let docs = store
            .query_related_to(Node::from(&about), ItemType::Document, SiteId(1))
            .unwrap();
        assert_eq!(docs.iter().map(|i| i.id).collect::<Vec<_>>(), vec![ItemId(1)]);

        let assets = store
            .query_related_to(Node::from(&about), ItemType::MediaAsset, SiteId(1))
            .unwrap();
        assert_eq!(assets.len(), 1);

        let home = store.item(ItemId(1), SiteId(1)).unwrap().clone();
        let outward = store
            .query_related_to(Node::from(&home), ItemType::Document, SiteId(2))
            .unwrap();
        assert_eq!(outward[0].title, "Über uns");
    }
}
