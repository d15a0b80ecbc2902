//! Result containers and the final merge.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{Item, ItemId, ItemType};

/// Items grouped by type. Buckets keep discovery order and hold each id once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RelationSet {
    buckets: BTreeMap<ItemType, Vec<Item>>,
}

impl RelationSet {
    /// Append `item` to its type bucket. Returns false if the id is already there.
    pub fn insert(&mut self, item: Item) -> bool {
        if self.contains(item.item_type, item.id) {
            return false;
        }
        self.buckets.entry(item.item_type).or_default().push(item);
        true
    }

    pub fn contains(&self, item_type: ItemType, id: ItemId) -> bool {
        self.buckets
            .get(&item_type)
            .map_or(false, |items| items.iter().any(|i| i.id == id))
    }

    pub fn get(&self, item_type: ItemType) -> &[Item] {
        self.buckets.get(&item_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty buckets in type order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemType, &[Item])> {
        self.buckets.iter().map(|(ty, items)| (*ty, items.as_slice()))
    }

    /// Total number of items across buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Relations found under one nesting path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedEntry {
    pub path: String,
    pub relations: RelationSet,
}

/// Nesting path → relations, ordered by first discovery of each path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NestedRelationSet {
    entries: Vec<NestedEntry>,
}

impl NestedRelationSet {
    /// Record `item` under `path`, creating the path on first use.
    pub fn insert(&mut self, path: &str, item: Item) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.path == path) {
            return entry.relations.insert(item);
        }
        let mut relations = RelationSet::default();
        relations.insert(item);
        self.entries.push(NestedEntry {
            path: path.to_string(),
            relations,
        });
        true
    }

    pub fn contains(&self, path: &str, item_type: ItemType, id: ItemId) -> bool {
        self.get(path).map_or(false, |r| r.contains(item_type, id))
    }

    pub fn get(&self, path: &str) -> Option<&RelationSet> {
        self.entries.iter().find(|e| e.path == path).map(|e| &e.relations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NestedEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    /// Number of paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no path holds any item.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.relations.is_empty())
    }
}

/// Everything discovered for one subject. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    outgoing: RelationSet,
    incoming: RelationSet,
    nested: NestedRelationSet,
    has_any_result: bool,
}

impl DiscoveryResult {
    pub fn outgoing(&self) -> &RelationSet {
        &self.outgoing
    }

    pub fn incoming(&self) -> &RelationSet {
        &self.incoming
    }

    pub fn nested(&self) -> &NestedRelationSet {
        &self.nested
    }

    pub fn has_any_result(&self) -> bool {
        self.has_any_result
    }
}

/// Merge the three resolver outputs into the final result.
pub fn aggregate(outgoing: RelationSet, incoming: RelationSet, nested: NestedRelationSet) -> DiscoveryResult {
    let has_any_result = !outgoing.is_empty() || !incoming.is_empty() || !nested.is_empty();
    DiscoveryResult {
        outgoing,
        incoming,
        nested,
        has_any_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::testing::{asset, doc, tag};

    #[test]
    fn test_relation_set_dedupes_by_id_and_keeps_order() {
        let mut set = RelationSet::default();
        assert!(set.insert(doc(3, "Blog")));
        assert!(set.insert(doc(2, "About")));
        assert!(!set.insert(doc(3, "Blog (other site)")));
        assert!(set.insert(asset(3, "Same id, other type")));

        let titles: Vec<_> = set.get(ItemType::Document).iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Blog", "About"]);
        assert_eq!(set.len(), 3);
        assert!(set.get(ItemType::TaxonomyNode).is_empty());
    }

    #[test]
    fn test_buckets_iterate_in_type_order() {
        let mut set = RelationSet::default();
        set.insert(asset(1, "Logo"));
        set.insert(tag(2, "News"));
        set.insert(doc(3, "Home"));
        let types: Vec<_> = set.iter().map(|(ty, _)| ty).collect();
        assert_eq!(types, ItemType::ALL.to_vec());
    }

    #[test]
    fn test_nested_paths_keep_discovery_order() {
        let mut nested = NestedRelationSet::default();
        nested.insert("Sections → Blocks", doc(1, "A"));
        nested.insert("Sections", doc(2, "B"));
        nested.insert("Sections → Blocks", doc(1, "A"));
        assert_eq!(nested.paths().collect::<Vec<_>>(), vec!["Sections → Blocks", "Sections"]);
        assert_eq!(nested.get("Sections → Blocks").unwrap().len(), 1);
        assert!(nested.contains("Sections", ItemType::Document, ItemId(2)));
    }

    #[test]
    fn test_aggregate_flags_results() {
        let empty = aggregate(RelationSet::default(), RelationSet::default(), NestedRelationSet::default());
        assert!(!empty.has_any_result());

        let mut nested = NestedRelationSet::default();
        nested.insert("Sections", tag(9, "News"));
        let found = aggregate(RelationSet::default(), RelationSet::default(), nested);
        assert!(found.has_any_result());
    }

    #[test]
    fn test_result_serializes_buckets_by_type_name() {
        let mut outgoing = RelationSet::default();
        outgoing.insert(doc(2, "About"));
        let result = aggregate(outgoing, RelationSet::default(), NestedRelationSet::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outgoing"]["document"][0]["title"], "About");
        assert_eq!(json["has_any_result"], true);
        assert_eq!(json["nested"], serde_json::json!([]));
    }
}
