//! Content graph data model: items, composite instances and field values.
//!
//! Everything here is read-only input to the discovery engine. Stores hand
//! these values out; the engine never mutates them.

mod schema;

pub use schema::{Field, Schema};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RelmapError;

/// Stable element identifier, shared by items and composite instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// SQLite row id for this element.
    pub fn to_row_id(self) -> Result<i64, RelmapError> {
        i64::try_from(self.0).map_err(|_| RelmapError::Parse(format!("Item id {} does not fit a row id", self.0)))
    }

    pub fn from_row_id(row_id: i64) -> Result<Self, RelmapError> {
        u64::try_from(row_id)
            .map(ItemId)
            .map_err(|_| RelmapError::Parse(format!("Invalid item row id {}", row_id)))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Site (locale) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u32);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item type tag. Declaration order is the display order of type buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Document,
    TaxonomyNode,
    MediaAsset,
}

impl ItemType {
    /// Every supported type, in bucket order.
    pub const ALL: [ItemType; 3] = [ItemType::Document, ItemType::TaxonomyNode, ItemType::MediaAsset];

    /// Machine name, as stored and as written in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Document => "document",
            ItemType::TaxonomyNode => "taxonomy-node",
            ItemType::MediaAsset => "media-asset",
        }
    }

    /// Human-facing singular noun for panel text.
    pub fn label(&self) -> &'static str {
        match self {
            ItemType::Document => "document",
            ItemType::TaxonomyNode => "taxonomy node",
            ItemType::MediaAsset => "media asset",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = RelmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(ItemType::Document),
            "taxonomy-node" => Ok(ItemType::TaxonomyNode),
            "media-asset" => Ok(ItemType::MediaAsset),
            other => Err(RelmapError::Parse(format!("Unknown item type: {}", other))),
        }
    }
}

/// A content item as seen from one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub item_type: ItemType,
    pub site_id: SiteId,
    pub title: String,
}

impl Item {
    pub fn new(id: u64, item_type: ItemType, site_id: u32, title: impl Into<String>) -> Self {
        Self {
            id: ItemId(id),
            item_type,
            site_id: SiteId(site_id),
            title: title.into(),
        }
    }
}

/// One block held by a composite field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeInstance {
    pub id: ItemId,
    pub owner_id: ItemId,
    pub field_handle: String,
    /// Declared block type, if any.
    pub sub_type: Option<String>,
    pub site_id: SiteId,
}

/// Anything the store can describe: a top-level item or a composite instance.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Item(&'a Item),
    Instance(&'a CompositeInstance),
}

impl<'a> Node<'a> {
    pub fn id(&self) -> ItemId {
        match self {
            Node::Item(item) => item.id,
            Node::Instance(instance) => instance.id,
        }
    }

    pub fn site_id(&self) -> SiteId {
        match self {
            Node::Item(item) => item.site_id,
            Node::Instance(instance) => instance.site_id,
        }
    }
}

impl<'a> From<&'a Item> for Node<'a> {
    fn from(item: &'a Item) -> Self {
        Node::Item(item)
    }
}

impl<'a> From<&'a CompositeInstance> for Node<'a> {
    fn from(instance: &'a CompositeInstance) -> Self {
        Node::Instance(instance)
    }
}

/// Raw value of a field as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Single(Item),
    Collection(Vec<ValueEntry>),
    /// Anything that is neither a reference nor a reference collection.
    Scalar(serde_json::Value),
}

/// One entry of a collection value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueEntry {
    Item(Item),
    /// Dangling reference or foreign payload.
    Other(serde_json::Value),
}
