//! SQLite-backed content store.
//!
//! Reads the tables created by `migrations/`. Items and blocks share the
//! `elements` table; per-site titles live in `element_sites`; relation field
//! values and the relation index are both the `relations` table. A relation
//! row whose field is no longer in the source's layout still answers
//! [`ContentStore::query_related_to`], but never appears in a field value.
//!
//! Every call checks a connection out of a small idle pool and returns it
//! afterwards, so concurrent discovery tasks never wait on each other.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use std::sync::Mutex;

use super::ContentStore;
use crate::cache::SchemaCache;
use crate::db::Db;
use crate::error::{RelmapError, Result};
use crate::fields::FieldTypeRegistry;
use crate::model::{CompositeInstance, Field, FieldValue, Item, ItemId, ItemType, Node, Schema, SiteId, ValueEntry};

/// Picks one `element_sites` row per element: the preferred site if the
/// element exists there, otherwise its lowest site id.
macro_rules! preferred_site_join {
    ($kind:literal, $alias:literal, $element:literal, $param:literal) => {
        concat!(
            $kind, " JOIN element_sites ", $alias, " ON ", $alias, ".element_id = ", $element,
            " AND ", $alias, ".site_id = (SELECT s2.site_id FROM element_sites s2 WHERE s2.element_id = ",
            $element, " ORDER BY (s2.site_id = ", $param, ") DESC, s2.site_id LIMIT 1)"
        )
    };
}

const NO_SITE: i64 = -1;

/// Connections kept open between calls. More are opened on demand.
const MAX_IDLE_CONNECTIONS: usize = 4;

/// Content store over a SQLite database.
pub struct SqliteStore {
    db: Db,
    idle: Mutex<Vec<Connection>>,
    registry: FieldTypeRegistry,
    schemas: SchemaCache,
}

impl SqliteStore {
    /// Open the database behind `db`. Migrations must already be applied.
    pub fn open(db: &Db, registry: FieldTypeRegistry, schema_cache_capacity: usize) -> Result<Self> {
        // Fail here rather than on the first call if the file cannot be opened.
        let conn = db.open_connection()?;
        Ok(Self {
            db: db.clone(),
            idle: Mutex::new(vec![conn]),
            registry,
            schemas: SchemaCache::new(schema_cache_capacity),
        })
    }

    /// Run `f` on a pooled connection. The pool lock is held only to take
    /// and return the connection, never while `f` runs.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let pooled = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let conn = match pooled {
            Some(conn) => conn,
            None => {
                log::debug!("Opening extra connection to {}", self.db.path().display());
                self.db.open_connection()?
            }
        };

        let result = f(&conn);

        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_IDLE_CONNECTIONS {
                idle.push(conn);
            }
        }
        result
    }

    /// Load a top-level item, preferring its variant on `prefer_site`.
    pub fn item(&self, id: ItemId, prefer_site: Option<SiteId>) -> Result<Option<Item>> {
        let row_id = id.to_row_id()?;
        let site = prefer_site.map_or(NO_SITE, |s| i64::from(s.0));
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    concat!(
                        "SELECT e.id, e.item_type, es.site_id, es.title FROM elements e ",
                        preferred_site_join!("", "es", "e.id", "?2"),
                        " WHERE e.id = ?1 AND e.item_type IS NOT NULL"
                    ),
                    params![row_id, site],
                    read_item_row,
                )
                .optional()?)
        })?;
        row.map(ItemRow::into_item).transpose()
    }

    /// Forget cached layouts, e.g. after importing new ones.
    pub fn invalidate_schemas(&self) {
        self.schemas.clear();
    }

    fn layout_schema(&self, conn: &Connection, layout_id: i64) -> Result<Schema> {
        if let Some(schema) = self.schemas.get(layout_id) {
            return Ok(schema);
        }

        let mut stmt = conn.prepare(
            "SELECT f.handle, f.name, f.field_type FROM field_layout_fields lf \
             JOIN fields f ON f.id = lf.field_id \
             WHERE lf.layout_id = ?1 ORDER BY lf.sort_order, f.id",
        )?;
        let fields = stmt
            .query_map([layout_id], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?
            .into_iter()
            .map(|(handle, name, field_type)| Field {
                handle,
                name,
                field_type: self.registry.resolve(&field_type),
            })
            .collect();

        let schema = Schema::new(fields);
        self.schemas.put(layout_id, schema.clone());
        Ok(schema)
    }
}

struct ItemRow {
    id: i64,
    item_type: Option<String>,
    site_id: Option<i64>,
    title: Option<String>,
}

impl ItemRow {
    fn into_item(self) -> Result<Item> {
        let item_type = self
            .item_type
            .as_deref()
            .ok_or_else(|| RelmapError::Parse(format!("Element {} is not an item", self.id)))?
            .parse::<ItemType>()?;
        let site_id = self
            .site_id
            .ok_or_else(|| RelmapError::Parse(format!("Element {} has no site", self.id)))?;
        let site_id = u32::try_from(site_id)
            .map_err(|_| RelmapError::Parse(format!("Invalid site id {} for element {}", site_id, self.id)))?;
        Ok(Item {
            id: ItemId::from_row_id(self.id)?,
            item_type,
            site_id: SiteId(site_id),
            title: self.title.unwrap_or_default(),
        })
    }
}

fn read_item_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        item_type: row.get(1)?,
        site_id: row.get(2)?,
        title: row.get(3)?,
    })
}

impl ContentStore for SqliteStore {
    fn field_schema(&self, node: Node<'_>) -> Result<Option<Schema>> {
        let row_id = node.id().to_row_id()?;
        self.with_conn(|conn| {
            let layout_id: Option<Option<i64>> = conn
                .query_row("SELECT layout_id FROM elements WHERE id = ?1", [row_id], |row| row.get(0))
                .optional()?;

            match layout_id.flatten() {
                Some(layout_id) => Ok(Some(self.layout_schema(conn, layout_id)?)),
                None => Ok(None),
            }
        })
    }

    fn field_value(&self, node: Node<'_>, handle: &str) -> Result<FieldValue> {
        let row_id = node.id().to_row_id()?;
        let site = i64::from(node.site_id().0);
        let (relation_limit, rows) = self.with_conn(|conn| {
            let field: Option<(i64, String, Option<i64>)> = conn
                .query_row(
                    "SELECT id, field_type, relation_limit FROM fields WHERE handle = ?1",
                    [handle],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (field_id, field_type, relation_limit) =
                field.ok_or_else(|| RelmapError::Store(format!("Unknown field handle: {}", handle)))?;

            if self.registry.resolve(&field_type).as_relation().is_none() {
                return Ok((relation_limit, None));
            }

            let mut stmt = conn.prepare(concat!(
                "SELECT r.target_id, e.item_type, es.site_id, es.title FROM relations r ",
                "LEFT JOIN elements e ON e.id = r.target_id ",
                preferred_site_join!("LEFT", "es", "r.target_id", "?3"),
                " WHERE r.source_id = ?1 AND r.field_id = ?2 ORDER BY r.sort_order, r.id"
            ))?;
            let rows = stmt
                .query_map(params![row_id, field_id, site], read_item_row)?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok((relation_limit, Some(rows)))
        })?;

        let Some(rows) = rows else {
            return Ok(FieldValue::Empty);
        };

        let entries: Vec<ValueEntry> = rows
            .into_iter()
            .map(|row| {
                let target_id = row.id;
                row.into_item()
                    .map(ValueEntry::Item)
                    .unwrap_or_else(|_| ValueEntry::Other(json!({ "target_id": target_id })))
            })
            .collect();

        if relation_limit == Some(1) {
            return Ok(match entries.into_iter().next() {
                Some(ValueEntry::Item(item)) => FieldValue::Single(item),
                Some(ValueEntry::Other(raw)) => FieldValue::Scalar(raw),
                None => FieldValue::Empty,
            });
        }
        Ok(FieldValue::Collection(entries))
    }

    fn query_related_to(&self, target: Node<'_>, item_type: ItemType, prefer_site: SiteId) -> Result<Vec<Item>> {
        let row_id = target.id().to_row_id()?;
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(concat!(
                "SELECT e.id, e.item_type, es.site_id, es.title FROM elements e ",
                preferred_site_join!("", "es", "e.id", "?3"),
                " WHERE e.item_type = ?2 AND (",
                "e.id IN (SELECT source_id FROM relations WHERE target_id = ?1) OR ",
                "e.id IN (SELECT target_id FROM relations WHERE source_id = ?1)) ",
                "ORDER BY es.title COLLATE NOCASE, e.id"
            ))?;
            let rows = stmt
                .query_map(
                    params![row_id, item_type.as_str(), i64::from(prefer_site.0)],
                    read_item_row,
                )?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    fn composite_instances(&self, node: Node<'_>, handle: &str) -> Result<Vec<CompositeInstance>> {
        let row_id = node.id().to_row_id()?;
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(concat!(
                "SELECT e.id, e.block_type, es.site_id FROM elements e ",
                "JOIN fields f ON f.id = e.owner_field_id ",
                preferred_site_join!("LEFT", "es", "e.id", "?3"),
                " WHERE e.owner_id = ?1 AND f.handle = ?2 ORDER BY e.sort_order, e.id"
            ))?;
            let rows = stmt
                .query_map(params![row_id, handle, i64::from(node.site_id().0)], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, sub_type, site_id)| {
                Ok(CompositeInstance {
                    id: ItemId::from_row_id(id)?,
                    owner_id: node.id(),
                    field_handle: handle.to_string(),
                    sub_type,
                    // Blocks without their own site rows live on the owner's site.
                    site_id: site_id
                        .and_then(|s| u32::try_from(s).ok())
                        .map_or(node.site_id(), SiteId),
                })
            })
            .collect()
    }
}
