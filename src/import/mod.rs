//! JSON fixture import into the SQLite content store.
//!
//! A fixture is a complete snapshot of a small content graph. Importing is
//! an upsert: existing rows with the same ids are updated, and the relation
//! rows of every `(source, field)` pair named in the fixture are replaced.

use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{RelmapError, Result};
use crate::model::{ItemId, ItemType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphFixture {
    #[serde(default)]
    pub sites: Vec<SiteFixture>,
    #[serde(default)]
    pub fields: Vec<FieldFixture>,
    #[serde(default)]
    pub layouts: Vec<LayoutFixture>,
    #[serde(default)]
    pub items: Vec<ItemFixture>,
    #[serde(default)]
    pub blocks: Vec<BlockFixture>,
    #[serde(default)]
    pub relations: Vec<RelationFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteFixture {
    pub id: u32,
    pub handle: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFixture {
    pub id: i64,
    /// Fields without a handle exist in layouts but cannot be read.
    pub handle: Option<String>,
    pub name: String,
    /// Registered field type name, e.g. `entries` or `matrix`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// `1` makes a relation field single-valued.
    #[serde(default)]
    pub relation_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutFixture {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Field ids in display order.
    pub fields: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFixture {
    pub id: u64,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub layout: Option<i64>,
    /// Title per site id. An item exists on exactly the sites listed here.
    pub titles: BTreeMap<u32, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFixture {
    pub id: u64,
    pub owner: u64,
    /// Handle of the composite field on the owner.
    pub field: String,
    #[serde(default)]
    pub block_type: Option<String>,
    #[serde(default)]
    pub layout: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationFixture {
    pub source: u64,
    /// Handle of the relation field on the source.
    pub field: String,
    pub targets: Vec<u64>,
}

/// Row counts written by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub sites: usize,
    pub fields: usize,
    pub layouts: usize,
    pub items: usize,
    pub blocks: usize,
    pub relations: usize,
}

impl GraphFixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn field_ids(&self) -> HashMap<&str, i64> {
        self.fields
            .iter()
            .filter_map(|f| f.handle.as_deref().map(|h| (h, f.id)))
            .collect()
    }
}

/// Write the whole fixture in one transaction.
pub fn import_fixture(conn: &mut Connection, fixture: &GraphFixture) -> Result<ImportSummary> {
    let field_ids = fixture.field_ids();
    let field_id = |handle: &str| {
        field_ids
            .get(handle)
            .copied()
            .ok_or_else(|| RelmapError::Parse(format!("Fixture references unknown field '{}'", handle)))
    };

    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();

    for site in &fixture.sites {
        tx.execute(
            "INSERT INTO sites (id, handle, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET handle = excluded.handle, name = excluded.name",
            params![site.id, site.handle, site.name],
        )?;
        summary.sites += 1;
    }

    for field in &fixture.fields {
        tx.execute(
            "INSERT INTO fields (id, handle, name, field_type, relation_limit) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                handle = excluded.handle,
                name = excluded.name,
                field_type = excluded.field_type,
                relation_limit = excluded.relation_limit",
            params![field.id, field.handle, field.name, field.field_type, field.relation_limit],
        )?;
        summary.fields += 1;
    }

    for layout in &fixture.layouts {
        tx.execute(
            "INSERT INTO field_layouts (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![layout.id, layout.name],
        )?;
        tx.execute("DELETE FROM field_layout_fields WHERE layout_id = ?1", [layout.id])?;
        for (position, field) in layout.fields.iter().enumerate() {
            tx.execute(
                "INSERT INTO field_layout_fields (layout_id, field_id, sort_order) VALUES (?1, ?2, ?3)",
                params![layout.id, field, position as i64],
            )?;
        }
        summary.layouts += 1;
    }

    for item in &fixture.items {
        if item.titles.is_empty() {
            return Err(RelmapError::Parse(format!("Item {} has no site titles", item.id)));
        }
        tx.execute(
            "INSERT INTO elements (id, item_type, layout_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET item_type = excluded.item_type, layout_id = excluded.layout_id",
            params![ItemId(item.id).to_row_id()?, item.item_type.as_str(), item.layout],
        )?;
        write_titles(&tx, item.id, &item.titles)?;
        summary.items += 1;
    }

    // Blocks are ordered by their position in the fixture, per owning field.
    let mut positions: HashMap<(u64, &str), i64> = HashMap::new();
    for block in &fixture.blocks {
        let owner_field = field_id(&block.field)?;
        let position = positions.entry((block.owner, block.field.as_str())).or_insert(0);
        tx.execute(
            "INSERT INTO elements (id, layout_id, owner_id, owner_field_id, block_type, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                layout_id = excluded.layout_id,
                owner_id = excluded.owner_id,
                owner_field_id = excluded.owner_field_id,
                block_type = excluded.block_type,
                sort_order = excluded.sort_order",
            params![
                ItemId(block.id).to_row_id()?,
                block.layout,
                ItemId(block.owner).to_row_id()?,
                owner_field,
                block.block_type,
                *position
            ],
        )?;
        *position += 1;
        summary.blocks += 1;
    }

    for relation in &fixture.relations {
        let field = field_id(&relation.field)?;
        let source = ItemId(relation.source).to_row_id()?;
        tx.execute(
            "DELETE FROM relations WHERE source_id = ?1 AND field_id = ?2",
            params![source, field],
        )?;
        for (position, target) in relation.targets.iter().enumerate() {
            tx.execute(
                "INSERT INTO relations (field_id, source_id, target_id, sort_order) VALUES (?1, ?2, ?3, ?4)",
                params![field, source, ItemId(*target).to_row_id()?, position as i64],
            )?;
            summary.relations += 1;
        }
    }

    tx.commit()?;
    log::info!(
        "Imported {} items, {} blocks and {} relation rows",
        summary.items,
        summary.blocks,
        summary.relations
    );
    Ok(summary)
}

fn write_titles(tx: &Transaction<'_>, element_id: u64, titles: &BTreeMap<u32, String>) -> Result<()> {
    let element_id = ItemId(element_id).to_row_id()?;
    tx.execute("DELETE FROM element_sites WHERE element_id = ?1", [element_id])?;
    for (site, title) in titles {
        tx.execute(
            "INSERT INTO element_sites (element_id, site_id, title) VALUES (?1, ?2, ?3)",
            params![element_id, site, title],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrate, Db};
    use tempfile::TempDir;

    const FIXTURE: &str = r#"{
        "sites": [{"id": 1, "handle": "en"}, {"id": 2, "handle": "de"}],
        "fields": [
            {"id": 1, "handle": "related", "name": "Related", "type": "entries"},
            {"id": 2, "handle": "sections", "name": "Sections", "type": "matrix"}
        ],
        "layouts": [{"id": 1, "name": "Page", "fields": [1, 2]}],
        "items": [
            {"id": 10, "type": "document", "layout": 1, "titles": {"1": "Home", "2": "Startseite"}},
            {"id": 11, "type": "taxonomy-node", "titles": {"1": "News"}}
        ],
        "blocks": [
            {"id": 100, "owner": 10, "field": "sections", "block_type": "text", "layout": 1},
            {"id": 101, "owner": 10, "field": "sections"}
        ],
        "relations": [{"source": 10, "field": "related", "targets": [11]}]
    }"#;

    fn setup() -> (Connection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Db::new(temp_dir.path().join("import.db")).open_connection().unwrap();
        migrate::run_migrations(
            &mut conn,
            &std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        )
        .unwrap();
        (conn, temp_dir)
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_import_fixture() {
        let (mut conn, _temp) = setup();
        let fixture = GraphFixture::from_json(FIXTURE).unwrap();
        let summary = import_fixture(&mut conn, &fixture).unwrap();

        assert_eq!(
            summary,
            ImportSummary { sites: 2, fields: 2, layouts: 1, items: 2, blocks: 2, relations: 1 }
        );
        assert_eq!(count(&conn, "element_sites"), 3);
        let order: i64 = conn
            .query_row("SELECT sort_order FROM elements WHERE id = 101", [], |row| row.get(0))
            .unwrap();
        assert_eq!(order, 1);
    }

    #[test]
    fn test_reimport_replaces_relations() {
        let (mut conn, _temp) = setup();
        let mut fixture = GraphFixture::from_json(FIXTURE).unwrap();
        import_fixture(&mut conn, &fixture).unwrap();

        fixture.relations[0].targets = vec![11, 10];
        import_fixture(&mut conn, &fixture).unwrap();
        assert_eq!(count(&conn, "relations"), 2);
        assert_eq!(count(&conn, "elements"), 4);
    }

    #[test]
    fn test_unknown_field_rolls_back() {
        let (mut conn, _temp) = setup();
        let mut fixture = GraphFixture::from_json(FIXTURE).unwrap();
        fixture.relations[0].field = "missing".to_string();

        let err = import_fixture(&mut conn, &fixture).unwrap_err();
        assert!(matches!(err, RelmapError::Parse(_)));
        assert_eq!(count(&conn, "elements"), 0);
    }

    #[test]
    fn test_item_without_titles_rejected() {
        let (mut conn, _temp) = setup();
        let mut fixture = GraphFixture::from_json(FIXTURE).unwrap();
        fixture.items[1].titles.clear();
        assert!(import_fixture(&mut conn, &fixture).is_err());
    }

    #[test]
    fn test_out_of_range_ids_roll_back() {
        let (mut conn, _temp) = setup();
        let mut fixture = GraphFixture::from_json(FIXTURE).unwrap();
        fixture.relations[0].targets.push(u64::MAX);

        let err = import_fixture(&mut conn, &fixture).unwrap_err();
        assert!(matches!(err, RelmapError::Parse(_)));
        assert_eq!(count(&conn, "elements"), 0);
        assert_eq!(count(&conn, "relations"), 0);

        let mut fixture = GraphFixture::from_json(FIXTURE).unwrap();
        fixture.blocks[0].owner = 1 << 63;
        assert!(matches!(import_fixture(&mut conn, &fixture), Err(RelmapError::Parse(_))));
        assert_eq!(count(&conn, "element_sites"), 0);
    }
}
