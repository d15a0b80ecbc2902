use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relmap::config::DiscoverySettings;
use relmap::db::{migrate, Db};
use relmap::discovery::{discover, discover_concurrent, DiscoveryOptions, DiscoveryReport, RelationSet};
use relmap::fields::FieldTypeRegistry;
use relmap::import::{import_fixture, GraphFixture};
use relmap::model::{ItemId, SiteId};
use relmap::store::SqliteStore;
use relmap::{Config, RelmapError};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Relationship discovery over a content-graph store.
#[derive(Parser, Debug)]
#[command(name = "relmap", version)]
struct Cli {
    /// Directory holding the NNN_name.sql migrations.
    #[arg(long, global = true, default_value = "migrations")]
    migrations: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the store schema.
    Migrate,
    /// Load a JSON content-graph fixture into the store.
    Import {
        fixture: PathBuf,
    },
    /// Show everything related to one item.
    Related {
        item_id: u64,

        /// Site whose titles to prefer.
        #[arg(long)]
        site: Option<u32>,

        /// Skip traversal of composite fields.
        #[arg(long)]
        no_nested: bool,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,

        /// Resolve outgoing, incoming and nested relations in parallel.
        #[arg(long)]
        concurrent: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.logging.log_level.as_str())
    ).init();

    let db = Db::new(config.db_path());

    match cli.command {
        Command::Migrate => run_migrate(&db, cli.migrations).await,
        Command::Import { fixture } => {
            run_migrate(&db, cli.migrations).await?;
            run_import(&db, fixture).await
        }
        Command::Related { item_id, site, no_nested, json, concurrent } => {
            let request = RelatedRequest {
                item_id: ItemId(item_id),
                site: site.map(SiteId),
                no_nested,
                json,
                concurrent,
            };
            run_related(&config, &db, request).await
        }
    }
}

async fn run_migrate(db: &Db, migrations_dir: PathBuf) -> Result<()> {
    log::info!("Migrating {}", db.path().display());
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await
        .context("Failed to run migrations")?;
    Ok(())
}

async fn run_import(db: &Db, path: PathBuf) -> Result<()> {
    let fixture = GraphFixture::from_path(&path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let summary = db
        .with_connection(move |conn| import_fixture(conn, &fixture))
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;

    println!(
        "Imported {} sites, {} fields, {} layouts, {} items, {} blocks, {} relations",
        summary.sites, summary.fields, summary.layouts, summary.items, summary.blocks, summary.relations
    );
    Ok(())
}

struct RelatedRequest {
    item_id: ItemId,
    site: Option<SiteId>,
    no_nested: bool,
    json: bool,
    concurrent: bool,
}

async fn run_related(config: &Config, db: &Db, request: RelatedRequest) -> Result<()> {
    let store = Arc::new(SqliteStore::open(
        db,
        FieldTypeRegistry::new(),
        config.store.schema_cache_capacity,
    )?);

    let subject = store
        .item(request.item_id, request.site)?
        .ok_or(RelmapError::ItemNotFound(request.item_id))?;

    let mut options = DiscoveryOptions::from(&config.discovery);
    if request.no_nested {
        options.enable_nested = false;
    }

    let report = if request.concurrent {
        discover_concurrent(Arc::clone(&store), subject.clone(), options).await?
    } else {
        let (store, subject) = (Arc::clone(&store), subject.clone());
        tokio::task::spawn_blocking(move || discover(store.as_ref(), &subject, &options))
            .await
            .context("Discovery task failed")?
    };

    if request.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_panel(&subject.title, &report, &config.discovery));
    }
    Ok(())
}

/// Text panel for one report. Each type bucket shows at most
/// `initial_display_limit` items followed by a count of the rest.
fn render_panel(title: &str, report: &DiscoveryReport, settings: &DiscoverySettings) -> String {
    let mut out = String::new();
    let result = &report.result;
    let _ = writeln!(out, "Related to \"{}\"", title);

    if !result.has_any_result() {
        let _ = writeln!(out, "  No related items found.");
    } else {
        render_section(&mut out, "Outgoing", result.outgoing(), settings);
        render_section(&mut out, "Incoming", result.incoming(), settings);
        for entry in result.nested().iter() {
            render_section(&mut out, &format!("Nested: {}", entry.path), &entry.relations, settings);
        }
    }

    if !report.diagnostics.is_empty() {
        let _ = writeln!(
            out,
            "  ({} problem(s) while reading the store, results may be incomplete)",
            report.diagnostics.len()
        );
    }
    out
}

fn render_section(out: &mut String, heading: &str, relations: &RelationSet, settings: &DiscoverySettings) {
    if relations.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}", heading);
    for (item_type, items) in relations.iter() {
        let _ = writeln!(out, "  {} ({})", item_type.label(), items.len());
        for item in items.iter().take(settings.initial_display_limit) {
            if settings.show_type_label {
                let _ = writeln!(out, "    - {} [{}]", item.title, item_type.label());
            } else {
                let _ = writeln!(out, "    - {}", item.title);
            }
        }
        if items.len() > settings.initial_display_limit {
            let _ = writeln!(out, "    … and {} more", items.len() - settings.initial_display_limit);
        }
    }
}
