use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flutterdb_core::{Options, Store};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flutterdb")]
#[command(about = "FlutterDB CLI - import/export for the embedded document store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import documents from a JSON file into the database
    Import {
        /// JSON file to import
        file: PathBuf,
        /// Database file path
        #[arg(long, default_value = "flutterdb.db")]
        db: PathBuf,
    },
    /// Export the database (or one collection) to a JSON file
    Export {
        /// Output JSON file
        file: PathBuf,
        /// Database file path
        #[arg(long, default_value = "flutterdb.db")]
        db: PathBuf,
        /// Export only a specific collection
        #[arg(long)]
        collection: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { file, db } => import_data(&file, &db),
        Commands::Export {
            file,
            db,
            collection,
        } => export_data(&file, &db, collection.as_deref()),
    }
}

/// Expected import shape: `{ "collection_name": [ {doc}, {doc}, ... ], ... }`.
fn import_data(file: &PathBuf, db: &PathBuf) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("reading import file {}", file.display()))?;
    let parsed: Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing JSON in {}", file.display()))?;
    let collections = parsed
        .as_object()
        .context("import file must be a JSON object keyed by collection name")?;

    let store = Store::open_file(db, Options::default())
        .with_context(|| format!("opening database {}", db.display()))?;

    let mut total = 0usize;
    for (name, docs) in collections {
        let docs = docs
            .as_array()
            .with_context(|| format!("collection '{}' must be a JSON array of documents", name))?;
        let collection = store.collection(name)?;
        let fields: Vec<_> = docs
            .iter()
            .map(|doc| value_to_fields(doc.clone()))
            .collect::<Result<Vec<_>>>()?;
        let inserted = collection.insert_many(fields)?;
        total += inserted.len();
        println!("imported {} documents into '{}'", inserted.len(), name);
    }

    println!("done: {} documents imported across {} collections", total, collections.len());
    Ok(())
}

/// Export shape mirrors import's: `{ "collection_name": [ {doc}, ... ] }`.
fn export_data(file: &PathBuf, db: &PathBuf, only: Option<&str>) -> Result<()> {
    let store = Store::open_file(db, Options::default())
        .with_context(|| format!("opening database {}", db.display()))?;

    let names = match only {
        Some(name) => vec![name.to_string()],
        None => store.list_collections()?,
    };

    let mut out = Map::new();
    for name in &names {
        let collection = store.collection(name)?;
        let docs = collection.find(&Value::Object(Map::new()))?;
        println!("exported {} documents from '{}'", docs.len(), name);
        out.insert(name.clone(), Value::Array(docs));
    }

    let rendered = serde_json::to_string_pretty(&Value::Object(out))?;
    fs::write(file, rendered).with_context(|| format!("writing export file {}", file.display()))?;
    Ok(())
}

fn value_to_fields(value: Value) -> Result<std::collections::HashMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => anyhow::bail!("expected a JSON object document, got {other}"),
    }
}
