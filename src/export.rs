//! `recall export` / `recall import`: knowledge-base backup as JSON.
//!
//! The file is a JSON array of `{content, metadata}` objects in insertion
//! order. Import re-embeds every entry with the current provider.

use std::path::Path;

use anyhow::{Context, Result};
use context_recall::models::SearchResult;
use context_recall::RetrievalEngine;
use serde::Serialize;

#[derive(Serialize)]
struct ExportEntry<'a> {
    content: &'a str,
    metadata: &'a context_recall::models::ChunkMetadata,
}

pub async fn run_export(engine: &RetrievalEngine, output: Option<&Path>) -> Result<()> {
    let entries = engine.export_entries().await?;
    let view: Vec<ExportEntry<'_>> = entries
        .iter()
        .map(|e| ExportEntry {
            content: &e.content,
            metadata: &e.metadata,
        })
        .collect();
    let json = serde_json::to_string_pretty(&view)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} entries to {}", entries.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}

pub async fn run_import(engine: &RetrievalEngine, input: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let items: Vec<SearchResult> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of {{content, metadata}}", input.display()))?;

    let added = engine.import_entries(&items).await?;
    println!("Imported {} entries from {}", added, input.display());
    Ok(())
}
