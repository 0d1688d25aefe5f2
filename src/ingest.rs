//! `recall ingest`: load files or directory trees into the index.
//!
//! Directories are walked recursively in file-name order. Each file goes
//! through [`RetrievalEngine::ingest_file`]; unsupported, unreadable and
//! empty files are counted as skipped. Index failures abort the run.

use std::path::{Path, PathBuf};

use anyhow::Result;
use context_recall::RetrievalEngine;
use walkdir::WalkDir;

/// Counts reported after an ingest run.
#[derive(Debug, Default, PartialEq)]
pub struct IngestSummary {
    pub ingested: usize,
    pub skipped: usize,
}

/// Expand `paths` into the list of files to ingest.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                files.push(entry.into_path());
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

async fn ingest_one(engine: &RetrievalEngine, path: &Path, summary: &mut IngestSummary) -> Result<()> {
    if engine.ingest_file(path).await? {
        println!("  + {}", path.display());
        summary.ingested += 1;
    } else {
        println!("  - {} (skipped)", path.display());
        summary.skipped += 1;
    }
    Ok(())
}

pub async fn run_ingest(engine: &RetrievalEngine, paths: &[PathBuf]) -> Result<IngestSummary> {
    let files = collect_files(paths);
    let mut summary = IngestSummary::default();

    println!("ingest");
    for file in &files {
        ingest_one(engine, file, &mut summary).await?;
    }
    println!("  ingested: {} files", summary.ingested);
    println!("  skipped: {} files", summary.skipped);
    println!("ok");

    Ok(summary)
}
