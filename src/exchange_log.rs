//! Append-only audit log of language-model requests.
//!
//! One JSON object per line: `{timestamp, query, context, language}`.
//! The engine never reads it back.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::llm::Language;
use crate::models::SearchResult;

#[derive(Debug, Serialize)]
struct LogLine<'a> {
    timestamp: String,
    query: &'a str,
    context: &'a [SearchResult],
    language: Language,
}

pub struct ExchangeLog {
    path: PathBuf,
}

impl ExchangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, query: &str, context: &[SearchResult], language: Language) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let line = serde_json::to_string(&LogLine {
            timestamp: chrono::Utc::now().to_rfc3339(),
            query,
            context,
            language,
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open exchange log {}", self.path.display()))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
