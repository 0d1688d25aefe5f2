//! In-memory [`Store`] implementation for tests and ephemeral sessions.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over every stored vector. Nothing survives
//! the process.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkMetadata, IndexedEntry};

use super::{rank_candidates, EntryCandidate, Store};

pub struct InMemoryStore {
    entries: RwLock<Vec<IndexedEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<IndexedEntry>>> {
        self.entries
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexedEntry>>> {
        self.entries
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_entries(&self, entries: &[IndexedEntry]) -> Result<()> {
        self.write()?.extend_from_slice(entries);
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<EntryCandidate>> {
        let entries = self.read()?;
        let mut candidates: Vec<EntryCandidate> = entries
            .iter()
            .map(|e| EntryCandidate {
                entry_id: e.id.clone(),
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(query_vec, &e.vector) as f64,
            })
            .collect();
        rank_candidates(&mut candidates, limit);
        Ok(candidates)
    }

    async fn delete_all(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }

    async fn count_by_source(&self) -> Result<Vec<(String, u64)>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for e in self.read()?.iter() {
            *counts.entry(e.metadata.source.clone()).or_default() += 1;
        }
        let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    async fn all_entries(&self) -> Result<Vec<(String, ChunkMetadata)>> {
        Ok(self
            .read()?
            .iter()
            .map(|e| (e.content.clone(), e.metadata.clone()))
            .collect())
    }
}
