//! Storage abstraction for the vector index.
//!
//! The [`Store`] trait covers the persistence half of the index: append
//! embedded entries, brute-force similarity search, full wipe, and a few
//! read-only views for stats and export. Embedding is not the store's
//! concern; see [`VectorIndex`](crate::index::VectorIndex).
//!
//! Implementations must be `Send + Sync` and must make each mutation
//! atomic: [`insert_entries`](Store::insert_entries) stores all entries or
//! none, and [`delete_all`](Store::delete_all) leaves the store either fully
//! cleared or untouched.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkMetadata, IndexedEntry};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// An entry returned from vector search, with its similarity score.
#[derive(Debug, Clone)]
pub struct EntryCandidate {
    pub entry_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

/// Abstract storage backend for indexed entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_entries`](Store::insert_entries) | Append entries (never deduplicates) |
/// | [`vector_search`](Store::vector_search) | Top-`limit` entries by cosine similarity |
/// | [`delete_all`](Store::delete_all) | Irreversibly clear every entry |
/// | [`count`](Store::count) | Number of stored entries |
/// | [`count_by_source`](Store::count_by_source) | Per-source entry counts |
/// | [`all_entries`](Store::all_entries) | Every entry in insertion order |
#[async_trait]
pub trait Store: Send + Sync {
    /// Append entries atomically.
    async fn insert_entries(&self, entries: &[IndexedEntry]) -> Result<()>;

    /// Return at most `limit` entries ordered by descending similarity.
    ///
    /// Ties keep insertion order. A `limit` larger than the corpus returns
    /// everything.
    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<EntryCandidate>>;

    /// Remove every entry.
    async fn delete_all(&self) -> Result<()>;

    async fn count(&self) -> Result<u64>;

    /// `(source, count)` pairs, largest first.
    async fn count_by_source(&self) -> Result<Vec<(String, u64)>>;

    /// Every stored entry as `(content, metadata)`, in insertion order.
    async fn all_entries(&self) -> Result<Vec<(String, ChunkMetadata)>>;
}

/// Sort candidates by descending score, keeping insertion order for ties.
///
/// NaN scores rank below every real score.
pub(crate) fn rank_candidates(candidates: &mut Vec<EntryCandidate>, limit: usize) {
    fn key(score: f64) -> f64 {
        if score.is_nan() {
            f64::NEG_INFINITY
        } else {
            score
        }
    }
    candidates.sort_by(|a, b| key(b.score).total_cmp(&key(a.score)));
    candidates.truncate(limit);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, score: f64) -> EntryCandidate {
        EntryCandidate {
            entry_id: id.to_string(),
            content: String::new(),
            metadata: ChunkMetadata::new("s"),
            score,
        }
    }

    fn ids(candidates: &[EntryCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.entry_id.as_str()).collect()
    }

    #[test]
    fn nan_scores_rank_last() {
        let mut candidates = vec![
            candidate("nan", f64::NAN),
            candidate("low", 0.5),
            candidate("high", 0.9),
            candidate("neg", -0.2),
        ];
        rank_candidates(&mut candidates, 10);
        assert_eq!(ids(&candidates), vec!["high", "low", "neg", "nan"]);
    }

    #[test]
    fn ties_keep_insertion_order_and_limit_truncates() {
        let mut candidates = vec![
            candidate("first", 0.7),
            candidate("second", 0.7),
            candidate("top", 1.0),
            candidate("third", 0.7),
        ];
        rank_candidates(&mut candidates, 3);
        assert_eq!(ids(&candidates), vec!["top", "first", "second"]);
    }
}
