//! Vector index: embedding plus persistence.
//!
//! [`VectorIndex`] pairs an [`EmbeddingProvider`] with a [`Store`]. It owns
//! the two guarantees the store alone cannot give:
//!
//! - **Serialized mutations.** `add` and `delete_all` take an internal
//!   async mutex around the store write, so backends that are not safe
//!   under concurrent writers never see two at once. Reads do not lock.
//! - **Generation counter.** Every successful mutation bumps
//!   [`generation`](VectorIndex::generation). The query cache tags its
//!   entries with the generation it observed and rejects older ones.
//!
//! Failures are classified here: anything from the provider becomes
//! [`EngineError::RetrievalUnavailable`], anything from the store becomes
//! [`EngineError::Storage`]. Neither is retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{EngineError, Result};
use crate::models::{Chunk, ChunkMetadata, IndexStats, IndexedEntry, SearchResult};
use crate::store::Store;

pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn Store>,
    batch_size: usize,
    write_lock: Mutex<()>,
    generation: AtomicU64,
}

impl VectorIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn Store>) -> Self {
        Self {
            provider,
            store,
            batch_size: 64,
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of texts sent to the provider per `embed` call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Current mutation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Embed and persist `chunks`, all or nothing. Returns the number stored.
    ///
    /// Every chunk is embedded before anything is written, so an embedding
    /// failure part way through leaves the store untouched.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let batch_vectors = self
                .provider
                .embed(&texts)
                .await
                .map_err(EngineError::retrieval_unavailable)?;
            if batch_vectors.len() != texts.len() {
                return Err(EngineError::retrieval_unavailable(anyhow!(
                    "provider returned {} vectors for {} texts",
                    batch_vectors.len(),
                    texts.len()
                )));
            }
            vectors.extend(batch_vectors);
        }

        let now = chrono::Utc::now().timestamp();
        let model = self.provider.model_name().to_string();
        let entries: Vec<IndexedEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedEntry {
                id: uuid::Uuid::new_v4().to_string(),
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                hash: format!("{:x}", Sha256::digest(chunk.content.as_bytes())),
                vector,
                model: model.clone(),
                created_at: now,
            })
            .collect();

        let _guard = self.write_lock.lock().await;
        self.store
            .insert_entries(&entries)
            .await
            .map_err(EngineError::storage)?;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(count = entries.len(), generation, "entries added");
        Ok(entries.len())
    }

    /// Top `limit` entries by descending similarity to `query`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.provider.as_ref(), query)
            .await
            .map_err(EngineError::retrieval_unavailable)?;
        let candidates = self
            .store
            .vector_search(&query_vec, limit)
            .await
            .map_err(EngineError::storage)?;

        Ok(candidates
            .into_iter()
            .map(|c| SearchResult {
                content: c.content,
                metadata: c.metadata,
                score: c.score as f32,
            })
            .collect())
    }

    /// Irreversibly remove every entry. The generation is bumped only when
    /// the store reports the wipe complete.
    pub async fn delete_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete_all().await.map_err(EngineError::storage)?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count().await.map_err(EngineError::storage)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let total = self.count().await?;
        let per_source = self
            .store
            .count_by_source()
            .await
            .map_err(EngineError::storage)?;
        Ok(IndexStats { total, per_source })
    }

    pub async fn all_entries(&self) -> Result<Vec<(String, ChunkMetadata)>> {
        self.store.all_entries().await.map_err(EngineError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledProvider, HashProvider};
    use crate::store::{EntryCandidate, InMemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct BrokenStore;

    #[async_trait]
    impl Store for BrokenStore {
        async fn insert_entries(&self, _entries: &[IndexedEntry]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn vector_search(
            &self,
            _query_vec: &[f32],
            _limit: usize,
        ) -> anyhow::Result<Vec<EntryCandidate>> {
            anyhow::bail!("disk unreadable")
        }
        async fn delete_all(&self) -> anyhow::Result<()> {
            anyhow::bail!("read-only filesystem")
        }
        async fn count(&self) -> anyhow::Result<u64> {
            Ok(0)
        }
        async fn count_by_source(&self) -> anyhow::Result<Vec<(String, u64)>> {
            Ok(Vec::new())
        }
        async fn all_entries(&self) -> anyhow::Result<Vec<(String, ChunkMetadata)>> {
            Ok(Vec::new())
        }
    }

    /// Counts writers that overlap in the store.
    struct OverlapStore {
        inner: InMemoryStore,
        writers: AtomicUsize,
        overlaps: AtomicUsize,
    }

    impl OverlapStore {
        async fn enter(&self) {
            if self.writers.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        fn exit(&self) {
            self.writers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Store for OverlapStore {
        async fn insert_entries(&self, entries: &[IndexedEntry]) -> anyhow::Result<()> {
            self.enter().await;
            let result = self.inner.insert_entries(entries).await;
            self.exit();
            result
        }
        async fn vector_search(
            &self,
            query_vec: &[f32],
            limit: usize,
        ) -> anyhow::Result<Vec<EntryCandidate>> {
            self.inner.vector_search(query_vec, limit).await
        }
        async fn delete_all(&self) -> anyhow::Result<()> {
            self.enter().await;
            let result = self.inner.delete_all().await;
            self.exit();
            result
        }
        async fn count(&self) -> anyhow::Result<u64> {
            self.inner.count().await
        }
        async fn count_by_source(&self) -> anyhow::Result<Vec<(String, u64)>> {
            self.inner.count_by_source().await
        }
        async fn all_entries(&self) -> anyhow::Result<Vec<(String, ChunkMetadata)>> {
            self.inner.all_entries().await
        }
    }

    fn hash_index() -> VectorIndex {
        VectorIndex::new(
            Arc::new(HashProvider::new(64)),
            Arc::new(InMemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn add_bumps_generation_and_search_finds_it() {
        let index = hash_index().with_batch_size(1);
        assert_eq!(index.generation(), 0);

        let added = index
            .add(&[
                Chunk::new("alpha beta", "a.txt"),
                Chunk::new("gamma delta", "b.txt"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(index.generation(), 1);

        let hits = index.search("gamma delta", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.source, "b.txt");
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn empty_add_is_a_no_op() {
        let index = hash_index();
        assert_eq!(index.add(&[]).await.unwrap(), 0);
        assert_eq!(index.generation(), 0);
    }

    #[tokio::test]
    async fn disabled_provider_is_retrieval_unavailable() {
        let index = VectorIndex::new(Arc::new(DisabledProvider), Arc::new(InMemoryStore::new()));
        let err = index.search("anything", 3).await.unwrap_err();
        assert!(matches!(err, EngineError::RetrievalUnavailable { .. }));

        let err = index.add(&[Chunk::new("x", "s")]).await.unwrap_err();
        assert!(matches!(err, EngineError::RetrievalUnavailable { .. }));
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(index.generation(), 0);
    }

    #[tokio::test]
    async fn store_failures_are_storage_errors() {
        let index = VectorIndex::new(Arc::new(HashProvider::new(8)), Arc::new(BrokenStore));
        let err = index.add(&[Chunk::new("x", "s")]).await.unwrap_err();
        assert!(matches!(err, EngineError::Storage { .. }));

        let err = index.search("x", 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Storage { .. }));

        let err = index.delete_all().await.unwrap_err();
        assert!(matches!(err, EngineError::Storage { .. }));
        assert_eq!(index.generation(), 0);
    }

    #[tokio::test]
    async fn delete_all_clears_and_bumps() {
        let index = hash_index();
        index.add(&[Chunk::new("one", "s")]).await.unwrap();
        index.delete_all().await.unwrap();
        assert_eq!(index.generation(), 2);
        assert!(index.search("one", 5).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_and_deletes_never_overlap() {
        let store = Arc::new(OverlapStore {
            inner: InMemoryStore::new(),
            writers: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
        });
        let index = Arc::new(VectorIndex::new(
            Arc::new(HashProvider::new(32)),
            Arc::clone(&store) as Arc<dyn Store>,
        ));

        let mut handles = Vec::new();
        for i in 0..8 {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                if i % 4 == 3 {
                    index.delete_all().await
                } else {
                    index
                        .add(&[Chunk::new(format!("entry {}", i), "s")])
                        .await
                        .map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(index.generation(), 8);
        assert!(index.count().await.unwrap() <= 6);

        index.delete_all().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(index.generation(), 9);
    }
}
