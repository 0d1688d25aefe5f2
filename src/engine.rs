//! Retrieval engine: ingest, cached paginated search, batch search.
//!
//! [`RetrievalEngine`] is an explicitly constructed value that owns its
//! [`VectorIndex`] and [`QueryCache`]. Callers share it by reference (or
//! `Arc`); there is no global state.
//!
//! # Search
//!
//! ```text
//! search(q, k, page)
//!   ├── key = (q, k, page), generation = index.generation()
//!   ├── cache hit at generation? ──► unsliced results
//!   └── miss ──► index.search(q, k * page) ──► cache.insert(key, generation)
//!   └── slice [(page-1)*k .. (page-1)*k + k]
//! ```
//!
//! Every page re-fetches from rank 0, so fetching page `p` costs `k * p`
//! rows. The cost across pages is quadratic, which is accepted for the
//! corpus sizes this engine targets.
//!
//! # Batch search
//!
//! [`batch_search`](RetrievalEngine::batch_search) bypasses the cache and
//! runs at most `batch.max_concurrency` queries at once. Outcomes come back
//! in completion order with their submission position attached.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::batch::{guarded, BatchOptions, BatchResults, QueryOutcome};
use crate::cache::{CacheKey, QueryCache};
use crate::chunk::chunk_document;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::{EngineError, Result};
use crate::index::VectorIndex;
use crate::loader::load_text;
use crate::models::{Chunk, ChunkMetadata, IndexStats, SearchResult, CHAT_SOURCE, IMPORT_SOURCE};
use crate::store::{InMemoryStore, SqliteStore};

pub struct RetrievalEngine {
    index: VectorIndex,
    cache: QueryCache,
    chunk_size: usize,
    overlap: usize,
    default_k: usize,
    large_result_warning: usize,
    batch_concurrency: usize,
    query_timeout: Option<Duration>,
}

impl RetrievalEngine {
    pub fn new(index: VectorIndex, config: &Config) -> Self {
        Self {
            index,
            cache: QueryCache::new(config.cache.max_entries),
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            default_k: config.retrieval.default_k,
            large_result_warning: config.retrieval.large_result_warning,
            batch_concurrency: config.batch.effective_concurrency(),
            query_timeout: config.batch.query_timeout(),
        }
    }

    /// Open the durable SQLite index at `config.db.path`, creating it if needed.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = crate::db::connect(config).await?;
        crate::migrate::run_migrations(&pool).await?;
        let provider = create_provider(&config.embedding)?;
        let index = VectorIndex::new(provider, Arc::new(SqliteStore::new(pool)))
            .with_batch_size(config.embedding.batch_size);
        Ok(Self::new(index, config))
    }

    /// An engine over an in-memory store. Nothing is persisted.
    pub fn in_memory(config: &Config) -> anyhow::Result<Self> {
        let provider = create_provider(&config.embedding)?;
        let index = VectorIndex::new(provider, Arc::new(InMemoryStore::new()))
            .with_batch_size(config.embedding.batch_size);
        Ok(Self::new(index, config))
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Chunk `text`, tag every chunk with `source`, and index it.
    ///
    /// Returns `Ok(false)` without touching the index when `text` is empty or
    /// whitespace only.
    pub async fn ingest_text(&self, text: &str, source: &str) -> Result<bool> {
        if text.trim().is_empty() {
            debug!(source, "skipping empty document");
            return Ok(false);
        }
        let chunks = chunk_document(text, source, self.chunk_size, self.overlap);
        let added = self.index.add(&chunks).await?;
        info!(source, chunks = added, "ingested document");
        Ok(true)
    }

    /// Load `path` through the document loader and ingest it under its
    /// file name.
    ///
    /// Missing files, unsupported extensions, unreadable or empty content
    /// all return `Ok(false)`. Only index failures are errors.
    pub async fn ingest_file(&self, path: &Path) -> Result<bool> {
        if !path.is_file() {
            warn!(path = %path.display(), "not a file, skipping");
            return Ok(false);
        }
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let owned = path.to_path_buf();
        let text = match tokio::task::spawn_blocking(move || load_text(&owned)).await {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => {
                warn!(path = %path.display(), "unsupported file type, skipping");
                return Ok(false);
            }
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "could not read file, skipping");
                return Ok(false);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "loader task failed, skipping");
                return Ok(false);
            }
        };

        if text.trim().is_empty() {
            warn!(path = %path.display(), "file has no text, skipping");
            return Ok(false);
        }
        self.ingest_text(&text, &source).await
    }

    /// Page `page` (1-based) of the top results for `query`, at most `k` long.
    pub async fn search(&self, query: &str, k: usize, page: usize) -> Result<Vec<SearchResult>> {
        if page == 0 {
            return Err(EngineError::InvalidArgument(
                "page must be >= 1".to_string(),
            ));
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let fetch = k
            .checked_mul(page)
            .ok_or_else(|| EngineError::InvalidArgument(format!("k * page overflows ({k} * {page})")))?;
        let offset = fetch - k;

        let key = CacheKey::new(query, k, page);
        // read before computing so a concurrent mutation marks the result stale
        let generation = self.index.generation();
        let results = match self.cache.get(&key, generation) {
            Some(hit) => {
                debug!(query, k, page, "query cache hit");
                hit
            }
            None => {
                debug!(query, k, page, fetch, "query cache miss");
                let fresh = Arc::new(self.index.search(query, fetch).await?);
                self.cache.insert(key, generation, Arc::clone(&fresh));
                fresh
            }
        };

        if results.len() > self.large_result_warning {
            warn!(
                fetched = results.len(),
                threshold = self.large_result_warning,
                "large result set: use pagination and a smaller k"
            );
        }

        Ok(results.iter().skip(offset).take(k).cloned().collect())
    }

    /// Run every query concurrently, each as `search(q, k, 1)` without the cache.
    ///
    /// Never fails as a whole: each [`QueryOutcome`] carries its own result.
    pub async fn batch_search(
        &self,
        queries: &[String],
        k: usize,
        options: BatchOptions,
    ) -> BatchResults {
        let concurrency = options
            .concurrency
            .unwrap_or(self.batch_concurrency)
            .max(1);
        let timeout = options.query_timeout.or(self.query_timeout);
        let cancel = options.cancel.unwrap_or_default();
        debug!(queries = queries.len(), concurrency, ?timeout, "dispatching batch search");

        let outcomes: Vec<QueryOutcome> = stream::iter(queries.iter().enumerate())
            .map(|(position, query)| {
                let cancel = &cancel;
                async move {
                    let results = guarded(query, self.index.search(query, k), timeout, cancel).await;
                    QueryOutcome {
                        query: query.clone(),
                        position,
                        results,
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        BatchResults::from(outcomes)
    }

    /// Store one question/answer exchange as a single unchunked entry.
    pub async fn record_exchange(&self, question: &str, answer: &str) -> Result<()> {
        let chunk = Chunk {
            content: format!("Question: {}\nAnswer: {}", question, answer),
            metadata: ChunkMetadata::new(CHAT_SOURCE)
                .with("recorded_at", chrono::Utc::now().to_rfc3339()),
        };
        self.index.add(std::slice::from_ref(&chunk)).await?;
        debug!("recorded chat exchange");
        Ok(())
    }

    /// Wipe the index and the query cache.
    ///
    /// The cache is cleared only after the store confirms the wipe.
    pub async fn reset(&self) -> Result<()> {
        self.index.delete_all().await?;
        self.cache.clear();
        info!("index reset");
        Ok(())
    }

    /// Every entry as `{content, metadata}`, in insertion order.
    pub async fn export_entries(&self) -> Result<Vec<SearchResult>> {
        Ok(self
            .index
            .all_entries()
            .await?
            .into_iter()
            .map(|(content, metadata)| SearchResult {
                content,
                metadata,
                score: 0.0,
            })
            .collect())
    }

    /// Re-embed and add exported entries, unchunked, all or nothing.
    ///
    /// Blank entries are skipped; entries without a source are tagged
    /// `"import"`. Returns the number added.
    pub async fn import_entries(&self, items: &[SearchResult]) -> Result<usize> {
        let chunks: Vec<Chunk> = items
            .iter()
            .filter(|item| !item.content.trim().is_empty())
            .map(|item| {
                let mut metadata = item.metadata.clone();
                if metadata.source.is_empty() {
                    metadata.source = IMPORT_SOURCE.to_string();
                }
                Chunk {
                    content: item.content.clone(),
                    metadata,
                }
            })
            .collect();
        let added = self.index.add(&chunks).await?;
        info!(entries = added, "imported entries");
        Ok(added)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    pub async fn count(&self) -> Result<u64> {
        self.index.count().await
    }
}
