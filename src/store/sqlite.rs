//! SQLite-backed [`Store`] implementation.
//!
//! Entries live in `entries`; their vectors live in `entry_vectors` as
//! little-endian `f32` BLOBs. Similarity is computed in Rust after a full
//! scan, so search cost is linear in the corpus size.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkMetadata, IndexedEntry};

use super::{rank_candidates, EntryCandidate, Store};

/// SQLite implementation of the [`Store`] trait.
///
/// Expects the schema created by [`run_migrations`](crate::migrate::run_migrations).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Decode a stored `metadata_json` column. Corrupt JSON is a storage error.
fn parse_metadata(json: &str, source: String) -> Result<ChunkMetadata> {
    let mut metadata: ChunkMetadata = serde_json::from_str(json)
        .with_context(|| format!("corrupt metadata_json for source '{}'", source))?;
    metadata.source = source;
    Ok(metadata)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_entries(&self, entries: &[IndexedEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let metadata_json = serde_json::to_string(&entry.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO entries (id, source, content, metadata_json, hash, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.metadata.source)
            .bind(&entry.content)
            .bind(&metadata_json)
            .bind(&entry.hash)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;

            let blob = vec_to_blob(&entry.vector);
            sqlx::query(
                "INSERT INTO entry_vectors (entry_id, model, dims, embedding) VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(&entry.model)
            .bind(entry.vector.len() as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<EntryCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.source, e.content, e.metadata_json, v.embedding
            FROM entries e
            JOIN entry_vectors v ON v.entry_id = e.id
            ORDER BY e.seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let metadata_json: String = row.get("metadata_json");
                Ok(EntryCandidate {
                    entry_id: row.get("id"),
                    content: row.get("content"),
                    metadata: parse_metadata(&metadata_json, row.get("source"))?,
                    score: cosine_similarity(query_vec, &vec) as f64,
                })
            })
            .collect::<Result<Vec<EntryCandidate>>>()?;

        rank_candidates(&mut candidates, limit);
        Ok(candidates)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM entry_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM entries").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_by_source(&self) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source, COUNT(*) AS n FROM entries GROUP BY source ORDER BY n DESC, source ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(source, n)| (source, n.max(0) as u64))
            .collect())
    }

    async fn all_entries(&self) -> Result<Vec<(String, ChunkMetadata)>> {
        let rows = sqlx::query("SELECT source, content, metadata_json FROM entries ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let metadata_json: String = row.get("metadata_json");
                Ok((
                    row.get("content"),
                    parse_metadata(&metadata_json, row.get("source"))?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteStore {
        let pool = crate::db::connect_path(&tmp.path().join("recall.sqlite"))
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn entry(id: &str, source: &str, vector: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            content: format!("content {}", id),
            metadata: ChunkMetadata::new(source).with("page", 2),
            hash: String::new(),
            vector,
            model: "test".to_string(),
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn search_ranks_and_keeps_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .insert_entries(&[
                entry("a", "x.txt", vec![0.0, 1.0]),
                entry("b", "x.txt", vec![1.0, 0.0]),
                entry("c", "y.txt", vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = store.vector_search(&[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(hits[0].metadata.source, "x.txt");
        assert_eq!(hits[0].metadata.extra["page"], 2);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .insert_entries(&[entry("z", "s", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .insert_entries(&[entry("a", "s", vec![1.0, 0.0])])
            .await
            .unwrap();
        let hits = store.vector_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].entry_id, "z");
        assert_eq!(hits[1].entry_id, "a");
    }

    #[tokio::test]
    async fn failed_batch_inserts_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .insert_entries(&[entry("dup", "s", vec![1.0])])
            .await
            .unwrap();

        // second "dup" violates the unique id; "fresh" must roll back with it
        let result = store
            .insert_entries(&[entry("fresh", "s", vec![1.0]), entry("dup", "s", vec![1.0])])
            .await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_all_counts_and_persistence() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open_store(&tmp).await;
            store
                .insert_entries(&[
                    entry("a", "chat", vec![1.0]),
                    entry("b", "doc.md", vec![1.0]),
                    entry("c", "chat", vec![1.0]),
                ])
                .await
                .unwrap();
            store.pool().close().await;
        }

        let store = open_store(&tmp).await;
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(
            store.count_by_source().await.unwrap(),
            vec![("chat".to_string(), 2), ("doc.md".to_string(), 1)]
        );
        let all = store.all_entries().await.unwrap();
        assert_eq!(all[0].0, "content a");
        assert_eq!(all[1].1.source, "doc.md");

        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.vector_search(&[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_metadata_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .insert_entries(&[entry("a", "x.txt", vec![1.0, 0.0])])
            .await
            .unwrap();
        sqlx::query("UPDATE entries SET metadata_json = '{not json' WHERE id = 'a'")
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.vector_search(&[1.0, 0.0], 5).await.unwrap_err();
        assert!(err.to_string().contains("corrupt metadata_json"));
        assert!(store.all_entries().await.is_err());

        let index = crate::index::VectorIndex::new(
            std::sync::Arc::new(crate::embedding::HashProvider::new(2)),
            std::sync::Arc::new(store),
        );
        assert!(matches!(
            index.search("anything", 5).await,
            Err(crate::error::EngineError::Storage { .. })
        ));
    }
}
