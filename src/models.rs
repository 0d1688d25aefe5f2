//! Core data models used throughout the recall engine.
//!
//! These types represent the chunks, indexed entries, and search results
//! that flow through the ingest and query pipelines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source label attached to recorded question/answer exchanges.
pub const CHAT_SOURCE: &str = "chat";

/// Source label for imported entries that carry no source of their own.
pub const IMPORT_SOURCE: &str = "import";

/// Metadata stored alongside every indexed entry.
///
/// `source` is always present (a filename, `"chat"`, or `"import"`).
/// Anything else a caller attaches survives the round trip through the
/// store in `extra`, flattened into the same JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// A bounded fragment of a document, the unit of indexing.
///
/// A chunk has no identity beyond content and source; duplicates are
/// permitted and never deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata::new(source),
        }
    }
}

/// A chunk plus its embedding, as persisted by a [`Store`](crate::store::Store).
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// SHA-256 of `content`.
    pub hash: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub created_at: i64,
}

/// A ranked result returned by search, ordered by descending similarity.
///
/// This is also the shape handed to the language model as context and
/// the shape used by knowledge-base export/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query (`0.0` for exported entries).
    #[serde(default)]
    pub score: f32,
}

/// Entry counts for `recall stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub total: u64,
    /// `(source, count)`, largest first.
    pub per_source: Vec<(String, u64)>,
}
