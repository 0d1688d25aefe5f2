//! Error taxonomy for the retrieval engine.
//!
//! Lower layers (stores, embedding providers, loaders) return
//! [`anyhow::Result`]. The [`VectorIndex`](crate::index::VectorIndex)
//! classifies those failures into the two index categories below so the
//! calling layer can tell "the embedder is down" apart from "the disk is
//! broken" without string matching.
//!
//! Ingest failures (unsupported format, empty or unreadable file) are not
//! errors at all: ingest operations report them as `Ok(false)`.

use std::time::Duration;

/// Boxed lower-level cause, kept for [`std::error::Error::source`] chains.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The embedding provider is disabled, unreachable, or returned garbage.
    #[error("retrieval unavailable: {source}")]
    RetrievalUnavailable {
        #[source]
        source: BoxError,
    },

    /// The persistent store failed to read, write, or delete.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: BoxError,
    },

    /// A single batch query exceeded its per-query timeout.
    #[error("query '{query}' timed out after {after:?}")]
    Timeout { query: String, after: Duration },

    /// The whole batch was cancelled through its [`CancelToken`](crate::batch::CancelToken).
    #[error("batch search cancelled")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    pub fn retrieval_unavailable(err: impl Into<BoxError>) -> Self {
        Self::RetrievalUnavailable {
            source: err.into(),
        }
    }

    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage { source: err.into() }
    }

    /// True for the two index-unavailable categories.
    ///
    /// Neither is retried by the engine; retry policy belongs to the caller.
    pub fn is_index_unavailable(&self) -> bool {
        matches!(
            self,
            EngineError::RetrievalUnavailable { .. } | EngineError::Storage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_errors_convert_into_categories() {
        let err = EngineError::retrieval_unavailable(anyhow::anyhow!("connection refused"));
        assert!(err.is_index_unavailable());
        assert_eq!(err.to_string(), "retrieval unavailable: connection refused");

        let err = EngineError::storage(anyhow::anyhow!("disk full"));
        assert!(matches!(err, EngineError::Storage { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn timeout_is_not_index_unavailable() {
        let err = EngineError::Timeout {
            query: "q".to_string(),
            after: Duration::from_secs(2),
        };
        assert!(!err.is_index_unavailable());
        assert!(err.to_string().contains("timed out"));
    }
}
