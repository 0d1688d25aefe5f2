//! Types for concurrent multi-query search.
//!
//! [`RetrievalEngine::batch_search`](crate::engine::RetrievalEngine::batch_search)
//! runs each query independently, bypassing the query cache, with bounded
//! concurrency. Outcomes arrive in **completion order**, which is
//! nondeterministic; every outcome carries its query and submission
//! position so callers can regroup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{EngineError, Result};
use crate::models::SearchResult;

/// Cancels every query still pending in a batch.
///
/// Clones share state. Queries that already completed keep their results;
/// the rest resolve to [`EngineError::Cancelled`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // register before checking so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Per-call overrides for a batch.
#[derive(Clone, Default)]
pub struct BatchOptions {
    /// Queries in flight at once; `None` uses `batch.max_concurrency`.
    pub concurrency: Option<usize>,
    /// Per-query timeout; `None` uses `batch.query_timeout_secs`.
    pub query_timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl BatchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

/// Result of one query within a batch.
#[derive(Debug)]
pub struct QueryOutcome {
    pub query: String,
    /// Index of the query in the submitted slice.
    pub position: usize,
    pub results: Result<Vec<SearchResult>>,
}

/// All outcomes of a batch, in completion order.
#[derive(Debug, Default)]
pub struct BatchResults {
    pub outcomes: Vec<QueryOutcome>,
}

impl BatchResults {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcome for the first submitted occurrence of `query`.
    pub fn for_query(&self, query: &str) -> Option<&QueryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.query == query)
            .min_by_key(|o| o.position)
    }

    /// Outcomes reordered by submission position.
    pub fn in_submission_order(&self) -> Vec<&QueryOutcome> {
        let mut ordered: Vec<&QueryOutcome> = self.outcomes.iter().collect();
        ordered.sort_by_key(|o| o.position);
        ordered
    }

    /// Concatenate every query's results in completion order.
    ///
    /// Fails with the first error encountered, since a flattened view has
    /// nowhere to report a partial failure.
    pub fn flatten(self) -> Result<Vec<SearchResult>> {
        let mut flat = Vec::new();
        for outcome in self.outcomes {
            flat.extend(outcome.results?);
        }
        Ok(flat)
    }

    /// Number of queries that failed.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.results.is_err()).count()
    }
}

impl From<Vec<QueryOutcome>> for BatchResults {
    fn from(outcomes: Vec<QueryOutcome>) -> Self {
        Self { outcomes }
    }
}

/// Run `search` under an optional timeout, racing the batch cancel token.
pub(crate) async fn guarded<F>(
    query: &str,
    search: F,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<Vec<SearchResult>>
where
    F: std::future::Future<Output = Result<Vec<SearchResult>>>,
{
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let timed = async {
        match timeout {
            Some(after) => match tokio::time::timeout(after, search).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout {
                    query: query.to_string(),
                    after,
                }),
            },
            None => search.await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        result = timed => result,
    }
}
