//! Bounded query cache.
//!
//! Maps `(query, k, page)` to the **unsliced** result set fetched for that
//! key (`k * page` rows). Because `page` is part of the key, different pages
//! of one query store overlapping prefixes of the same ranking.
//!
//! Each slot records the index generation observed *before* its results
//! were computed. A lookup made under a newer generation drops the slot and
//! reports a miss, so ingest, import and reset can never be masked by old
//! results.
//!
//! Eviction is least-recently-used once `max_entries` is reached. Lookups
//! and inserts take a short `std::sync::Mutex`; a poisoned lock is logged
//! and treated as a miss.
//!
//! Check-then-insert is not atomic: two identical concurrent queries may
//! both miss and both store. That is harmless only while results for one
//! key at one generation are computed deterministically; anything that
//! makes search nondeterministic must revisit this.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::models::SearchResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub k: usize,
    pub page: usize,
}

impl CacheKey {
    pub fn new(query: &str, k: usize, page: usize) -> Self {
        Self {
            query: query.to_string(),
            k,
            page,
        }
    }
}

struct Slot {
    results: Arc<Vec<SearchResult>>,
    generation: u64,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<CacheKey, Slot>,
    tick: u64,
}

pub struct QueryCache {
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl QueryCache {
    /// A `max_entries` of zero disables caching entirely.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_entries > 0
    }

    fn lock(&self) -> Option<MutexGuard<'_, Inner>> {
        match self.inner.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("query cache lock poisoned; treating as miss");
                None
            }
        }
    }

    /// Cached results for `key`, valid only if tagged with `generation`.
    pub fn get(&self, key: &CacheKey, generation: u64) -> Option<Arc<Vec<SearchResult>>> {
        if !self.is_enabled() {
            return None;
        }
        let mut inner = self.lock()?;
        inner.tick += 1;
        let tick = inner.tick;

        match inner.slots.get_mut(key) {
            None => return None,
            Some(slot) if slot.generation == generation => {
                slot.last_used = tick;
                return Some(Arc::clone(&slot.results));
            }
            Some(_) => {}
        }
        inner.slots.remove(key);
        None
    }

    /// Store `results` for `key` under the generation observed before they
    /// were computed.
    pub fn insert(&self, key: CacheKey, generation: u64, results: Arc<Vec<SearchResult>>) {
        if !self.is_enabled() {
            return;
        }
        let Some(mut inner) = self.lock() else {
            return;
        };
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.max_entries {
            let oldest = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.slots.remove(&oldest);
            }
        }

        inner.slots.insert(
            key,
            Slot {
                results,
                generation,
                last_used: tick,
            },
        );
    }

    pub fn clear(&self) {
        if let Some(mut inner) = self.lock() {
            inner.slots.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn results(text: &str) -> Arc<Vec<SearchResult>> {
        Arc::new(vec![SearchResult {
            content: text.to_string(),
            metadata: ChunkMetadata::new("s"),
            score: 1.0,
        }])
    }

    #[test]
    fn hit_returns_same_results() {
        let cache = QueryCache::new(4);
        let key = CacheKey::new("q", 3, 1);
        assert!(cache.get(&key, 0).is_none());

        cache.insert(key.clone(), 0, results("a"));
        let hit = cache.get(&key, 0).unwrap();
        assert_eq!(hit[0].content, "a");
    }

    #[test]
    fn page_and_k_are_part_of_the_key() {
        let cache = QueryCache::new(4);
        cache.insert(CacheKey::new("q", 3, 1), 0, results("p1"));
        assert!(cache.get(&CacheKey::new("q", 3, 2), 0).is_none());
        assert!(cache.get(&CacheKey::new("q", 2, 1), 0).is_none());
    }

    #[test]
    fn newer_generation_rejects_and_drops_slot() {
        let cache = QueryCache::new(4);
        let key = CacheKey::new("q", 3, 1);
        cache.insert(key.clone(), 0, results("old"));
        assert!(cache.get(&key, 1).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = QueryCache::new(2);
        let a = CacheKey::new("a", 1, 1);
        let b = CacheKey::new("b", 1, 1);
        let c = CacheKey::new("c", 1, 1);
        cache.insert(a.clone(), 0, results("a"));
        cache.insert(b.clone(), 0, results("b"));
        // touch a so b becomes the eviction candidate
        assert!(cache.get(&a, 0).is_some());
        cache.insert(c.clone(), 0, results("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a, 0).is_some());
        assert!(cache.get(&b, 0).is_none());
        assert!(cache.get(&c, 0).is_some());
    }

    #[test]
    fn reinsert_does_not_evict() {
        let cache = QueryCache::new(1);
        let a = CacheKey::new("a", 1, 1);
        cache.insert(a.clone(), 0, results("first"));
        cache.insert(a.clone(), 0, results("second"));
        assert_eq!(cache.get(&a, 0).unwrap()[0].content, "second");
    }

    #[test]
    fn zero_capacity_disables() {
        let cache = QueryCache::new(0);
        let key = CacheKey::new("q", 1, 1);
        cache.insert(key.clone(), 0, results("a"));
        assert!(cache.get(&key, 0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties() {
        let cache = QueryCache::new(4);
        cache.insert(CacheKey::new("q", 1, 1), 0, results("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
