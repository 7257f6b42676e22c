//! Bounded memoization of executed page queries.
//!
//! At most one computation runs per distinct in-flight key: racing callers
//! serialize on a per-key lock and re-check the map before computing, so
//! debounced UI events cannot duplicate an expensive scan.

use crate::error::Result;
use crate::query::{PageResult, QueryKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Hit/miss/eviction counters for the stats surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU cache over query keys with per-key in-flight deduplication.
pub struct QueryCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<QueryKey, Arc<PageResult>>,
    /// Recency order, least recent first. Small (bounded by capacity), so a
    /// linear touch is fine.
    recency: Vec<QueryKey>,
    /// Per-key computation locks for queries currently executing.
    in_flight: HashMap<QueryKey, Arc<Mutex<()>>>,
    /// Bumped by `invalidate_all` so a computation that started against a
    /// replaced data source cannot install a stale entry afterwards.
    generation: u64,
    stats: CacheStats,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: Vec::new(),
                in_flight: HashMap::new(),
                generation: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Return the cached result for `key`, or run `compute` and cache it.
    ///
    /// Failed computations never populate the cache. A result computed
    /// against a generation that has since been invalidated is returned to
    /// its caller but not cached.
    pub fn get_or_compute<F>(&self, key: &QueryKey, compute: F) -> Result<Arc<PageResult>>
    where
        F: FnOnce() -> Result<PageResult>,
    {
        let (slot, generation) = {
            let mut inner = self.lock_inner();
            if let Some(result) = inner.hit(key) {
                return Ok(result);
            }
            let slot = inner
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            (slot, inner.generation)
        };

        // Serialize per key: the first holder computes, later holders find
        // the entry on re-check and return without computing.
        let _guard = lock_recovering(&slot);
        {
            let mut inner = self.lock_inner();
            if let Some(result) = inner.hit(key) {
                return Ok(result);
            }
            inner.stats.misses += 1;
        }

        // The expensive scan runs without holding the cache-wide lock.
        let computed = compute();

        let mut inner = self.lock_inner();
        inner.in_flight.remove(key);
        let page = Arc::new(computed?);
        if inner.generation == generation {
            inner.insert(key.clone(), page.clone(), self.capacity);
        }
        Ok(page)
    }

    /// Drop every entry. Called whenever the data source is replaced.
    pub fn invalidate_all(&self) {
        let mut inner = self.lock_inner();
        inner.entries.clear();
        inner.recency.clear();
        inner.generation += 1;
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock_inner().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.lock_inner().stats
    }

    fn lock_inner(&self) -> MutexGuard<'_, CacheInner> {
        lock_recovering(&self.inner)
    }
}

/// A poisoned lock only means another caller panicked mid-update; the cache
/// state itself stays coherent (entries/recency are updated together), so
/// recover rather than propagate the panic.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CacheInner {
    fn hit(&mut self, key: &QueryKey) -> Option<Arc<PageResult>> {
        let result = self.entries.get(key)?.clone();
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            let k = self.recency.remove(pos);
            self.recency.push(k);
        }
        self.stats.hits += 1;
        Some(result)
    }

    fn insert(&mut self, key: QueryKey, result: Arc<PageResult>, capacity: usize) {
        while self.entries.len() >= capacity && !self.recency.is_empty() {
            let lru = self.recency.remove(0);
            self.entries.remove(&lru);
            self.stats.evictions += 1;
        }
        self.entries.insert(key.clone(), result);
        self.recency.push(key);
    }
}
