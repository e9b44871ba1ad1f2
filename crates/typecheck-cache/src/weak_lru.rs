//! # Weak-Referencing LRU Cache
//!
//! Strict least-recently-used memoization over [`CacheKey`]s. Recency order
//! and the hit/miss counters live behind one [`parking_lot::Mutex`].
//!
//! The lock is released while `compute` runs, so a computation may consult
//! the same cache (recursive memoized functions). Two threads missing on the
//! same key at once both compute; the later insert wins.
//!
//! An entry whose key refers to an object that has since been dropped is
//! stale. It is found on lookup, counted as a miss, and removed; there is no
//! background sweep.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Weak;

use lru::LruCache;
use parking_lot::Mutex;
use typecheck_core::Object;

use crate::key::CacheKey;

/// Counters reported by [`WeakLruCache::cache_info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    /// `None` for an unbounded cache.
    pub maxsize: Option<usize>,
    pub currsize: usize,
}

impl fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheInfo(hits={}, misses={}, maxsize=", self.hits, self.misses)?;
        match self.maxsize {
            Some(n) => write!(f, "{n}")?,
            None => f.write_str("None")?,
        }
        write!(f, ", currsize={})", self.currsize)
    }
}

struct Entry<V> {
    value: V,
    referents: Vec<Weak<Object>>,
}

struct Inner<V> {
    entries: LruCache<CacheKey, Entry<V>>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> Inner<V> {
    /// A live hit, promoted to most recently used. Stale entries are dropped.
    fn lookup(&mut self, key: &CacheKey) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.referents.iter().all(|r| r.strong_count() > 0) {
            return Some(entry.value.clone());
        }
        let referents = entry.referents.len();
        self.entries.pop(key);
        tracing::debug!(referents, "cache entry dropped: argument no longer alive");
        None
    }
}

/// A bounded (or unbounded) LRU memo table.
pub struct WeakLruCache<V> {
    maxsize: Option<usize>,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> WeakLruCache<V> {
    /// `None` disables eviction; `Some(0)` stores nothing.
    pub fn new(maxsize: Option<usize>) -> Self {
        let entries = match maxsize.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            maxsize,
            inner: Mutex::new(Inner {
                entries,
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn maxsize(&self) -> Option<usize> {
        self.maxsize
    }

    /// Return the cached value for `key`, or compute, store, and return it.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.get_or_try_compute(key, || Ok::<V, std::convert::Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`get_or_compute`](Self::get_or_compute). A failed
    /// computation stores nothing.
    pub fn get_or_try_compute<F, E>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        {
            let mut inner = self.inner.lock();
            if let Some(hit) = inner.lookup(&key) {
                inner.hits += 1;
                return Ok(hit);
            }
            inner.misses += 1;
        }

        let value = compute()?;
        if self.maxsize != Some(0) {
            let entry = Entry {
                value: value.clone(),
                referents: key.referents().to_vec(),
            };
            self.inner.lock().entries.put(key, entry);
        }
        Ok(value)
    }

    /// Look up without computing. Counts a hit or a miss.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut inner = self.inner.lock();
        let found = inner.lookup(key);
        match found {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        found
    }

    pub fn cache_info(&self) -> CacheInfo {
        let inner = self.inner.lock();
        CacheInfo {
            hits: inner.hits,
            misses: inner.misses,
            maxsize: self.maxsize,
            currsize: inner.entries.len(),
        }
    }

    /// Drop every entry and zero the counters.
    pub fn cache_clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> fmt::Debug for WeakLruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("WeakLruCache")
            .field("maxsize", &self.maxsize)
            .field("currsize", &inner.entries.len())
            .field("hits", &inner.hits)
            .field("misses", &inner.misses)
            .finish()
    }
}
