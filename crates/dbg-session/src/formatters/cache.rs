//! Compiled matchers for regex and glob type-name specifiers.
//!
//! Lookups walk every rule of every enabled category, so matchers are compiled
//! once and shared. The cache is bounded; the least recently used entry is
//! evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use regex::Regex;

/// Default number of matchers kept.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Default)]
struct Entries {
    compiled: HashMap<String, Arc<Regex>>,
    recency: VecDeque<String>,
}

impl Entries {
    fn touch(&mut self, source: &str) {
        if let Some(pos) = self.recency.iter().position(|s| s == source) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }
}

/// Bounded cache of compiled matchers keyed by regex source.
pub struct MatcherCache {
    entries: Mutex<Entries>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl MatcherCache {
    /// Create a cache holding at most `capacity` matchers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Return the compiled matcher for `source`, compiling it on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not a valid regex.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Regex>, regex::Error> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = entries.compiled.get(source).cloned() {
                entries.touch(source);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(found);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(Regex::new(source)?);

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = entries.compiled.get(source).cloned() {
            return Ok(found);
        }
        while entries.compiled.len() >= self.capacity {
            let Some(oldest) = entries.recency.pop_front() else {
                break;
            };
            entries.compiled.remove(&oldest);
        }
        entries
            .compiled
            .insert(source.to_string(), Arc::clone(&compiled));
        entries.recency.push_back(source.to_string());
        Ok(compiled)
    }

    /// Check if a source is cached.
    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .compiled
            .contains_key(source)
    }

    /// Number of cached matchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .compiled
            .len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached matcher.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.compiled.clear();
        entries.recency.clear();
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for MatcherCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Counters of a [`MatcherCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached matchers.
    pub size: usize,
    /// Maximum number of cached matchers.
    pub capacity: usize,
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that compiled a matcher.
    pub misses: usize,
}

/// Process-wide matcher cache.
pub static MATCHERS: LazyLock<MatcherCache> = LazyLock::new(MatcherCache::default);

/// Release compiled matchers, e.g. under memory pressure.
pub fn release_matchers() -> usize {
    let released = MATCHERS.len();
    MATCHERS.clear();
    released
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_once() {
        let cache = MatcherCache::new(4);
        let a = cache.get_or_compile("^int$").unwrap();
        let b = cache.get_or_compile("^int$").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = MatcherCache::new(2);
        cache.get_or_compile("a").unwrap();
        cache.get_or_compile("b").unwrap();
        cache.get_or_compile("a").unwrap();
        cache.get_or_compile("c").unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn invalid_source_is_an_error() {
        let cache = MatcherCache::new(2);
        assert!(cache.get_or_compile("(unclosed").is_err());
        assert!(cache.is_empty());
    }
}
