//! Fingerprint-keyed cache of parsed source models with LRU eviction.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::EvolveConfig;
use crate::errors::EvolveResult;
use crate::source::language::SourceLanguage;
use crate::source::model::{fingerprint, SourceModel};

pub const DEFAULT_CACHE_ENTRIES: usize = 128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

struct CacheState {
    models: IndexMap<String, Arc<SourceModel>>,
    hits: u64,
    misses: u64,
}

pub struct SourceCache {
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl SourceCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState {
                models: IndexMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Sized by `cache.max_entries`.
    pub fn from_config(config: &EvolveConfig) -> Self {
        Self::new(config.cache.max_entries)
    }

    /// Return the cached model for this text, parsing it on a miss.
    ///
    /// Parse failures are returned to the caller and never cached.
    pub fn get_or_parse(
        &self,
        language: SourceLanguage,
        source: &str,
    ) -> EvolveResult<Arc<SourceModel>> {
        let key = fingerprint(language, source);
        {
            let mut state = self.state.lock();
            if let Some(model) = state.models.shift_remove(&key) {
                // Move to end for LRU
                state.models.insert(key, Arc::clone(&model));
                state.hits += 1;
                return Ok(model);
            }
            state.misses += 1;
        }

        // Parse outside the lock; a concurrent miss on the same key just
        // overwrites an equal model.
        let model = Arc::new(SourceModel::parse(language, source)?);
        let mut state = self.state.lock();
        state.models.insert(key, Arc::clone(&model));
        while state.models.len() > self.max_entries {
            if let Some((evicted, _)) = state.models.shift_remove_index(0) {
                debug!(fingerprint = %evicted, "evicted source model");
            }
        }
        Ok(model)
    }

    pub fn clear(&self) {
        self.state.lock().models.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.models.len(),
            max_entries: self.max_entries,
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sized_from_config() {
        let mut config = EvolveConfig::default();
        config.cache.max_entries = 2;
        let cache = SourceCache::from_config(&config);
        for body in ["1", "2", "3"] {
            cache
                .get_or_parse(SourceLanguage::Python, &format!("def f():\n    return {body}\n"))
                .unwrap();
        }
        let stats = cache.stats();
        assert_eq!(stats.max_entries, 2);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_hit_returns_same_model() {
        let cache = SourceCache::new(4);
        let first = cache.get_or_parse(SourceLanguage::Python, "def f():\n    pass\n").unwrap();
        let second = cache.get_or_parse(SourceLanguage::Python, "def f():\n    pass\n").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = SourceCache::new(2);
        let a = "def a():\n    pass\n";
        let b = "def b():\n    pass\n";
        let c = "def c():\n    pass\n";
        let first_a = cache.get_or_parse(SourceLanguage::Python, a).unwrap();
        cache.get_or_parse(SourceLanguage::Python, b).unwrap();
        // Touch `a` so `b` becomes the eviction candidate.
        cache.get_or_parse(SourceLanguage::Python, a).unwrap();
        cache.get_or_parse(SourceLanguage::Python, c).unwrap();
        assert_eq!(cache.stats().entries, 2);
        let again_a = cache.get_or_parse(SourceLanguage::Python, a).unwrap();
        assert!(Arc::ptr_eq(&first_a, &again_a));
    }

    #[test]
    fn test_parse_failure_not_cached() {
        let cache = SourceCache::new(2);
        assert!(cache.get_or_parse(SourceLanguage::Python, "def (:\n").is_err());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(SourceCache::new(0).stats().max_entries, 1);
    }
}
