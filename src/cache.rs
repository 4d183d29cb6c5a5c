use crate::config::{CacheConfig, QualityTtl};
use crate::model::Quality;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at_millis: u64,
    ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    fn is_fresh_at(&self, now_millis: u64) -> bool {
        now_millis.saturating_sub(self.stored_at_millis) < self.ttl_ms
    }
}

/// Quality-adaptive TTL cache over fetched wallet profiles.
///
/// A stale entry is logically absent but stays resident until the size
/// cap forces an eviction; eviction removes the single oldest entry by
/// insertion time. This cache exists to conserve credits, never to hold
/// correctness-critical data — last write wins.
#[derive(Debug, Clone)]
pub struct ScoreCache<V> {
    max_entries: usize,
    ttl: QualityTtl,
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V: Clone> ScoreCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries.max(1),
            ttl: config.ttl.clone(),
            entries: HashMap::new(),
        }
    }

    pub fn get_at(&self, key: &str, now_millis: u64) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now_millis))
            .map(|entry| entry.value.clone())
    }

    /// TTL is chosen from `quality` at insertion time; a better result
    /// stays cached longer.
    pub fn put_at(&mut self, key: &str, value: V, quality: Quality, now_millis: u64) {
        let ttl_ms = self.ttl.ttl_for(quality);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at_millis: now_millis,
                ttl_ms,
            },
        );
        if self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    /// Batch read used by the scheduler: fresh values on the left,
    /// stale-or-absent keys (the ones that must be fetched) on the right.
    pub fn split_by_freshness_at(
        &self,
        keys: &[String],
        now_millis: u64,
    ) -> (Vec<(String, V)>, Vec<String>) {
        let mut fresh = Vec::new();
        let mut missing = Vec::new();
        for key in keys {
            match self.get_at(key, now_millis) {
                Some(value) => fresh.push((key.clone(), value)),
                None => missing.push(key.clone()),
            }
        }
        (fresh, missing)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at_millis)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
