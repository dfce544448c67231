use crate::config::ExplorerConfig;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bounded preview store keyed by object key, evicting the least recently used entry.
///
/// Lookups take the read lock only; recency is tracked with a per-entry atomic tick.
pub struct PreviewCache {
    capacity: usize,
    clock: AtomicU64,
    entries: RwLock<HashMap<String, (Bytes, AtomicU64)>>,
}

impl PreviewCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self::new(config.preview_cache_capacity)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|(data, last_used)| {
            last_used.store(self.tick(), Ordering::Relaxed);
            data.clone()
        })
    }

    pub fn insert(&self, key: impl Into<String>, data: Bytes) {
        if self.capacity == 0 {
            return;
        }
        let key = key.into();
        let stamp = self.tick();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (_, last_used))| last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!("Evicting preview for {}", oldest);
                entries.remove(&oldest);
            }
        }
        entries.insert(key, (data, AtomicU64::new(stamp)));
    }

    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .map(|(data, _)| data)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
