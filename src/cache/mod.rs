//! Bounded LRU result caches with JSON persistence
//!
//! The cache never inspects its payloads; it stores opaque JSON values in an
//! LRU list. Every mutation (insert, update, or a hit that reorders the
//! list) rewrites the backing file, so the on-disk copy is never older than
//! the last acknowledged operation. Cache hits come back with a
//! `from_cache` marker injected; the engine strips it before responding.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::{debug, warn};

/// Marker key injected into cached payloads on a hit
pub const FROM_CACHE_KEY: &str = "from_cache";

/// One persisted LRU cache
pub struct ResultCache {
    path: PathBuf,
    capacity: usize,
    entries: HashMap<String, Value>,
    /// Front is LRU-oldest, back is most recently used
    order: VecDeque<String>,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the in-memory state from the backing file. A missing or
    /// corrupt file yields an empty cache; stored order is oldest-first.
    pub fn load(&mut self) {
        self.entries.clear();
        self.order.clear();

        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let parsed: Value = match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file unreadable, starting empty");
                return;
            }
        };
        let Some(items) = parsed.as_array() else {
            warn!(path = %self.path.display(), "cache file is not an array, starting empty");
            return;
        };

        for item in items {
            let (Some(key), Some(result)) = (
                item.get("key").and_then(Value::as_str),
                item.get("result"),
            ) else {
                continue;
            };
            if self.entries.len() >= self.capacity {
                break;
            }
            if self.entries.insert(key.to_string(), result.clone()).is_none() {
                self.order.push_back(key.to_string());
            }
        }
        debug!(path = %self.path.display(), entries = self.entries.len(), "cache loaded");
    }

    /// Look up a key. A hit moves it to the MRU end, persists the new
    /// order, and returns a copy carrying the `from_cache` marker.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.save();

        let mut result = self.entries.get(key).cloned()?;
        if let Some(obj) = result.as_object_mut() {
            obj.insert(FROM_CACHE_KEY.to_string(), json!(true));
        }
        Some(result)
    }

    /// Insert or refresh a key at the MRU end, evicting the LRU entry when
    /// the cache is full. The whole cache is persisted afterwards.
    pub fn put(&mut self, key: &str, value: Value) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.contains_key(key) {
            self.entries.insert(key.to_string(), value);
            self.touch(key);
        } else {
            if self.entries.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.entries.insert(key.to_string(), value);
            self.order.push_back(key.to_string());
        }
        self.save();
    }

    /// Write the cache to its file, oldest entry first. Failures are logged
    /// and ignored; the in-memory cache stays authoritative.
    pub fn save(&self) {
        let items: Vec<Value> = self
            .order
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .map(|result| json!({ "key": key, "result": result }))
            })
            .collect();

        let payload = match serde_json::to_vec_pretty(&Value::Array(items)) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache serialization failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, payload) {
            warn!(path = %self.path.display(), error = %e, "cache write failed");
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    #[cfg(test)]
    fn order_snapshot(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }
}
