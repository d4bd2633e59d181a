use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;

/// A string-keyed map sharded into `S` stripes, each behind its own
/// read-write lock, so that callers touching different shards never
/// contend. Shard assignment is a pure function of the key: `shard_of(key)
/// == i mod S`, fixed for the process, so every caller agrees on which
/// stripe a given key lives in without needing to consult the map itself.
///
/// Iteration takes a snapshot of each shard's keys under that shard's read
/// lock independently; it is not a globally consistent view across shards,
/// which is fine for the callers of this map (they tolerate eventual
/// visibility of concurrent writes, per the inverted index's own
/// "completed write is visible to later reads" contract).
pub struct SegmentedMap<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
}

impl<V> SegmentedMap<V> {
    pub fn new(stripes: usize) -> Self {
        Self::with_capacity_hint(stripes, 0)
    }

    /// `total_estimate` is divided evenly across stripes, mirroring the
    /// original's `cap/seg` per-shard pre-sizing.
    pub fn with_capacity_hint(stripes: usize, total_estimate: usize) -> Self {
        let stripes = stripes.max(1);
        let per_shard = total_estimate / stripes;
        let shards = (0..stripes).map(|_| RwLock::new(HashMap::with_capacity(per_shard))).collect();
        SegmentedMap { shards }
    }

    fn shard_of(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    pub fn stripes(&self) -> usize {
        self.shards.len()
    }
}

impl<V: Clone> SegmentedMap<V> {
    pub fn get(&self, key: &str) -> Option<V> {
        let shard = self.shards[self.shard_of(key)].read();
        shard.get(key).cloned()
    }
}

impl<V> SegmentedMap<V> {
    pub fn contains(&self, key: &str) -> bool {
        let shard = self.shards[self.shard_of(key)].read();
        shard.contains_key(key)
    }

    pub fn set(&self, key: &str, value: V) {
        let mut shard = self.shards[self.shard_of(key)].write();
        shard.insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut shard = self.shards[self.shard_of(key)].write();
        shard.remove(key)
    }

    /// Run `f` against the entry for `key`, inserting `default()` first if
    /// absent. Held under a single write lock for the shard, so the
    /// get-or-insert is atomic with respect to other writers of that shard.
    pub fn with_entry_or_insert<R>(&self, key: &str, default: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R {
        let mut shard = self.shards[self.shard_of(key)].write();
        let entry = shard.entry(key.to_string()).or_insert_with(default);
        f(entry)
    }

    /// Run `f` against the entry for `key` if present.
    pub fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut shard = self.shards[self.shard_of(key)].write();
        shard.get_mut(key).map(f)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all keys currently present, one shard at a time.
    pub fn keys_snapshot(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for shard in &self.shards {
            keys.extend(shard.read().keys().cloned());
        }
        keys
    }
}
