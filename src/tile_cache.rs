//! Process-wide LRU cache of decoded tile units.
//!
//! Keyed by (source identifier, linear unit index) so repeated assemblies of
//! overlapping windows skip the codec entirely. Capacity is bounded in bytes,
//! not entries; oversized units bypass the cache.

use lru::LruCache;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

const CACHE_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

#[derive(Clone, Eq, PartialEq)]
struct UnitKey {
    source: Arc<str>,
    index: u32,
}

impl Hash for UnitKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.index.hash(state);
    }
}

struct CacheEntry {
    data: Arc<Vec<u8>>,
    size_bytes: usize,
}

struct UnitCache {
    current_bytes: usize,
    capacity_bytes: usize,
    entries: LruCache<UnitKey, CacheEntry>,
}

impl UnitCache {
    fn new(capacity_bytes: usize) -> Self {
        UnitCache {
            current_bytes: 0,
            capacity_bytes,
            entries: LruCache::unbounded(),
        }
    }

    fn get(&mut self, key: &UnitKey) -> Option<Arc<Vec<u8>>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry.data))
    }

    fn insert(&mut self, key: UnitKey, data: Arc<Vec<u8>>) {
        let size_bytes = data.len();
        if size_bytes > self.capacity_bytes {
            return;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.current_bytes = self.current_bytes.saturating_sub(old.size_bytes);
        }

        while self.current_bytes + size_bytes > self.capacity_bytes {
            if let Some((_key, entry)) = self.entries.pop_lru() {
                self.current_bytes = self.current_bytes.saturating_sub(entry.size_bytes);
            } else {
                break;
            }
        }

        self.current_bytes = self.current_bytes.saturating_add(size_bytes);
        self.entries.put(key, CacheEntry { data, size_bytes });
    }
}

static UNIT_CACHE: std::sync::LazyLock<Mutex<UnitCache>> =
    std::sync::LazyLock::new(|| Mutex::new(UnitCache::new(CACHE_CAPACITY_BYTES)));

fn make_key(source: &Arc<str>, index: usize) -> UnitKey {
    UnitKey {
        source: Arc::clone(source),
        index: index as u32,
    }
}

pub fn get(source: &Arc<str>, index: usize) -> Option<Arc<Vec<u8>>> {
    let key = make_key(source, index);
    UNIT_CACHE.lock().unwrap().get(&key)
}

pub fn insert(source: &Arc<str>, index: usize, data: Arc<Vec<u8>>) {
    let key = make_key(source, index);
    UNIT_CACHE.lock().unwrap().insert(key, data);
}
