use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::model::Schema;

/// Thread-safe LRU cache of field layouts, keyed by layout id.
///
/// Discovery reads the same few layouts over and over (every candidate of a
/// type usually shares one), so resolving each layout once per store saves a
/// join per schema lookup.
pub struct SchemaCache {
    cache: Mutex<LruCache<i64, Schema>>,
}

impl SchemaCache {
    /// Create a cache holding at most `capacity` layouts (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Cached schema for a layout. A poisoned lock reads as a miss.
    pub fn get(&self, layout_id: i64) -> Option<Schema> {
        self.cache.lock().ok()?.get(&layout_id).cloned()
    }

    pub fn put(&self, layout_id: i64, schema: Schema) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(layout_id, schema);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached layout, e.g. after an import changed them.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}
