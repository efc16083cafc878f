//! Bounded response cache for the proxy.
//!
//! Web objects are kept in insertion order: the most recently added sits
//! at the back, eviction always takes the front (the least recently
//! added). A hit does not reorder anything, so the policy approximates
//! LRU by least-recently-inserted.
//!
//! The interior is guarded by a single readers-writer lock. `find` clones
//! an `Arc` out under the read lock, so callers stream a hit to the
//! network after releasing it; a concurrent eviction only drops the
//! cache's own reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashlink::LinkedHashMap;
use parking_lot::RwLock;

/// Total byte budget for cached response bodies.
pub const MAX_CACHE_SIZE: usize = 1_049_000;

/// Largest single response admitted to the cache.
pub const MAX_OBJECT_SIZE: usize = 102_400;

/// One cached web object: the exact request line it answers and the raw
/// response bytes.
pub struct WebObject {
    pub request_line: String,
    pub response: Box<[u8]>,
}

impl WebObject {
    #[inline]
    pub fn size(&self) -> usize {
        self.response.len()
    }
}

struct CacheInner {
    /// Front = least recently added, back = most recently added.
    objects: LinkedHashMap<String, Arc<WebObject>>,
    bytes_left: usize,
}

/// Snapshot of cache counters.
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub max_size: usize,
    pub bytes_left: usize,
    pub objects: usize,
}

pub struct ResponseCache {
    inner: RwLock<CacheInner>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_size: usize) -> Self {
        ResponseCache {
            inner: RwLock::new(CacheInner {
                objects: LinkedHashMap::new(),
                bytes_left: max_size,
            }),
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a response by its exact request line. A hit does not
    /// change the object's eviction position.
    pub fn find(&self, request_line: &str) -> Option<Arc<WebObject>> {
        let inner = self.inner.read();
        match inner.objects.get(request_line) {
            Some(obj) => {
                let obj = Arc::clone(obj);
                drop(inner);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(obj)
            }
            None => {
                drop(inner);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a response as the most recently added object, evicting from
    /// the least recently added end until it fits.
    ///
    /// An object larger than the whole cache is never admitted; callers
    /// filter at [`MAX_OBJECT_SIZE`] well before that point.
    pub fn insert(&self, request_line: String, response: Vec<u8>) {
        let obj = WebObject {
            request_line: request_line.clone(),
            response: response.into_boxed_slice(),
        };
        let size = obj.size();
        if size > self.max_size {
            return;
        }

        let mut inner = self.inner.write();

        // Re-inserting a key replaces the old object and takes a fresh
        // position at the back.
        if let Some(old) = inner.objects.remove(&request_line) {
            inner.bytes_left += old.size();
        }

        while inner.bytes_left < size {
            match inner.objects.pop_front() {
                Some((_, lra)) => inner.bytes_left += lra.size(),
                // Unreachable: an empty cache has the full budget free.
                None => break,
            }
        }

        inner.bytes_left -= size;
        inner.objects.insert(request_line, Arc::new(obj));
    }

    /// Drop an object, returning its bytes to the budget. Returns whether
    /// the key was present.
    pub fn remove(&self, request_line: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.objects.remove(request_line) {
            Some(obj) => {
                inner.bytes_left += obj.size();
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            max_size: self.max_size,
            bytes_left: inner.bytes_left,
            objects: inner.objects.len(),
        }
    }
}
