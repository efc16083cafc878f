//! Two systems components sharing no state:
//!
//! - [`heap`]: a single-threaded, size-segregated heap allocator with
//!   boundary-tag coalescing over an mmap-backed region.
//! - [`cache`] + [`proxy`]: a concurrent HTTP/1.0 forward proxy whose
//!   responses are kept in a bounded, least-recently-added cache.

pub mod cache;
pub mod heap;
pub mod proxy;

pub use cache::{ResponseCache, WebObject, MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
pub use heap::Heap;
