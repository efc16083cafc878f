//! The heap's backing region: an anonymous memory map grown monotonically
//! by a brk offset, standing in for `sbrk`.
//!
//! The mapping is reserved at full capacity up front, so block addresses
//! (offsets from the base) stay stable across extensions.

use std::io;

use memmap2::MmapMut;

/// Capacity of the backing mapping. Extension past this point fails, which
/// surfaces as allocation exhaustion.
pub const MAX_HEAP: usize = 20 * (1 << 20);

pub struct HeapRegion {
    map: MmapMut,
    brk: usize,
}

impl HeapRegion {
    /// Reserve the backing mapping. No bytes are in use yet.
    pub fn new() -> io::Result<Self> {
        Ok(HeapRegion {
            map: MmapMut::map_anon(MAX_HEAP)?,
            brk: 0,
        })
    }

    /// Grow the in-use region by `bytes`, returning the old brk (the low
    /// offset of the added area). `None` when the mapping is exhausted.
    pub fn extend(&mut self, bytes: usize) -> Option<usize> {
        let old = self.brk;
        let new = old.checked_add(bytes)?;
        if new > MAX_HEAP {
            return None;
        }
        self.brk = new;
        Some(old)
    }

    /// Low bound of the in-use region, as an offset.
    #[inline(always)]
    pub fn lo(&self) -> usize {
        0
    }

    /// High bound (exclusive) of the in-use region, as an offset.
    #[inline(always)]
    pub fn hi(&self) -> usize {
        self.brk
    }

    #[inline(always)]
    pub fn base(&self) -> *const u8 {
        self.map.as_ptr()
    }

    #[inline(always)]
    pub fn base_mut(&mut self) -> *mut u8 {
        self.map.as_mut_ptr()
    }
}
