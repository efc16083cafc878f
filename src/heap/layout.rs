//! Boundary-tag word layout and size-class math.
//!
//! Every block in the heap carries a header and footer word packing
//! `(size, allocated-bit)`. `size` is the whole block size in bytes
//! (header + payload + footer), always a multiple of 8, so the low three
//! bits are free for the flag. Free blocks additionally hold two payload
//! words: the next/prev offsets of their class list.

/// Header/footer word size in bytes.
pub const WSIZE: usize = 8;

/// Quad-word: the per-block overhead (header + footer) and the size of a
/// free block's link pair.
pub const QSIZE: usize = 16;

/// Smallest legal block: overhead plus room for the two free-list links.
pub const MIN_BLOCK: usize = 2 * QSIZE;

/// Payload alignment.
pub const ALIGNMENT: usize = 8;

/// Default heap extension, rounded word-even before use.
pub const CHUNK: usize = 260;

/// Number of segregated size classes.
pub const SEGS: usize = 5;

/// Ratio between consecutive size-class boundaries.
pub const RATIO: usize = 6;

/// `size / MIN_BLOCK` at which the last class begins: `RATIO^(SEGS-1)`.
pub const LAST_CLASS: usize = 1296;

/// Nil sentinel for block offsets. Offset 0 is the alignment pad word, so
/// no payload ever lives there.
pub const NIL: usize = 0;

/// Candidates examined per class before settling for the best so far.
pub const FIT_CANDIDATES: usize = 10;

const _: () = assert!(MIN_BLOCK == 32);
const _: () = assert!(LAST_CLASS == RATIO.pow((SEGS - 1) as u32));
const _: () = assert!(CHUNK > MIN_BLOCK);

/// Round up to the payload alignment.
#[inline(always)]
pub fn align8(n: usize) -> usize {
    (n + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// Pack a block size and allocated bit into a tag word.
#[inline(always)]
pub fn pack(size: usize, alloc: bool) -> u64 {
    size as u64 | alloc as u64
}

/// Size field of a tag word.
#[inline(always)]
pub fn tag_size(word: u64) -> usize {
    (word & !0x7) as usize
}

/// Allocated bit of a tag word.
#[inline(always)]
pub fn tag_alloc(word: u64) -> bool {
    word & 0x1 != 0
}

/// Adjust a user request to a block size: overhead added, alignment
/// rounded, minimum enforced.
#[inline]
pub fn adjust_size(n: usize) -> usize {
    if n <= QSIZE {
        MIN_BLOCK
    } else {
        align8(n + QSIZE)
    }
}

/// Size class for a block size: `min(SEGS-1, floor(log_RATIO(size/32)))`.
pub fn bucket(size: usize) -> usize {
    let mut n = size / MIN_BLOCK;
    if n >= LAST_CLASS {
        return SEGS - 1;
    }
    let mut class = 0;
    n /= RATIO;
    while n != 0 {
        class += 1;
        n /= RATIO;
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align8_rounds_up() {
        assert_eq!(align8(0), 0);
        assert_eq!(align8(1), 8);
        assert_eq!(align8(8), 8);
        assert_eq!(align8(9), 16);
        assert_eq!(align8(33), 40);
    }

    #[test]
    fn tag_roundtrip() {
        let w = pack(264, false);
        assert_eq!(tag_size(w), 264);
        assert!(!tag_alloc(w));

        let w = pack(32, true);
        assert_eq!(tag_size(w), 32);
        assert!(tag_alloc(w));
    }

    #[test]
    fn adjust_covers_overhead_and_minimum() {
        // Anything that fits in one link pair still needs a whole minimum block.
        assert_eq!(adjust_size(1), MIN_BLOCK);
        assert_eq!(adjust_size(16), MIN_BLOCK);
        assert_eq!(adjust_size(17), 40);
        assert_eq!(adjust_size(24), 40);
        assert_eq!(adjust_size(100), 120);
    }

    #[test]
    fn bucket_boundaries() {
        // Class k holds sizes with size/32 in [RATIO^k, RATIO^(k+1)).
        assert_eq!(bucket(32), 0);
        assert_eq!(bucket(191), 0);
        assert_eq!(bucket(192), 1);
        assert_eq!(bucket(1151), 1);
        assert_eq!(bucket(1152), 2);
        assert_eq!(bucket(6911), 2);
        assert_eq!(bucket(6912), 3);
        assert_eq!(bucket(41471), 3);
        assert_eq!(bucket(41472), 4);
        assert_eq!(bucket(usize::MAX & !0x7), 4);
    }
}
