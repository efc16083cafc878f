//! Intrusive segregated free lists.
//!
//! Each size class heads a doubly linked list of free blocks. The links
//! live in the first two payload words of a free block: next at `bp`,
//! prev at `bp + WSIZE`. Heads are the word array at `seg_off`.
//!
//! Callers must keep the invariant that a block's boundary tags still
//! describe the size it was listed under when detaching it.

use super::layout::{bucket, NIL, WSIZE};
use super::Heap;

impl Heap {
    /// First free block of a class, `NIL` when empty.
    #[inline(always)]
    pub(super) fn head(&self, class: usize) -> usize {
        self.word(self.seg_off + class * WSIZE) as usize
    }

    #[inline(always)]
    pub(super) fn set_head(&mut self, class: usize, bp: usize) {
        self.put(self.seg_off + class * WSIZE, bp as u64);
    }

    #[inline(always)]
    pub(super) fn next_free(&self, bp: usize) -> usize {
        self.word(bp) as usize
    }

    #[inline(always)]
    pub(super) fn prev_free(&self, bp: usize) -> usize {
        self.word(bp + WSIZE) as usize
    }

    #[inline(always)]
    pub(super) fn set_next_free(&mut self, bp: usize, to: usize) {
        self.put(bp, to as u64);
    }

    #[inline(always)]
    pub(super) fn set_prev_free(&mut self, bp: usize, to: usize) {
        self.put(bp + WSIZE, to as u64);
    }

    /// LIFO insertion: push a free block onto the head of its class list.
    pub(super) fn push_head(&mut self, bp: usize) {
        let class = bucket(self.block_size(bp));
        let old = self.head(class);
        self.set_next_free(bp, old);
        self.set_prev_free(bp, NIL);
        if old != NIL {
            self.set_prev_free(old, bp);
        }
        self.set_head(class, bp);
    }

    /// Join `prev` and `next` across a removed block of the given class.
    pub(super) fn splice(&mut self, prev: usize, next: usize, class: usize) {
        if prev == NIL {
            self.set_head(class, next);
        } else {
            self.set_next_free(prev, next);
        }
        if next != NIL {
            self.set_prev_free(next, prev);
        }
    }

    /// Unlink a free block from the class list its current size maps to.
    pub(super) fn detach(&mut self, bp: usize) {
        let class = bucket(self.block_size(bp));
        let prev = self.prev_free(bp);
        let next = self.next_free(bp);
        self.splice(prev, next, class);
    }
}
