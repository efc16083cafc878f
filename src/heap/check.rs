//! Heap consistency checker.
//!
//! Diagnostic only, not on the allocation path. Walks the tiled region
//! and every class list, returning the first invariant violation found.

use std::fmt;

use super::layout::{bucket, ALIGNMENT, MIN_BLOCK, NIL, QSIZE, SEGS};
use super::Heap;

/// A violated heap invariant. Offsets are block payload offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    BadPrologue,
    BadEpilogue { at: usize },
    Misaligned { bp: usize },
    OutOfBounds { bp: usize },
    TagMismatch { bp: usize },
    Undersized { bp: usize },
    Uncoalesced { bp: usize },
    ListCycle { class: usize },
    AllocatedInList { class: usize, bp: usize },
    BrokenLink { class: usize, bp: usize },
    WrongClass { class: usize, bp: usize },
    FreeCountMismatch { walked: usize, listed: usize },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HeapError::BadPrologue => write!(f, "bad prologue block"),
            HeapError::BadEpilogue { at } => write!(f, "bad epilogue header at {at:#x}"),
            HeapError::Misaligned { bp } => write!(f, "block {bp:#x} is misaligned"),
            HeapError::OutOfBounds { bp } => write!(f, "block {bp:#x} is outside the heap"),
            HeapError::TagMismatch { bp } => {
                write!(f, "block {bp:#x} header does not match footer")
            }
            HeapError::Undersized { bp } => write!(f, "block {bp:#x} is below the minimum size"),
            HeapError::Uncoalesced { bp } => {
                write!(f, "block {bp:#x} and its neighbour are both free")
            }
            HeapError::ListCycle { class } => write!(f, "class {class} list contains a cycle"),
            HeapError::AllocatedInList { class, bp } => {
                write!(f, "allocated block {bp:#x} listed in class {class}")
            }
            HeapError::BrokenLink { class, bp } => {
                write!(f, "inconsistent links at {bp:#x} in class {class}")
            }
            HeapError::WrongClass { class, bp } => {
                write!(f, "block {bp:#x} listed in class {class} but sized for another")
            }
            HeapError::FreeCountMismatch { walked, listed } => write!(
                f,
                "heap walk found {walked} free blocks, class lists hold {listed}"
            ),
        }
    }
}

impl Heap {
    /// Verify every heap invariant, returning the first violation.
    ///
    /// Checks, in order: the prologue; every block (alignment, bounds,
    /// header==footer, minimum size, no adjacent frees); the epilogue;
    /// every class list (acyclic, all free, links consistent, in bounds,
    /// correct class); and that both walks agree on the free-block count.
    pub fn check(&self) -> Result<(), HeapError> {
        if self.block_size(self.start) != QSIZE || !self.is_alloc(self.start) {
            return Err(HeapError::BadPrologue);
        }

        let mut walked = 0;
        let mut bp = self.start;
        while self.block_size(bp) > 0 {
            self.check_block(bp)?;
            if !self.is_alloc(bp) {
                walked += 1;
                if !self.is_alloc(self.next_bp(bp)) {
                    return Err(HeapError::Uncoalesced { bp });
                }
            }
            bp = self.next_bp(bp);
        }
        if !self.is_alloc(bp) {
            return Err(HeapError::BadEpilogue { at: bp });
        }

        let mut listed = 0;
        for class in 0..SEGS {
            let head = self.head(class);
            if self.has_cycle(head) {
                return Err(HeapError::ListCycle { class });
            }

            let mut bp = head;
            while bp != NIL {
                if bp % ALIGNMENT != 0 || bp + QSIZE > self.region.hi() {
                    return Err(HeapError::OutOfBounds { bp });
                }
                listed += 1;
                if self.is_alloc(bp) {
                    return Err(HeapError::AllocatedInList { class, bp });
                }
                let next = self.next_free(bp);
                if next != NIL {
                    if next % ALIGNMENT != 0 || next + QSIZE > self.region.hi() {
                        return Err(HeapError::OutOfBounds { bp: next });
                    }
                    if self.prev_free(next) != bp {
                        return Err(HeapError::BrokenLink { class, bp });
                    }
                }
                if bucket(self.block_size(bp)) != class {
                    return Err(HeapError::WrongClass { class, bp });
                }
                bp = next;
            }
        }

        if walked != listed {
            return Err(HeapError::FreeCountMismatch { walked, listed });
        }
        Ok(())
    }

    fn check_block(&self, bp: usize) -> Result<(), HeapError> {
        if bp % ALIGNMENT != 0 {
            return Err(HeapError::Misaligned { bp });
        }
        if bp <= self.region.lo() || bp + QSIZE > self.region.hi() {
            return Err(HeapError::OutOfBounds { bp });
        }
        let size = self.block_size(bp);
        if size % ALIGNMENT != 0 || bp + size > self.region.hi() {
            return Err(HeapError::OutOfBounds { bp });
        }
        if self.word(self.hdr(bp)) != self.word(self.ftr(bp)) {
            return Err(HeapError::TagMismatch { bp });
        }
        if bp != self.start && size < MIN_BLOCK {
            return Err(HeapError::Undersized { bp });
        }
        Ok(())
    }

    /// Floyd tortoise/hare over a class list.
    fn has_cycle(&self, head: usize) -> bool {
        let mut tortoise = head;
        let mut hare = head;
        loop {
            if hare == NIL {
                return false;
            }
            hare = self.next_free(hare);
            if hare == NIL {
                return false;
            }
            hare = self.next_free(hare);
            tortoise = self.next_free(tortoise);
            if hare != NIL && tortoise == hare {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::layout::{pack, NIL};
    use super::super::Heap;
    use super::HeapError;

    #[test]
    fn fresh_heap_passes() {
        let heap = Heap::new().unwrap();
        assert_eq!(heap.check(), Ok(()));
    }

    #[test]
    fn detects_footer_corruption() {
        let mut heap = Heap::new().unwrap();
        let p = heap.alloc(24).unwrap();
        let bp = heap.offset_of(p.as_ptr());

        let ftr = heap.ftr(bp);
        heap.put(ftr, pack(heap.block_size(bp), false)); // header still says allocated
        assert_eq!(heap.check(), Err(HeapError::TagMismatch { bp }));
    }

    #[test]
    fn detects_uncoalesced_neighbours() {
        let mut heap = Heap::new().unwrap();
        let p = heap.alloc(24).unwrap();
        let q = heap.alloc(24).unwrap();
        let (p_off, q_off) = (heap.offset_of(p.as_ptr()), heap.offset_of(q.as_ptr()));

        // Clear both allocated bits without going through free(), leaving
        // two adjacent free blocks in no list.
        let (ps, qs) = (heap.block_size(p_off), heap.block_size(q_off));
        heap.set_block(p_off, ps, false);
        heap.set_block(q_off, qs, false);
        assert_eq!(heap.check(), Err(HeapError::Uncoalesced { bp: p_off }));
    }

    #[test]
    fn detects_list_cycle() {
        let mut heap = Heap::new().unwrap();
        let p = heap.alloc(24).unwrap();
        let _f1 = heap.alloc(24).unwrap();
        let q = heap.alloc(24).unwrap();
        let _f2 = heap.alloc(24).unwrap();
        unsafe {
            heap.free(p.as_ptr());
            heap.free(q.as_ptr());
        }

        let (p_off, q_off) = (heap.offset_of(p.as_ptr()), heap.offset_of(q.as_ptr()));
        heap.set_next_free(p_off, q_off); // q -> p -> q -> ...
        assert_eq!(heap.check(), Err(HeapError::ListCycle { class: 0 }));
    }

    #[test]
    fn detects_wrong_class() {
        let mut heap = Heap::new().unwrap();
        let p = heap.alloc(24).unwrap();
        let _fence = heap.alloc(24).unwrap();
        unsafe { heap.free(p.as_ptr()) };

        let bp = heap.offset_of(p.as_ptr());
        heap.detach(bp);
        heap.set_next_free(bp, NIL);
        heap.set_prev_free(bp, NIL);
        heap.set_head(2, bp); // a 40-byte block does not belong in class 2
        assert_eq!(heap.check(), Err(HeapError::WrongClass { class: 2, bp }));
    }

    #[test]
    fn detects_hidden_free_block() {
        let mut heap = Heap::new().unwrap();
        let p = heap.alloc(24).unwrap();
        let _fence = heap.alloc(24).unwrap();
        unsafe { heap.free(p.as_ptr()) };

        // Drop the block from its list; the heap walk still sees it free.
        heap.detach(heap.offset_of(p.as_ptr()));
        assert!(matches!(
            heap.check(),
            Err(HeapError::FreeCountMismatch { .. })
        ));
    }
}
