//! Per-parse string/number slab allocator (§4.4).
//!
//! Gives a single DOM builder pass memory locality for the many small string
//! and raw-number byte slices it produces, instead of one heap allocation
//! per value. A slab never grows past its fixed capacity, so its backing
//! buffer's address is stable for the slab's whole life — which is what
//! makes handing out long-lived slices into it sound (see [`Slab::bytes`]).
//! There is no portable `madvise(DONTNEED)` in safe Rust; the source uses it
//! as a paging hint on the last release, not for correctness, so dropping
//! the slab's `Box<[u8]>` (an ordinary deallocation) is the faithful
//! substitute — see DESIGN.md.

use std::sync::{Arc, Mutex};

/// Below this remaining-capacity threshold, `alloc` starts a new slab rather
/// than splitting an allocation across two slabs.
const DEFAULT_SLAB_SIZE: usize = 16 * 4096;

struct Slab {
    data: Box<[u8]>,
    committed: usize,
}

impl Slab {
    fn new(capacity: usize) -> Slab {
        Slab {
            data: vec![0u8; capacity].into_boxed_slice(),
            committed: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.committed
    }

    /// Copies `bytes` into the uncommitted tail and returns the range it now
    /// occupies. Caller must have checked `remaining() >= bytes.len()`.
    fn commit(&mut self, bytes: &[u8]) -> std::ops::Range<usize> {
        let start = self.committed;
        let end = start + bytes.len();
        self.data[start..end].copy_from_slice(bytes);
        self.committed = end;
        start..end
    }

    /// Byte slice previously committed at `range`. Sound because `data` is a
    /// fixed-capacity `Box<[u8]>` (stable address for the slab's life) and
    /// `range` only ever covers bytes already written by `commit`, which are
    /// never mutated again afterward.
    fn bytes(&self, range: std::ops::Range<usize>) -> &[u8] {
        &self.data[range]
    }
}

/// A byte slice allocated from a [`StringArena`]. Shares ownership of the
/// slab with every other slice carved from it; the slab is freed once its
/// last `SlabSlice` drops.
#[derive(Clone)]
pub struct SlabSlice {
    slab: Arc<Mutex<Slab>>,
    range: std::ops::Range<usize>,
}

impl SlabSlice {
    pub fn as_bytes(&self) -> Vec<u8> {
        // A Mutex guard can't outlive this call, so callers that need a
        // long-lived `&[u8]` should go through `Value::string_borrowed`,
        // which copies once into an `Arc<[u8]>` at DOM-attach time; repeated
        // reads of the same slab-backed value reuse that `Arc`.
        self.slab
            .lock()
            .expect("arena slab mutex poisoned")
            .bytes(self.range.clone())
            .to_vec()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Slab allocator used by a single DOM builder session at a time (§5).
pub struct StringArena {
    slab_size: usize,
    current: Mutex<Option<Arc<Mutex<Slab>>>>,
}

impl StringArena {
    pub fn new() -> StringArena {
        StringArena {
            slab_size: DEFAULT_SLAB_SIZE,
            current: Mutex::new(None),
        }
    }

    pub fn with_slab_size(slab_size: usize) -> StringArena {
        StringArena {
            slab_size,
            current: Mutex::new(None),
        }
    }

    /// Carves `n` bytes from the current slab, or starts a new one of at
    /// least `max(n, slab_size)` when the current one can't fit it.
    pub fn alloc(&self, bytes: &[u8]) -> SlabSlice {
        let mut current = self.current.lock().expect("arena mutex poisoned");

        let needs_new_slab = match current.as_ref() {
            Some(slab) => slab.lock().expect("arena slab mutex poisoned").remaining() < bytes.len(),
            None => true,
        };

        if needs_new_slab {
            let capacity = bytes.len().max(self.slab_size);
            *current = Some(Arc::new(Mutex::new(Slab::new(capacity))));
        }

        let slab = current.as_ref().unwrap().clone();
        let range = slab.lock().expect("arena slab mutex poisoned").commit(bytes);
        SlabSlice { slab, range }
    }
}

impl Default for StringArena {
    fn default() -> Self {
        StringArena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_allocated_bytes() {
        let arena = StringArena::with_slab_size(64);
        let slice = arena.alloc(b"hello");
        assert_eq!(slice.as_bytes(), b"hello");
        assert_eq!(slice.len(), 5);
    }

    #[test]
    fn packs_multiple_allocations_into_one_slab() {
        let arena = StringArena::with_slab_size(64);
        let a = arena.alloc(b"foo");
        let b = arena.alloc(b"bar");
        assert!(Arc::ptr_eq(&a.slab, &b.slab));
        assert_eq!(a.as_bytes(), b"foo");
        assert_eq!(b.as_bytes(), b"bar");
    }

    #[test]
    fn starts_new_slab_when_current_is_full() {
        let arena = StringArena::with_slab_size(4);
        let a = arena.alloc(b"abcd");
        let b = arena.alloc(b"e");
        assert!(!Arc::ptr_eq(&a.slab, &b.slab));
    }

    #[test]
    fn oversized_allocation_gets_its_own_slab() {
        let arena = StringArena::with_slab_size(4);
        let big = vec![b'x'; 100];
        let slice = arena.alloc(&big);
        assert_eq!(slice.len(), 100);
        assert_eq!(slice.as_bytes(), big);
    }
}
