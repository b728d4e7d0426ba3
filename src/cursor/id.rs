//! 64-bit cursor-id allocation (spec.md §4.5 "Cursor-id allocation").

use std::sync::atomic::{AtomicU64, Ordering};

/// Top bit of a cursor id marks it as file-backed (Persistent, possibly
/// spilled to disk); the remaining bits are a monotonic counter scoped to
/// one process, prefixed so ids minted by different processes don't
/// collide when persisted cursor files are inspected out of band.
const FILE_BACKED_BIT: u64 = 1 << 63;

pub struct CursorIdAllocator {
    process_prefix: u32,
    counter: AtomicU64,
}

impl CursorIdAllocator {
    pub fn new(process_prefix: u32) -> Self {
        Self {
            process_prefix,
            counter: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self, file_backed: bool) -> i64 {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut id = ((self.process_prefix as u64) << 32) | (sequence & 0xFFFF_FFFF);
        id &= !FILE_BACKED_BIT;
        if file_backed {
            id |= FILE_BACKED_BIT;
        }
        id as i64
    }

    pub fn is_file_backed(cursor_id: i64) -> bool {
        (cursor_id as u64) & FILE_BACKED_BIT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backed_bit_is_set_when_requested() {
        let allocator = CursorIdAllocator::new(7);
        let id = allocator.allocate(true);
        assert!(CursorIdAllocator::is_file_backed(id));
        let id2 = allocator.allocate(false);
        assert!(!CursorIdAllocator::is_file_backed(id2));
    }

    #[test]
    fn ids_are_monotonic_within_a_process() {
        let allocator = CursorIdAllocator::new(1);
        let a = allocator.allocate(false);
        let b = allocator.allocate(false);
        assert_ne!(a, b);
    }
}
