//! Disk-spill bookkeeping for Persistent cursors (spec.md §4.5 "Disk spill
//! (Persistent only)"). Actual file creation, memory-mapping, and unlink
//! mechanics are delegated to a [`CursorFileStore`] collaborator, the same
//! way physical storage is delegated to the Row Store (spec.md §6.1); this
//! module only decides *when* to spill and tracks the shared counters the
//! lifecycle table calls out by name.

use crate::error::Result;

/// Rows buffered in memory past which a Persistent cursor's output is
/// appended to its spill file instead of held in memory.
pub const DEFAULT_SPILL_THRESHOLD_ROWS: usize = 1000;

/// The file-I/O seam a Persistent cursor spills through. A production
/// deployment backs this with a memory-mapped file per spec.md §4.5; tests
/// and other non-persistent callers can use an in-memory stand-in.
pub trait CursorFileStore: Send + Sync {
    fn create(&self, cursor_name: &str) -> Result<()>;
    fn append(&self, cursor_name: &str, bytes: &[u8]) -> Result<()>;
    /// Read back everything written so far (memory-mapped in production).
    fn read_all(&self, cursor_name: &str) -> Result<Vec<u8>>;
    fn unlink(&self, cursor_name: &str) -> Result<()>;
}

/// Shared-memory bookkeeping the lifecycle table calls out: "active cursor
/// count, total measured cursor count, size of last cursor" (spec.md
/// §4.5). Process-wide; a deployment that wants this visible to external
/// monitoring would back it with real shared memory, which is outside
/// this core's concern.
#[derive(Default)]
pub struct CursorSpillStats {
    active_cursor_count: std::sync::atomic::AtomicUsize,
    total_measured_cursor_count: std::sync::atomic::AtomicU64,
    size_of_last_cursor: std::sync::atomic::AtomicUsize,
}

impl CursorSpillStats {
    pub fn record_open(&self) {
        use std::sync::atomic::Ordering::Relaxed;
        self.active_cursor_count.fetch_add(1, Relaxed);
        self.total_measured_cursor_count.fetch_add(1, Relaxed);
    }

    pub fn record_close(&self, final_size_bytes: usize) {
        use std::sync::atomic::Ordering::Relaxed;
        self.active_cursor_count.fetch_sub(1, Relaxed);
        self.size_of_last_cursor.store(final_size_bytes, Relaxed);
    }

    pub fn active_cursor_count(&self) -> usize {
        self.active_cursor_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn total_measured_cursor_count(&self) -> u64 {
        self.total_measured_cursor_count
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn size_of_last_cursor(&self) -> usize {
        self.size_of_last_cursor.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Generate a spill file name for a cursor id, unique per process
/// (spec.md §4.5: "appended to a cursor file keyed by a generated cursor
/// name").
pub fn spill_file_name(cursor_id: i64) -> String {
    format!("cursor.{cursor_id:016x}.spill")
}

/// Whether the manager should spill to disk yet, given rows buffered so far.
pub fn should_spill(rows_buffered: usize, threshold: usize) -> bool {
    rows_buffered > threshold
}

pub fn open_spill_file(store: &dyn CursorFileStore, cursor_id: i64) -> Result<String> {
    let name = spill_file_name(cursor_id);
    store.create(&name)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryFileStore {
        files: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    impl CursorFileStore for InMemoryFileStore {
        fn create(&self, cursor_name: &str) -> Result<()> {
            self.files.lock().unwrap().insert(cursor_name.to_string(), Vec::new());
            Ok(())
        }
        fn append(&self, cursor_name: &str, bytes: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .get_mut(cursor_name)
                .unwrap()
                .extend_from_slice(bytes);
            Ok(())
        }
        fn read_all(&self, cursor_name: &str) -> Result<Vec<u8>> {
            Ok(self.files.lock().unwrap().get(cursor_name).cloned().unwrap_or_default())
        }
        fn unlink(&self, cursor_name: &str) -> Result<()> {
            self.files.lock().unwrap().remove(cursor_name);
            Ok(())
        }
    }

    #[test]
    fn spill_kicks_in_past_the_threshold() {
        assert!(!should_spill(500, DEFAULT_SPILL_THRESHOLD_ROWS));
        assert!(should_spill(1001, DEFAULT_SPILL_THRESHOLD_ROWS));
    }

    #[test]
    fn open_spill_file_round_trips_through_the_store() {
        let store = InMemoryFileStore::default();
        let name = open_spill_file(&store, 42).unwrap();
        store.append(&name, b"row").unwrap();
        assert_eq!(store.read_all(&name).unwrap(), b"row");
        store.unlink(&name).unwrap();
        assert!(store.read_all(&name).unwrap().is_empty());
    }

    #[test]
    fn stats_track_open_and_close() {
        let stats = CursorSpillStats::default();
        stats.record_open();
        stats.record_open();
        assert_eq!(stats.active_cursor_count(), 2);
        assert_eq!(stats.total_measured_cursor_count(), 2);
        stats.record_close(4096);
        assert_eq!(stats.active_cursor_count(), 1);
        assert_eq!(stats.size_of_last_cursor(), 4096);
    }
}
