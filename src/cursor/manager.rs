//! The cursor manager (spec.md §4.5): owns server-side cursor state across
//! `getMore` round-trips, the way `mongodb-mongo-rust-driver`'s session/
//! connection pool owns state across a logical operation's requests.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, Result};
use crate::projection::TimeSnapshot;

use super::cancellation::CancellationToken;
use super::id::CursorIdAllocator;
use super::kind::CursorKind;
use super::spill::{self, CursorFileStore, CursorSpillStats, DEFAULT_SPILL_THRESHOLD_ROWS};

/// One open cursor's state, held between a `find`/`aggregate`'s first page
/// and its `getMore` calls.
pub struct CursorState {
    pub kind: CursorKind,
    /// `$$NOW`/`$$CLUSTER_TIME` are frozen at cursor-open time and reused
    /// for every subsequent `getMore` on this cursor (spec.md §4.5).
    pub time: TimeSnapshot,
    pub cancellation: CancellationToken,
    /// Set once this Persistent cursor has spilled past the in-memory
    /// threshold; `None` while it is still served entirely from memory.
    pub spill_file: Option<String>,
    pub batch_size: Option<i64>,
    exhausted: bool,
    /// An opaque Row Store session handle pinned to this cursor for its
    /// lifetime (the "portal" for Persistent cursors, spec.md §4.5),
    /// generalized from the driver's `PinnedConnection` so a getMore
    /// reuses the same underlying row-store session instead of opening a
    /// new one per batch.
    pinned_handle: Option<Arc<dyn Any + Send + Sync>>,
}

/// Registry of open cursors plus the id allocator and spill collaborator
/// shared across them.
pub struct CursorManager {
    id_allocator: CursorIdAllocator,
    open_cursors: Mutex<HashMap<i64, CursorState>>,
    file_store: Arc<dyn CursorFileStore>,
    pub stats: CursorSpillStats,
}

impl CursorManager {
    pub fn new(process_prefix: u32, file_store: Arc<dyn CursorFileStore>) -> Self {
        Self {
            id_allocator: CursorIdAllocator::new(process_prefix),
            open_cursors: Mutex::new(HashMap::new()),
            file_store,
            stats: CursorSpillStats::default(),
        }
    }

    /// Open a new cursor, freezing the time-system-variable snapshot for
    /// its lifetime. Returns `None` for kinds that never mint a visible
    /// cursor id (`SingleBatch`, `PointRead`).
    pub fn open(&self, kind: CursorKind, time: TimeSnapshot, batch_size: Option<i64>) -> Option<i64> {
        if !kind.allocates_cursor_id() {
            return None;
        }
        let file_backed = matches!(kind, CursorKind::Persistent);
        let id = self.id_allocator.allocate(file_backed);
        let state = CursorState {
            kind,
            time,
            cancellation: CancellationToken::new(),
            spill_file: None,
            batch_size,
            exhausted: false,
            pinned_handle: None,
        };
        self.stats.record_open();
        self.open_cursors.lock().unwrap().insert(id, state);
        #[cfg(feature = "tracing-unstable")]
        tracing::debug!(
            target: crate::trace::CURSOR_TRACING_EVENT_TARGET,
            cursor_id = id,
            ?kind,
            "opened cursor"
        );
        Some(id)
    }

    /// Spill a Persistent cursor's overflow rows to disk once it crosses
    /// the buffered-row threshold (spec.md §4.5 "Disk spill"). A no-op for
    /// cursors that aren't Persistent or have already spilled.
    pub fn maybe_spill(&self, cursor_id: i64, rows_buffered: usize) -> Result<()> {
        #[cfg(feature = "tracing-unstable")]
        let _span = tracing::debug_span!(
            target: crate::trace::CURSOR_TRACING_EVENT_TARGET,
            "cursor_batch_production",
            cursor_id,
            rows_buffered
        )
        .entered();

        let mut cursors = self.open_cursors.lock().unwrap();
        let state = cursors
            .get_mut(&cursor_id)
            .ok_or(ErrorKind::CursorNotFound { cursor_id })?;
        if state.kind != CursorKind::Persistent || state.spill_file.is_some() {
            return Ok(());
        }
        if spill::should_spill(rows_buffered, DEFAULT_SPILL_THRESHOLD_ROWS) {
            state.spill_file = Some(spill::open_spill_file(self.file_store.as_ref(), cursor_id)?);
        }
        Ok(())
    }

    /// Pin a Row Store session handle to this cursor, so every subsequent
    /// `getMore` reuses it instead of reopening a collection handle per
    /// batch (spec.md §10 "Cursor session pinning").
    pub fn pin(&self, cursor_id: i64, handle: Arc<dyn Any + Send + Sync>) -> Result<()> {
        let mut cursors = self.open_cursors.lock().unwrap();
        let state = cursors
            .get_mut(&cursor_id)
            .ok_or(ErrorKind::CursorNotFound { cursor_id })?;
        state.pinned_handle = Some(handle);
        Ok(())
    }

    /// The handle pinned by a prior call to [`Self::pin`], if any.
    pub fn pinned_handle(&self, cursor_id: i64) -> Result<Option<Arc<dyn Any + Send + Sync>>> {
        let cursors = self.open_cursors.lock().unwrap();
        cursors
            .get(&cursor_id)
            .map(|s| s.pinned_handle.clone())
            .ok_or_else(|| ErrorKind::CursorNotFound { cursor_id }.into())
    }

    pub fn cancellation_token(&self, cursor_id: i64) -> Result<CancellationToken> {
        let cursors = self.open_cursors.lock().unwrap();
        cursors
            .get(&cursor_id)
            .map(|s| s.cancellation.clone())
            .ok_or_else(|| ErrorKind::CursorNotFound { cursor_id }.into())
    }

    pub fn time(&self, cursor_id: i64) -> Result<TimeSnapshot> {
        let cursors = self.open_cursors.lock().unwrap();
        cursors
            .get(&cursor_id)
            .map(|s| s.time)
            .ok_or_else(|| ErrorKind::CursorNotFound { cursor_id }.into())
    }

    /// `killCursors` (spec.md §6.2): close the given cursors, unlinking any
    /// spill files (spec.md §5: "opened cursor files are unlinked").
    /// Cursor ids that are already unknown are silently ignored, matching
    /// `killCursors`'s partial-success semantics.
    pub fn kill(&self, cursor_ids: &[i64]) -> Result<()> {
        let mut cursors = self.open_cursors.lock().unwrap();
        for id in cursor_ids {
            if let Some(state) = cursors.remove(id) {
                if let Some(name) = &state.spill_file {
                    self.file_store.unlink(name)?;
                }
                self.stats.record_close(0);
                #[cfg(feature = "tracing-unstable")]
                tracing::debug!(
                    target: crate::trace::CURSOR_TRACING_EVENT_TARGET,
                    cursor_id = id,
                    "killed cursor"
                );
            }
        }
        Ok(())
    }

    pub fn mark_exhausted(&self, cursor_id: i64) -> Result<()> {
        let mut cursors = self.open_cursors.lock().unwrap();
        let state = cursors
            .get_mut(&cursor_id)
            .ok_or(ErrorKind::CursorNotFound { cursor_id })?;
        state.exhausted = true;
        Ok(())
    }

    pub fn is_exhausted(&self, cursor_id: i64) -> Result<bool> {
        let cursors = self.open_cursors.lock().unwrap();
        cursors
            .get(&cursor_id)
            .map(|s| s.exhausted)
            .ok_or_else(|| ErrorKind::CursorNotFound { cursor_id }.into())
    }

    pub fn is_open(&self, cursor_id: i64) -> bool {
        self.open_cursors.lock().unwrap().contains_key(&cursor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct NoopFileStore {
        unlinked: StdMutex<Vec<String>>,
    }

    impl CursorFileStore for NoopFileStore {
        fn create(&self, _cursor_name: &str) -> Result<()> {
            Ok(())
        }
        fn append(&self, _cursor_name: &str, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
        fn read_all(&self, _cursor_name: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn unlink(&self, cursor_name: &str) -> Result<()> {
            self.unlinked.lock().unwrap().push(cursor_name.to_string());
            Ok(())
        }
    }

    fn snapshot() -> TimeSnapshot {
        TimeSnapshot {
            now_millis: 0,
            cluster_time_seconds: 0,
            cluster_time_increment: 0,
        }
    }

    #[test]
    fn single_batch_and_point_read_never_mint_a_cursor_id() {
        let manager = CursorManager::new(1, Arc::new(NoopFileStore::default()));
        assert!(manager.open(CursorKind::SingleBatch, snapshot(), None).is_none());
        assert!(manager.open(CursorKind::PointRead, snapshot(), None).is_none());
    }

    #[test]
    fn streamable_cursor_can_be_looked_up_and_killed() {
        let manager = CursorManager::new(1, Arc::new(NoopFileStore::default()));
        let id = manager.open(CursorKind::Streamable, snapshot(), Some(101)).unwrap();
        assert!(manager.is_open(id));
        assert!(manager.cancellation_token(id).is_ok());
        manager.kill(&[id]).unwrap();
        assert!(!manager.is_open(id));
        assert!(manager.cancellation_token(id).is_err());
    }

    #[test]
    fn persistent_cursor_spills_past_threshold_and_unlinks_on_kill() {
        let store = Arc::new(NoopFileStore::default());
        let manager = CursorManager::new(1, store.clone());
        let id = manager.open(CursorKind::Persistent, snapshot(), None).unwrap();
        manager.maybe_spill(id, 5).unwrap();
        manager.maybe_spill(id, DEFAULT_SPILL_THRESHOLD_ROWS + 1).unwrap();
        manager.kill(&[id]).unwrap();
        assert_eq!(store.unlinked.lock().unwrap().len(), 1);
    }

    #[test]
    fn pinned_handle_is_retained_across_lookups() {
        let manager = CursorManager::new(1, Arc::new(NoopFileStore::default()));
        let id = manager.open(CursorKind::Streamable, snapshot(), None).unwrap();
        assert!(manager.pinned_handle(id).unwrap().is_none());
        manager.pin(id, Arc::new(42i32)).unwrap();
        let handle = manager.pinned_handle(id).unwrap().unwrap();
        assert_eq!(*handle.downcast_ref::<i32>().unwrap(), 42);
    }

    #[test]
    fn unknown_cursor_lookup_is_cursor_not_found() {
        let manager = CursorManager::new(1, Arc::new(NoopFileStore::default()));
        let err = manager.time(999).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CursorNotFound { cursor_id: 999 }));
    }
}
