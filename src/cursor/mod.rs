//! The cursor manager (spec.md §4.5): server-side cursor state across
//! `getMore` round-trips, covering the five cursor kinds, the batching
//! contract, disk spill for Persistent cursors, and cooperative
//! cancellation.

pub mod batch;
pub mod cancellation;
pub mod id;
pub mod kind;
pub mod manager;
pub mod spill;

pub use batch::{BatchWriter, BSON_OUTPUT_LIMIT_BYTES};
pub use cancellation::CancellationToken;
pub use id::CursorIdAllocator;
pub use kind::{CloseTrigger, CursorKind, ResumptionMode};
pub use manager::{CursorManager, CursorState};
pub use spill::{CursorFileStore, CursorSpillStats};
