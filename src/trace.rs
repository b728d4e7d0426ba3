//! Tracing targets used when the `tracing-unstable` feature is enabled
//! (spec.md §5 "ambient" logging concerns). Mirrors the driver's own
//! per-subsystem target constants so structured events can be filtered by
//! component without parsing message text.

pub const CURSOR_TRACING_EVENT_TARGET: &str = "docdb-core::cursor";
pub const PIPELINE_TRACING_EVENT_TARGET: &str = "docdb-core::pipeline";
pub const INDEX_TRACING_EVENT_TARGET: &str = "docdb-core::index";
