//! The Row Store collaborator (spec.md §6.1): the relational storage
//! substrate (tables, heaps, MVCC, WAL) the core assumes but does not
//! implement. This module only states the seam the core calls through;
//! an actual storage engine plugs in by implementing [`RowStore`].

use crate::bson::{Document, ObjectId, Value};
use crate::error::Result;
use crate::pipeline::{QueryOp, SortDirection};

/// An opaque handle to an open collection, minted by [`RowStore::open_collection`].
/// The core never inspects a handle's contents; it only threads it back
/// through subsequent calls.
pub trait CollectionHandle: Send + Sync {}

/// The distribution-column value determining a document's placement
/// (spec.md GLOSSARY "Shard key").
#[derive(Clone, Debug, PartialEq)]
pub struct ShardKeyValue(pub Value);

/// Addresses one physical row for `update`/`delete` (spec.md §6.1: "primary
/// key `(shard-key-value, object-id)`").
#[derive(Clone, Debug, PartialEq)]
pub struct RowLocator {
    pub shard_key: ShardKeyValue,
    pub object_id: ObjectId,
}

/// A parsed index creation request, independent of any particular access
/// method (spec.md §3.6, §6.1).
#[derive(Clone, Debug, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub key_pattern: Document,
    pub access_method: String,
    pub unique: bool,
    pub sparse: bool,
}

/// A lazily-produced sequence of rows, the `row stream` spec.md §6.1 calls
/// out for `scan`. Kept abstract (rather than `Vec<Document>`) so a real
/// Row Store can stream without buffering an entire scan in memory.
pub trait RowStream: Send {
    /// Pull the next row, or `None` once the scan is exhausted. Callers
    /// are expected to check their own cancellation token between calls
    /// (spec.md §5 "index scans check cancellation between tuples").
    fn next_row(&mut self) -> Result<Option<Document>>;
}

/// Required operations the core calls on the relational storage substrate
/// (spec.md §6.1). Implementations own tables, heaps, MVCC, and WAL; none
/// of that is redesigned here.
pub trait RowStore: Send + Sync {
    type Handle: CollectionHandle;
    type Stream: RowStream;

    fn open_collection(&self, database: &str, name: &str) -> Result<Self::Handle>;

    /// `scan(handle, filter, order, projection-columns) → row stream`.
    fn scan(
        &self,
        handle: &Self::Handle,
        filter: &Document,
        order: &[(String, SortDirection)],
        projection_columns: &[String],
    ) -> Result<Self::Stream>;

    fn point_read(&self, handle: &Self::Handle, shard_key: &ShardKeyValue, object_id: &ObjectId) -> Result<Option<Document>>;

    /// Returns `Ok(())` on success; a duplicate `(shard-key-value,
    /// object-id)` is a `Conflict`, surfaced via the shared [`Result`]
    /// error channel rather than a bespoke success/conflict enum, since
    /// every other fallible operation here does the same.
    fn insert(&self, handle: &Self::Handle, shard_key: &ShardKeyValue, object_id: &ObjectId, document: &Document) -> Result<()>;

    fn update(&self, handle: &Self::Handle, locator: &RowLocator, new_document: &Document) -> Result<()>;

    fn delete(&self, handle: &Self::Handle, locator: &RowLocator) -> Result<()>;

    fn create_index(&self, handle: &Self::Handle, spec: &IndexSpec) -> Result<String>;

    fn drop_index(&self, handle: &Self::Handle, index_id: &str) -> Result<()>;
}

/// Retry-record bookkeeping: ensures a retried write with the same
/// transaction id is idempotent (spec.md §7 "Retry-record bookkeeping...
/// provides exactly-once semantics for retryable writes"; GLOSSARY
/// "Retry record"). Modeled separately from `RowStore` because the spec
/// explicitly carves it out as its own external collaborator (spec.md §1:
/// "...and retry-record bookkeeping").
pub trait RetryRecordStore: Send + Sync {
    /// The previously-recorded result for `transaction_id`, if this write
    /// has already been applied once.
    fn previous_result(&self, transaction_id: &str) -> Result<Option<Document>>;

    /// Record the result of a write keyed by `transaction_id`, so a later
    /// retry with the same id can be answered from `previous_result`
    /// instead of re-applying the write.
    fn record_result(&self, transaction_id: &str, result: &Document) -> Result<()>;
}

/// Query ops a `RowStore` implementation is expected to be able to push
/// down when it builds a scan plan from a [`QueryOp::Filter`]/[`QueryOp::Sort`]
/// pair. Not part of the trait's method signatures (scan already takes
/// filter/order directly); exposed so a concrete Row Store can recognize
/// which subset of `QueryOp` arrived as native scan parameters versus
/// which still needs relational-optimizer help.
pub fn is_scan_pushdown_candidate(op: &QueryOp) -> bool {
    matches!(op, QueryOp::Filter(_) | QueryOp::Sort(_) | QueryOp::Limit(_) | QueryOp::Skip(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_sort_limit_skip_are_pushdown_candidates() {
        assert!(is_scan_pushdown_candidate(&QueryOp::Filter(Document::new())));
        assert!(is_scan_pushdown_candidate(&QueryOp::Sort(Vec::new())));
        assert!(is_scan_pushdown_candidate(&QueryOp::Limit(1)));
        assert!(!is_scan_pushdown_candidate(&QueryOp::UnionAll(Box::new(
            crate::pipeline::QueryTree::from_collection("x")
        ))));
    }
}
