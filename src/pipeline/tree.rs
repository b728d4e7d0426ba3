//! The query tree the pipeline compiler emits (spec.md §4.4): a
//! target-agnostic intermediate representation that a pre-existing
//! relational optimizer consumes. Building or improving that optimizer is
//! explicitly out of scope (spec.md §1 Non-goals); this tree is only the
//! handoff artifact.

use crate::bson::Document;
use crate::path::Expression;

/// A compiled query: a source plus an ordered list of relational
/// operations applied to it, mirroring how the driver's own `Operation`
/// trait separates "what to build" from "how a handler executes" (spec.md
/// §4.4 "Per-stage handler contract").
#[derive(Clone, Debug, PartialEq)]
pub struct QueryTree {
    pub source: Source,
    pub ops: Vec<QueryOp>,
}

impl QueryTree {
    pub fn from_collection(name: impl Into<String>) -> Self {
        Self {
            source: Source::Collection(name.into()),
            ops: Vec::new(),
        }
    }

    pub fn push(mut self, op: QueryOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Whether this tree's only filter is an equality match on `_id` with
    /// no other operations — spec.md §4.4 "Point-read recognition".
    pub fn is_id_equality_only(&self) -> Option<crate::bson::Value> {
        if self.ops.len() != 1 {
            return None;
        }
        match &self.ops[0] {
            QueryOp::Filter(doc) if doc.len() == 1 && doc.first_key() == Some("_id") => {
                match doc.first_value()? {
                    crate::bson::Value::Document(_) => None, // an operator doc, not a literal
                    literal => Some(literal.clone()),
                }
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Collection(String),
    /// A tree wrapped as a subquery, per spec.md §4.4 subquery-injection
    /// policy: the next stage sees this whole tree as a single table.
    Subquery(Box<QueryTree>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One relational operation appended to a [`QueryTree`] (spec.md §4.4).
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOp {
    Filter(Document),
    Sort(Vec<(String, SortDirection)>),
    Limit(i64),
    Skip(i64),
    Project(Document),
    Group {
        key: Document,
        accumulators: Document,
    },
    /// `$lookup`, optionally fused with an immediately following `$unwind`
    /// on its `as` field (spec.md §4.4 "Fused stages"). `right` names the
    /// foreign collection by tree shape only; whether that namespace
    /// actually exists is a Row Store concern resolved at scan time, where
    /// a missing namespace is treated as an empty right-hand side rather
    /// than a `NamespaceNotFound` error (spec.md §7).
    Lookup {
        right: Box<QueryTree>,
        local_field: String,
        foreign_field: String,
        as_field: String,
        unwind: Option<UnwindSpec>,
    },
    UnionAll(Box<QueryTree>),
    /// `$facet`: N sub-pipelines evaluated over the same input and
    /// collected into a single output row (spec.md §4.4 "$facet").
    Facet(Vec<(String, QueryTree)>),
    /// `$graphLookup`'s recursive traversal (spec.md §4.4 "$graphLookup").
    GraphLookup {
        right: Box<QueryTree>,
        start_with: Expression,
        connect_from_field: String,
        connect_to_field: String,
        as_field: String,
        max_depth: Option<i64>,
    },
    /// `$setWindowFields` (spec.md §4.4).
    WindowFields {
        partition_by: Option<Expression>,
        sort_by: Option<Vec<(String, SortDirection)>>,
        outputs: Document,
        /// Set when `partition_by` aligns with the shard key, letting the
        /// partition be delegated to the shard rather than collected
        /// centrally (spec.md §4.4).
        partition_matches_shard_key: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnwindSpec {
    pub preserve_null_and_empty: bool,
}
