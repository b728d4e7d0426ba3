//! The Protocol Frontend collaborator (spec.md §6.2, §6.3): the wire-
//! protocol gateway that decodes client commands and invokes the core's
//! API. This module only states the command shapes and the trait the core
//! expects a frontend to drive it through; decoding BSON off a socket is
//! out of scope here.

use serde::{Deserialize, Serialize};

use crate::bson::{Document, ObjectId, Value};
use crate::error::Result;

/// `find(namespace, filter, options) → first-page + cursor-id?` request
/// shape (spec.md §6.3 "Example find spec"). `Serialize`/`Deserialize` let
/// a Protocol Frontend decode this directly off the wire command document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSpec {
    pub collection: String,
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub batch_size: Option<i64>,
    pub hint: Option<Value>,
    pub collation: Option<Document>,
    pub let_vars: Option<Document>,
    pub read_concern: Option<Document>,
}

/// `aggregate(namespace, pipeline-array, options) → first-page +
/// cursor-id?` request shape (spec.md §6.3 "Example aggregate spec").
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSpec {
    /// The target collection, or `None` for a database-level (`1`)
    /// aggregation such as `$currentOp`.
    pub collection: Option<String>,
    pub pipeline: Vec<Document>,
    pub batch_size: Option<i64>,
    pub let_vars: Option<Document>,
    pub collation: Option<Document>,
    pub explain: bool,
    pub allow_disk_use: bool,
}

/// One page of cursor results plus the id to resume with, or `0` when the
/// result is already exhausted (spec.md §6.2 "first-page + cursor-id?").
#[derive(Clone, Debug, PartialEq)]
pub struct FirstPage {
    pub batch: Vec<Document>,
    /// `None` for cursor kinds that never mint a visible id
    /// (`SingleBatch`, `PointRead`); `Some(0)` once a streaming cursor is
    /// already exhausted on its first page.
    pub cursor_id: Option<i64>,
}

/// The next page returned by a `getMore` (spec.md §6.2).
#[derive(Clone, Debug, PartialEq)]
pub struct NextPage {
    pub batch: Vec<Document>,
    /// `0` once the cursor is exhausted.
    pub cursor_id: i64,
}

/// Operations a protocol frontend invokes on the core (spec.md §6.2). A
/// frontend owns wire decode/encode and command routing; it calls through
/// this trait once a command has been decoded into its typed spec.
pub trait ProtocolFrontend {
    fn find(&self, namespace: &str, spec: &FindSpec) -> Result<FirstPage>;

    fn aggregate(&self, namespace: &str, spec: &AggregateSpec) -> Result<FirstPage>;

    fn count(&self, namespace: &str, filter: &Document) -> Result<i64>;

    fn distinct(&self, namespace: &str, field: &str, filter: &Document) -> Result<Vec<Value>>;

    fn list_collections(&self, database: &str, filter: &Document) -> Result<FirstPage>;

    fn list_indexes(&self, namespace: &str) -> Result<FirstPage>;

    fn get_more(&self, cursor_id: i64, batch_size: Option<i64>) -> Result<NextPage>;

    fn kill_cursors(&self, cursor_ids: &[i64]) -> Result<()>;

    fn insert(&self, namespace: &str, documents: &[Document]) -> Result<InsertResult>;

    fn update(&self, namespace: &str, updates: &[UpdateRequest]) -> Result<UpdateResult>;

    fn delete(&self, namespace: &str, deletes: &[DeleteRequest]) -> Result<DeleteResult>;

    fn create_indexes(&self, namespace: &str, specs: &[Document]) -> Result<Vec<String>>;

    fn drop_indexes(&self, namespace: &str, names: &[String]) -> Result<()>;

    fn coll_mod(&self, namespace: &str, modifications: &Document) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsertResult {
    pub inserted_count: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub filter: Document,
    pub update: Document,
    pub upsert: bool,
    pub multi: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: i64,
    pub modified_count: i64,
    pub upserted_id: Option<ObjectId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteRequest {
    pub filter: Document,
    pub limit: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_spec_round_trips_through_json() {
        let mut filter = Document::new();
        filter.append("status", "active");
        let spec = FindSpec {
            collection: "widgets".to_string(),
            filter,
            batch_size: Some(101),
            ..Default::default()
        };
        let encoded = serde_json::to_string(&spec).unwrap();
        let decoded: FindSpec = serde_json::from_str(&encoded).unwrap();
        assert_eq!(spec, decoded);
    }

    #[test]
    fn aggregate_spec_field_names_are_camel_case_on_the_wire() {
        let spec = AggregateSpec {
            collection: Some("widgets".to_string()),
            batch_size: Some(10),
            allow_disk_use: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["batchSize"], serde_json::json!(10));
        assert_eq!(json["allowDiskUse"], serde_json::json!(true));
    }
}
