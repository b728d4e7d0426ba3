//! The Cluster Coordinator collaborator (spec.md §1, §5): distributed
//! execution — sharding, placement, rebalancing — is explicitly out of
//! scope for this core. The core only exposes the hooks a coordinator
//! drives: metadata invalidation and shard-key resolution.

use crate::bson::Value;
use crate::error::Result;

/// A metadata version, bumped by the coordinator whenever DDL changes a
/// collection's shape (spec.md §5 "Plan cache ... invalidated on metadata
/// version bump").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetadataVersion(pub u64);

/// A collection's placement-relevant metadata, as seen by the core
/// (spec.md §5 "Collection metadata cache").
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionMetadata {
    pub namespace: String,
    pub shard_key_field: Option<String>,
    pub version: MetadataVersion,
}

/// Hooks the core exposes for a Cluster Coordinator to drive (spec.md §1:
/// "The core exposes hooks but all distribution logic is an external
/// collaborator"). The core calls `current_metadata` to resolve shard-key
/// alignment for point-read and `$setWindowFields` recognition; the
/// coordinator calls `invalidate` after DDL.
pub trait ClusterCoordinator: Send + Sync {
    /// The coordinator's current view of a collection's metadata, or
    /// `NamespaceNotFound` if it doesn't know the collection. Readers see
    /// a consistent snapshot (spec.md §5: "readers see a consistent
    /// snapshot or retry").
    fn current_metadata(&self, namespace: &str) -> Result<CollectionMetadata>;

    /// Broadcast an invalidation for `namespace` after DDL runs (spec.md
    /// §5: "invalidated by the Cluster Coordinator when DDL runs").
    fn invalidate(&self, namespace: &str, new_version: MetadataVersion);

    /// Resolve a document's shard-key value for placement purposes, given
    /// its `_id` and the collection's declared shard-key field.
    fn resolve_shard_key(&self, metadata: &CollectionMetadata, document_id: &Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_versions_are_ordered() {
        assert!(MetadataVersion(1) < MetadataVersion(2));
    }
}
