//! Ambient engine configuration (spec.md §8 boundary behaviors): the
//! limits every other component reads rather than hardcoding.

use std::sync::Arc;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::bson::Collation;

/// Default path-tree nesting bound before a projection spec fails with
/// `FailedToParse` (spec.md §8: "A projection path tree with depth > N
/// must fail ... N configurable; default 100").
pub const DEFAULT_MAX_PATH_TREE_DEPTH: u32 = 100;

/// Default nested-pipeline bound before compilation fails with
/// `NestedLimit` (spec.md §8: "Nested pipeline depth > M ... default 20").
pub const DEFAULT_MAX_NESTED_PIPELINE_DEPTH: u32 = 20;

/// Default per-batch byte cap (spec.md §8: "16 MiB output-document limit
/// ... enforced per output row").
pub const DEFAULT_CURSOR_BATCH_BYTE_LIMIT: usize = 16 * 1024 * 1024;

/// Default ceiling on intermediate aggregation documents, looser than the
/// output-row limit (spec.md §8: "intermediate aggregation documents may
/// exceed 16 MiB up to 100 MiB").
pub const DEFAULT_INTERMEDIATE_DOCUMENT_BYTE_LIMIT: usize = 100 * 1024 * 1024;

/// Rows buffered in memory before a Persistent cursor spills to disk
/// (spec.md §4.5 "Disk spill").
pub const DEFAULT_SPILL_THRESHOLD_ROWS: usize = crate::cursor::spill::DEFAULT_SPILL_THRESHOLD_ROWS;

/// Default idle lifetime for a cursor awaiting its next `getMore` before
/// its close trigger fires (spec.md §4.5 close-trigger column: "...or
/// TTL"). Matches the driver's own 10-minute no-cursor-timeout default.
pub const DEFAULT_CURSOR_TTL: Duration = Duration::from_secs(600);

/// Top-level configuration for one engine instance. Threaded into the
/// path tree builder, the pipeline compiler, and the cursor manager at
/// construction time rather than recomputed per call.
#[derive(Clone, TypedBuilder)]
pub struct EngineConfig {
    #[builder(default = DEFAULT_MAX_PATH_TREE_DEPTH)]
    pub max_path_tree_depth: u32,
    #[builder(default = DEFAULT_MAX_NESTED_PIPELINE_DEPTH)]
    pub max_nested_pipeline_depth: u32,
    #[builder(default = DEFAULT_CURSOR_BATCH_BYTE_LIMIT)]
    pub cursor_batch_byte_limit: usize,
    #[builder(default = DEFAULT_INTERMEDIATE_DOCUMENT_BYTE_LIMIT)]
    pub intermediate_document_byte_limit: usize,
    #[builder(default = DEFAULT_SPILL_THRESHOLD_ROWS)]
    pub spill_threshold_rows: usize,
    #[builder(default = DEFAULT_CURSOR_TTL)]
    pub cursor_ttl: Duration,
    /// Collation every query uses unless it names its own (spec.md
    /// GLOSSARY "Collation"). `None` falls back to byte-lexicographic
    /// string comparison, same as passing `None` to `bson::compare`.
    #[builder(default, setter(strip_option))]
    pub default_collation: Option<Arc<dyn Collation>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_path_tree_depth", &self.max_path_tree_depth)
            .field("max_nested_pipeline_depth", &self.max_nested_pipeline_depth)
            .field("cursor_batch_byte_limit", &self.cursor_batch_byte_limit)
            .field("intermediate_document_byte_limit", &self.intermediate_document_byte_limit)
            .field("spill_threshold_rows", &self.spill_threshold_rows)
            .field("cursor_ttl", &self.cursor_ttl)
            .field("default_collation", &self.default_collation.is_some())
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EngineConfig {
    pub fn pipeline_limits(&self) -> crate::pipeline::PipelineLimits {
        crate::pipeline::PipelineLimits {
            max_nested_pipeline_depth: self.max_nested_pipeline_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_path_tree_depth, 100);
        assert_eq!(config.max_nested_pipeline_depth, 20);
        assert_eq!(config.cursor_batch_byte_limit, 16 * 1024 * 1024);
    }

    #[test]
    fn builder_overrides_individual_fields() {
        let config = EngineConfig::builder().max_nested_pipeline_depth(5).build();
        assert_eq!(config.max_nested_pipeline_depth, 5);
        assert_eq!(config.max_path_tree_depth, DEFAULT_MAX_PATH_TREE_DEPTH);
    }

    #[test]
    fn derives_pipeline_limits_from_its_own_nesting_bound() {
        let config = EngineConfig::builder().max_nested_pipeline_depth(7).build();
        assert_eq!(config.pipeline_limits().max_nested_pipeline_depth, 7);
    }

    #[test]
    fn defaults_to_no_collation_and_the_standard_cursor_ttl() {
        let config = EngineConfig::default();
        assert_eq!(config.cursor_ttl, DEFAULT_CURSOR_TTL);
        assert!(config.default_collation.is_none());
    }
}
