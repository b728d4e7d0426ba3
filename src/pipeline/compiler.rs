//! The aggregation pipeline compiler entry point (spec.md §4.4): turns a
//! list of stage documents into a [`QueryTree`].

use crate::bson::Document;
use crate::error::{ErrorKind, Result};

use super::context::BuildContext;
use super::stages::{self, PipelineLimits};
use super::tree::QueryTree;

/// The outcome of compiling one pipeline: the tree itself plus the flags
/// downstream components (the cursor manager, in particular) need.
#[derive(Debug)]
pub struct CompiledPipeline {
    pub tree: QueryTree,
    /// Set when the tree's sole filter is an `_id` equality on the primary
    /// key and no post-filters remain (spec.md §4.4 "Point-read
    /// recognition"); the caller only raises this when the collection's
    /// shard key is also `_id`, since that additional fact lives with the
    /// Row Store collaborator, not the compiler.
    pub is_point_read_query: bool,
}

/// Compile `stages` against `root_collection`. `shard_key_field`, if
/// known, is used for point-read and `$setWindowFields` shard-partition
/// recognition; pass `None` when the caller hasn't resolved it yet.
pub fn compile_pipeline(
    stages: &[Document],
    root_collection: &str,
    shard_key_field: Option<&str>,
    limits: &PipelineLimits,
) -> Result<CompiledPipeline> {
    #[cfg(feature = "tracing-unstable")]
    let _span = tracing::debug_span!(
        target: crate::trace::PIPELINE_TRACING_EVENT_TARGET,
        "compile_pipeline",
        collection = root_collection,
        stage_count = stages.len()
    )
    .entered();

    let mut ctx = BuildContext::default();
    let tree = compile_with_context(stages, root_collection, &mut ctx, limits)?;

    let is_point_read_query = shard_key_field == Some("_id") && tree.is_id_equality_only().is_some();

    #[cfg(feature = "tracing-unstable")]
    tracing::debug!(
        target: crate::trace::PIPELINE_TRACING_EVENT_TARGET,
        collection = root_collection,
        stage_count = stages.len(),
        is_point_read_query,
        "compiled pipeline"
    );

    Ok(CompiledPipeline {
        tree,
        is_point_read_query,
    })
}

/// Compile a (possibly nested) pipeline against an existing [`BuildContext`].
/// Exposed so `$lookup`/`$facet`/`$unionWith`/`$graphLookup` can recurse
/// into sub-pipelines while sharing the nesting-depth bookkeeping (spec.md
/// §4.4 "Nested pipelines ... execute in a child context").
pub fn compile_with_context(
    stage_docs: &[Document],
    collection: &str,
    ctx: &mut BuildContext,
    limits: &PipelineLimits,
) -> Result<QueryTree> {
    stages::check_nesting_limit(ctx, limits)?;

    let mut tree = QueryTree::from_collection(collection);
    let mut i = 0;
    while i < stage_docs.len() {
        let stage = &stage_docs[i];
        let (name, spec) = stage_name_and_spec(stage)?;

        if ctx.take_requires_subquery() {
            tree = QueryTree {
                source: super::tree::Source::Subquery(Box::new(tree)),
                ops: Vec::new(),
            };
        }

        if name == "$lookup" {
            if let Some(next) = stage_docs.get(i + 1) {
                let (next_name, next_spec) = stage_name_and_spec(next)?;
                if next_name == "$unwind" {
                    if let Some(preserve) = stages::fusable_lookup_unwind(spec, next_spec)? {
                        tree = stages::lookup_unwind_stage(spec, preserve, tree, ctx, limits)?;
                        i += 2;
                        continue;
                    }
                }
            }
        }

        tree = dispatch_stage(name, spec, tree, ctx, limits)?;
        i += 1;
    }

    Ok(tree)
}

fn stage_name_and_spec(stage: &Document) -> Result<(&str, &crate::bson::Value)> {
    if stage.len() != 1 {
        return Err(ErrorKind::StageSpecInvalid {
            stage: "<pipeline>".to_string(),
            message: "a stage document must have exactly one field".to_string(),
        }
        .into());
    }
    Ok((stage.first_key().unwrap(), stage.first_value().unwrap()))
}

fn dispatch_stage(
    name: &str,
    spec: &crate::bson::Value,
    tree: QueryTree,
    ctx: &mut BuildContext,
    limits: &PipelineLimits,
) -> Result<QueryTree> {
    match name {
        "$match" => stages::match_stage(spec, tree, ctx),
        "$project" | "$addFields" | "$set" | "$unset" | "$replaceRoot" | "$replaceWith" => {
            stages::projection_class_stage(name, spec, tree, ctx)
        }
        "$sort" => stages::sort_stage(spec, tree, ctx),
        "$limit" => stages::limit_stage(spec, tree, ctx),
        "$skip" => stages::skip_stage(spec, tree, ctx),
        "$group" => stages::group_stage(spec, tree, ctx),
        "$sortByCount" => stages::sort_by_count_stage(spec, tree, ctx),
        "$unwind" => stages::unwind_stage(spec, tree, ctx),
        "$lookup" => stages::lookup_stage(spec, tree, ctx, limits),
        "$unionWith" => stages::union_with_stage(spec, tree, ctx, limits),
        "$facet" => stages::facet_stage(spec, tree, ctx, limits),
        "$graphLookup" => stages::graph_lookup_stage(spec, tree, ctx),
        "$setWindowFields" => stages::set_window_fields_stage(spec, tree, ctx, None),
        other => Err(ErrorKind::StageNotSupported {
            stage: other.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Value;
    use crate::pipeline::tree::{QueryOp, Source};

    fn stage(name: &str, value: Value) -> Document {
        let mut d = Document::new();
        d.append(name, value);
        d
    }

    fn limits() -> PipelineLimits {
        PipelineLimits {
            max_nested_pipeline_depth: 20,
        }
    }

    #[test]
    fn match_then_project_compiles_without_subquery() {
        let stages = vec![
            stage("$match", Value::Document(Document::new())),
            stage("$project", Value::Document(Document::new())),
        ];
        let compiled = compile_pipeline(&stages, "coll", None, &limits()).unwrap();
        assert_eq!(compiled.tree.ops.len(), 2);
        assert!(matches!(compiled.tree.source, Source::Collection(_)));
    }

    #[test]
    fn second_consecutive_projection_stage_wraps_a_subquery() {
        let stages = vec![
            stage("$project", Value::Document(Document::new())),
            stage("$addFields", Value::Document(Document::new())),
            stage("$set", Value::Document(Document::new())),
        ];
        let compiled = compile_pipeline(&stages, "coll", None, &limits()).unwrap();
        // third stage triggers the wrap, so the outer tree's source is a
        // Subquery wrapping the first two stages.
        assert!(matches!(compiled.tree.source, Source::Subquery(_)));
        assert_eq!(compiled.tree.ops.len(), 1);
    }

    #[test]
    fn scenario_s3_point_read_is_recognized() {
        let mut eq = Document::new();
        eq.append("_id", 7i32);
        let stages = vec![stage("$match", Value::Document(eq))];
        let compiled = compile_pipeline(&stages, "coll", Some("_id"), &limits()).unwrap();
        assert!(compiled.is_point_read_query);
    }

    #[test]
    fn point_read_requires_id_shard_key() {
        let mut eq = Document::new();
        eq.append("_id", 7i32);
        let stages = vec![stage("$match", Value::Document(eq))];
        let compiled = compile_pipeline(&stages, "coll", Some("region"), &limits()).unwrap();
        assert!(!compiled.is_point_read_query);
    }

    #[test]
    fn scenario_s4_lookup_unwind_fuses() {
        let mut lookup = Document::new();
        lookup.append("from", "B");
        lookup.append("localField", "x");
        lookup.append("foreignField", "y");
        lookup.append("as", "j");
        let stages = vec![
            stage("$lookup", Value::Document(lookup)),
            stage("$unwind", Value::String("$j".to_string())),
        ];
        let compiled = compile_pipeline(&stages, "A", None, &limits()).unwrap();
        assert_eq!(compiled.tree.ops.len(), 1);
        match &compiled.tree.ops[0] {
            QueryOp::Lookup { unwind, as_field, .. } => {
                assert_eq!(as_field, "j");
                assert!(unwind.is_some());
            }
            other => panic!("expected fused Lookup op, got {other:?}"),
        }
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let stages = vec![stage("$bogusStage", Value::Null)];
        let err = compile_pipeline(&stages, "coll", None, &limits()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StageNotSupported { .. }));
    }

    #[test]
    fn bucket_auto_is_not_aliased_to_group() {
        let mut spec = Document::new();
        spec.append("groupBy", "$price");
        spec.append("buckets", 4i32);
        let stages = vec![stage("$bucketAuto", Value::Document(spec))];
        let err = compile_pipeline(&stages, "coll", None, &limits()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StageNotSupported { .. }));
    }

    #[test]
    fn sort_by_count_desugars_to_a_group_and_descending_sort() {
        let stages = vec![stage("$sortByCount", Value::String("$category".to_string()))];
        let compiled = compile_pipeline(&stages, "coll", None, &limits()).unwrap();
        assert_eq!(compiled.tree.ops.len(), 2);
        match &compiled.tree.ops[0] {
            QueryOp::Group { key, accumulators } => {
                assert_eq!(key.get("_id"), Some(&Value::String("$category".to_string())));
                assert!(accumulators.contains_key("count"));
            }
            other => panic!("expected Group op, got {other:?}"),
        }
        match &compiled.tree.ops[1] {
            QueryOp::Sort(spec) => {
                assert_eq!(spec, &vec![("count".to_string(), crate::pipeline::SortDirection::Descending)]);
            }
            other => panic!("expected Sort op, got {other:?}"),
        }
    }

    #[test]
    fn facet_rejects_nested_out_stage() {
        let mut arm = Document::new();
        arm.append("$out", "other");
        let mut facet = Document::new();
        facet.append("a", Value::Array(vec![Value::Document(arm)]));
        let stages = vec![stage("$facet", Value::Document(facet))];
        let err = compile_pipeline(&stages, "coll", None, &limits()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StageSpecInvalid { .. }));
    }

    #[test]
    fn nested_pipeline_depth_limit_is_enforced() {
        let mut lookup = Document::new();
        lookup.append("from", "B");
        lookup.append("localField", "x");
        lookup.append("foreignField", "y");
        lookup.append("as", "j");
        lookup.append("pipeline", Value::Array(Vec::new()));
        let stages = vec![stage("$lookup", Value::Document(lookup))];
        let tight_limits = PipelineLimits {
            max_nested_pipeline_depth: 0,
        };
        let err = compile_pipeline(&stages, "A", None, &tight_limits).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NestedLimit { .. }));
    }
}
