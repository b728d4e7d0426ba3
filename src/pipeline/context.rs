//! Compilation context threaded through every stage handler (spec.md §4.4).

use super::tree::SortDirection;

const PROJECTION_CLASS_STAGES: &[&str] = &[
    "$project",
    "$addFields",
    "$set",
    "$unset",
    "$replaceRoot",
    "$replaceWith",
];

/// Stages forbidden inside a `$facet` arm (spec.md §4.4 "$facet": "must not
/// contain stages that produce multiple output streams").
pub const FORBIDDEN_IN_FACET: &[&str] =
    &["$out", "$merge", "$facet", "$changeStream", "$currentOp", "$indexStats"];

/// Per-compilation state carried stage to stage (spec.md §4.4).
#[derive(Clone, Debug, Default)]
pub struct BuildContext {
    /// Set when the previous stage's exit requires the next stage to be
    /// wrapped in a subquery.
    pub requires_subquery: bool,
    consecutive_projection_stages: u32,
    /// `0` at the top level; incremented for every nested pipeline level
    /// (`$lookup`, `$facet`, `$unionWith`, `$graphLookup`).
    pub nested_pipeline_level: u32,
    pub parent_stage: Option<String>,
    pub is_point_read_query: bool,
    pub sort_spec: Option<Vec<(String, SortDirection)>>,
}

impl BuildContext {
    /// Build a child context for a nested pipeline (spec.md §4.4: "Nested
    /// pipelines ... execute in a child context with
    /// nested-pipeline-level = parent + 1").
    pub fn nested(&self, parent_stage: impl Into<String>) -> Self {
        Self {
            requires_subquery: false,
            consecutive_projection_stages: 0,
            nested_pipeline_level: self.nested_pipeline_level + 1,
            parent_stage: Some(parent_stage.into()),
            is_point_read_query: false,
            sort_spec: None,
        }
    }

    /// Update bookkeeping after a stage has been appended to the tree
    /// (spec.md §4.4 "Subquery-injection policy").
    pub fn record_stage_exit(&mut self, stage_name: &str, forces_subquery: bool) {
        if PROJECTION_CLASS_STAGES.contains(&stage_name) {
            self.consecutive_projection_stages += 1;
            if self.consecutive_projection_stages >= 2 {
                self.requires_subquery = true;
            }
        } else {
            self.consecutive_projection_stages = 0;
        }
        if forces_subquery {
            self.requires_subquery = true;
        }
    }

    /// "After any stage that introduces or invalidates an ordering: reset
    /// the recorded sort-spec" (spec.md §4.4).
    pub fn reset_sort(&mut self) {
        self.sort_spec = None;
    }

    /// Consume the pending subquery requirement, if any.
    pub fn take_requires_subquery(&mut self) -> bool {
        std::mem::take(&mut self.requires_subquery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_consecutive_projection_stage_requires_subquery() {
        let mut ctx = BuildContext::default();
        ctx.record_stage_exit("$project", false);
        assert!(!ctx.requires_subquery);
        ctx.record_stage_exit("$addFields", false);
        assert!(ctx.requires_subquery);
    }

    #[test]
    fn non_projection_stage_resets_the_streak() {
        let mut ctx = BuildContext::default();
        ctx.record_stage_exit("$project", false);
        ctx.record_stage_exit("$match", false);
        ctx.record_stage_exit("$project", false);
        assert!(!ctx.requires_subquery);
    }

    #[test]
    fn group_forces_subquery() {
        let mut ctx = BuildContext::default();
        ctx.record_stage_exit("$group", true);
        assert!(ctx.requires_subquery);
    }

    #[test]
    fn nested_context_increments_level() {
        let ctx = BuildContext::default();
        let child = ctx.nested("$lookup");
        assert_eq!(child.nested_pipeline_level, 1);
        assert_eq!(child.parent_stage.as_deref(), Some("$lookup"));
    }
}
