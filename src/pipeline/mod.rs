//! The aggregation pipeline compiler (spec.md §4.4): compiles a list of
//! aggregation stages into a [`tree::QueryTree`] that a relational
//! optimizer external to this core consumes.

pub mod compiler;
pub mod context;
pub mod stages;
pub mod tree;

pub use compiler::{compile_pipeline, compile_with_context, CompiledPipeline};
pub use context::BuildContext;
pub use stages::PipelineLimits;
pub use tree::{QueryOp, QueryTree, Source, SortDirection, UnwindSpec};
