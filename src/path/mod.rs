//! The path tree (spec.md §3.2, §4.2): a trie-like structure keyed by
//! dotted paths, used for projection, update, and index-spec parsing.

pub mod build;
pub mod expression;
pub mod tree;

pub use build::{build_tree, BuildOptions};
pub use expression::Expression;
pub use tree::{Leaf, LeafContext, Node, PathTree, TreeMode};
