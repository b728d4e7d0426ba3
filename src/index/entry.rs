//! An immutable index access-method entry (spec.md §3.6).

use std::sync::Arc;

use typed_builder::TypedBuilder;

/// Operator-family identifier the relational substrate uses to pick a
/// concrete opclass for a column (spec.md §3.6: "callbacks to resolve
/// operator-family identifiers for each supported class").
pub type OpFamilyId = String;

/// Which index class a resolver callback applies to (spec.md §3.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexClass {
    SinglePath,
    Composite,
    Text,
    Hashed,
    Unique,
}

/// Capability booleans declared once, at registration (spec.md §3.6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexCapabilities {
    pub single_path: bool,
    pub unique: bool,
    pub wildcard: bool,
    pub composite: bool,
    pub text: bool,
    pub hashed: bool,
    pub order_by: bool,
    pub backwards_scan: bool,
    pub index_only_scan: bool,
    pub parallel_scan: bool,
}

/// A named, runtime-queryable predicate over an index's identifier, used
/// for the optional multikey-status and truncation-status hooks.
pub type IndexPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// An immutable index access-method entry (spec.md §3.6). Registered once
/// at startup and never mutated afterward; clones are cheap (shared
/// callbacks behind `Arc`).
#[derive(Clone, TypedBuilder)]
pub struct IndexAmEntry {
    #[builder(setter(into))]
    pub name: String,
    /// Identifier the relational substrate uses to address this AM.
    #[builder(setter(into))]
    pub substrate_id: String,
    pub capabilities: IndexCapabilities,
    /// Resolves the opfamily identifier this AM registers for a given
    /// index class, if it supports that class at all.
    resolve_opfamily: Arc<dyn Fn(IndexClass) -> Option<OpFamilyId> + Send + Sync>,
    #[builder(default, setter(strip_option))]
    explain_hook: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    #[builder(default, setter(strip_option))]
    multikey_predicate: Option<IndexPredicate>,
    #[builder(default, setter(strip_option))]
    truncation_predicate: Option<IndexPredicate>,
}

impl IndexAmEntry {
    pub fn opfamily_for(&self, class: IndexClass) -> Option<OpFamilyId> {
        (self.resolve_opfamily)(class)
    }

    pub fn explain(&self) -> Option<String> {
        self.explain_hook.as_ref().map(|hook| hook())
    }

    pub fn is_multikey(&self, index_name: &str) -> Option<bool> {
        self.multikey_predicate.as_ref().map(|p| p(index_name))
    }

    pub fn has_truncated_terms(&self, index_name: &str) -> Option<bool> {
        self.truncation_predicate.as_ref().map(|p| p(index_name))
    }
}
