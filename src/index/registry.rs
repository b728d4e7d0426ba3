//! The index access-method registry (spec.md §4.6): hosts a capability-
//! driven set of index access methods and routes queries/inserts to the
//! appropriate one.

use indexmap::IndexMap;

use crate::error::{ErrorKind, Result};

use super::entry::{IndexAmEntry, IndexClass};

/// The registry holds at most this many alternate AMs plus the default
/// (spec.md §4.6: "at most N=5 alternate AMs plus a default").
pub const MAX_ALTERNATE_AMS: usize = 5;

/// Capability-driven registry of index access methods.
pub struct IndexAmRegistry {
    default_am: IndexAmEntry,
    alternates: IndexMap<String, IndexAmEntry>,
}

impl IndexAmRegistry {
    pub fn new(default_am: IndexAmEntry) -> Self {
        Self {
            default_am,
            alternates: IndexMap::new(),
        }
    }

    /// Register an alternate AM. Rejects a sixth alternate and a
    /// duplicate name (spec.md §4.6 registration bound).
    pub fn register(&mut self, entry: IndexAmEntry) -> Result<()> {
        if entry.name == self.default_am.name || self.alternates.contains_key(&entry.name) {
            return Err(ErrorKind::IndexOptionsConflict {
                message: format!("an access method named {:?} is already registered", entry.name),
            }
            .into());
        }
        if self.alternates.len() >= MAX_ALTERNATE_AMS {
            #[cfg(feature = "tracing-unstable")]
            tracing::warn!(
                target: crate::trace::INDEX_TRACING_EVENT_TARGET,
                am_name = %entry.name,
                "rejected index access method registration: alternate cap reached"
            );
            return Err(ErrorKind::IndexOptionsConflict {
                message: format!("registry already holds the maximum of {MAX_ALTERNATE_AMS} alternate access methods"),
            }
            .into());
        }
        self.alternates.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn default_am(&self) -> &IndexAmEntry {
        &self.default_am
    }

    /// Lookup by name, for `createIndex`'s `"2dsphere"`/`"text"`/etc.
    /// access-method selector; falls back to the default when the
    /// requested name matches it.
    pub fn by_name(&self, name: &str) -> Option<&IndexAmEntry> {
        if name == self.default_am.name {
            return Some(&self.default_am);
        }
        self.alternates.get(name)
    }

    fn all(&self) -> impl Iterator<Item = &IndexAmEntry> {
        std::iter::once(&self.default_am).chain(self.alternates.values())
    }

    /// `is-regular-bson-index-am`: serves dotted-path, wildcard, composite
    /// index classes (spec.md §4.6).
    pub fn is_regular_bson_index_am(&self, am: &IndexAmEntry) -> bool {
        am.capabilities.single_path || am.capabilities.wildcard || am.capabilities.composite
    }

    /// `requires-range-optimization`: signals the compiler to split range
    /// predicates for this AM/opfamily pair.
    pub fn requires_range_optimization(&self, am: &IndexAmEntry, opfamily: &str) -> bool {
        am.opfamily_for(IndexClass::SinglePath).as_deref() == Some(opfamily)
            && !am.capabilities.hashed
    }

    /// `is-composite-op-family`: the index represents a multi-column
    /// ordered index.
    pub fn is_composite_op_family(&self, am: &IndexAmEntry, opfamily: &str) -> bool {
        am.capabilities.composite && am.opfamily_for(IndexClass::Composite).as_deref() == Some(opfamily)
    }

    /// `supports-parallel-scans`.
    pub fn supports_parallel_scans(&self, am: &IndexAmEntry, _opfamily: &str) -> bool {
        am.capabilities.parallel_scan
    }

    /// `is-order-by-supported-on-opclass`.
    pub fn is_order_by_supported_on_opclass(&self, am: &IndexAmEntry, _opclass: &str) -> bool {
        am.capabilities.order_by
    }

    /// `supports-index-only-scan`: yields callbacks the caller queries at
    /// runtime for a specific index name.
    pub fn supports_index_only_scan(&self, am: &IndexAmEntry, _opfamily: &str) -> IndexOnlyScanSupport<'_> {
        IndexOnlyScanSupport {
            supported: am.capabilities.index_only_scan,
            am,
        }
    }

    /// All registered AMs matching a capability predicate, used by the
    /// pipeline compiler during index selection.
    pub fn find_by<'a>(&'a self, predicate: impl Fn(&IndexAmEntry) -> bool + 'a) -> impl Iterator<Item = &'a IndexAmEntry> {
        self.all().filter(move |am| predicate(am))
    }
}

/// The triple `supports-index-only-scan` yields: whether the AM supports
/// it at all, plus the per-index multikey/truncation callbacks.
pub struct IndexOnlyScanSupport<'a> {
    pub supported: bool,
    am: &'a IndexAmEntry,
}

impl IndexOnlyScanSupport<'_> {
    pub fn is_multikey(&self, index_name: &str) -> Option<bool> {
        self.am.is_multikey(index_name)
    }

    pub fn has_truncated_terms(&self, index_name: &str) -> Option<bool> {
        self.am.has_truncated_terms(index_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::entry::IndexCapabilities;
    use std::sync::Arc;

    fn am(name: &str, capabilities: IndexCapabilities) -> IndexAmEntry {
        IndexAmEntry::builder()
            .name(name)
            .substrate_id(format!("pg_{name}"))
            .capabilities(capabilities)
            .resolve_opfamily(Arc::new(move |class| {
                (class == IndexClass::SinglePath).then(|| format!("{name}_ops"))
            }))
            .build()
    }

    fn btree() -> IndexAmEntry {
        am(
            "btree",
            IndexCapabilities {
                single_path: true,
                composite: true,
                order_by: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn registers_up_to_the_alternate_cap() {
        let mut registry = IndexAmRegistry::new(btree());
        for i in 0..MAX_ALTERNATE_AMS {
            registry
                .register(am(&format!("alt{i}"), IndexCapabilities::default()))
                .unwrap();
        }
        let err = registry
            .register(am("one_too_many", IndexCapabilities::default()))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IndexOptionsConflict { .. }));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = IndexAmRegistry::new(btree());
        let err = registry.register(btree()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IndexOptionsConflict { .. }));
    }

    #[test]
    fn lookup_by_name_falls_back_to_default() {
        let registry = IndexAmRegistry::new(btree());
        assert!(registry.by_name("btree").is_some());
        assert!(registry.by_name("nonexistent").is_none());
    }

    #[test]
    fn regular_bson_index_am_predicate() {
        let registry = IndexAmRegistry::new(btree());
        assert!(registry.is_regular_bson_index_am(registry.default_am()));
    }

    #[test]
    fn find_by_capability_predicate_sees_default_and_alternates() {
        let mut registry = IndexAmRegistry::new(btree());
        registry
            .register(am(
                "hash",
                IndexCapabilities {
                    hashed: true,
                    ..Default::default()
                },
            ))
            .unwrap();
        let parallel: Vec<_> = registry.find_by(|am| am.capabilities.hashed).collect();
        assert_eq!(parallel.len(), 1);
        assert_eq!(parallel[0].name, "hash");
    }
}
