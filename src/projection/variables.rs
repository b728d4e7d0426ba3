//! Variable context for expression evaluation during projection (spec.md
//! §4.3 "Variables"). Mirrors a parent-scoped environment chain so `$let`
//! bindings shadow outer ones without copying the whole frame.

use std::collections::HashMap;

use crate::bson::Value;

/// A time snapshot frozen once per cursor open, so every document a single
/// find/aggregate emits observes the same `$$NOW`/`$$CLUSTER_TIME` values
/// (spec.md §4.5 "Frozen time-system variables"). The cursor manager owns
/// the authoritative snapshot; the projection engine only reads it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSnapshot {
    /// Milliseconds since the Unix epoch, as for `Value::DateTime`.
    pub now_millis: i64,
    pub cluster_time_seconds: i32,
    pub cluster_time_increment: i32,
}

/// A chain of variable scopes. Lookup walks from the innermost scope
/// outward; `$$NOW`/`$$CLUSTER_TIME`/`$$ROOT`/`$$CURRENT` are resolved
/// specially rather than stored as ordinary entries, since `$$ROOT`/
/// `$$CURRENT` change per document while user `$let` bindings don't.
pub struct VariableContext<'a> {
    parent: Option<&'a VariableContext<'a>>,
    bindings: HashMap<String, Value>,
    time: TimeSnapshot,
    root: Value,
    current: Value,
}

impl<'a> VariableContext<'a> {
    /// The root scope for one document being projected.
    pub fn root_scope(time: TimeSnapshot, document: Value) -> Self {
        Self {
            parent: None,
            bindings: HashMap::new(),
            time,
            root: document.clone(),
            current: document,
        }
    }

    /// Push a `$let`-style child scope with its own bindings and, if
    /// provided, a new `$$CURRENT`/`$$ROOT` rebinding for nested array
    /// traversal.
    pub fn child_scope(&'a self, bindings: HashMap<String, Value>) -> Self {
        Self {
            parent: Some(self),
            bindings,
            time: self.time,
            root: self.root.clone(),
            current: self.current.clone(),
        }
    }

    /// Swap in a new `$$CURRENT` for descending into an array element,
    /// keeping `$$ROOT` fixed at the top-level document (spec.md §4.3).
    pub fn with_current(&'a self, current: Value) -> Self {
        Self {
            parent: self.parent,
            bindings: HashMap::new(),
            time: self.time,
            root: self.root.clone(),
            current,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Value> {
        match name {
            "NOW" => Some(Value::DateTime(self.time.now_millis)),
            "CLUSTER_TIME" => Some(Value::Timestamp(crate::bson::Timestamp {
                time: self.time.cluster_time_seconds,
                increment: self.time.cluster_time_increment,
            })),
            "ROOT" => Some(self.root.clone()),
            "CURRENT" => Some(self.current.clone()),
            _ => {
                if let Some(v) = self.bindings.get(name) {
                    return Some(v.clone());
                }
                self.parent.and_then(|p| p.resolve(name))
            }
        }
    }

    pub fn current(&self) -> &Value {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TimeSnapshot {
        TimeSnapshot {
            now_millis: 1_700_000_000_000,
            cluster_time_seconds: 42,
            cluster_time_increment: 1,
        }
    }

    #[test]
    fn resolves_now_and_cluster_time() {
        let ctx = VariableContext::root_scope(snapshot(), Value::Null);
        assert_eq!(ctx.resolve("NOW"), Some(Value::DateTime(1_700_000_000_000)));
        assert!(matches!(ctx.resolve("CLUSTER_TIME"), Some(Value::Timestamp(_))));
    }

    #[test]
    fn child_scope_shadows_parent_binding() {
        let root = VariableContext::root_scope(snapshot(), Value::Null);
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), Value::Int32(1));
        let child = root.child_scope(bindings);
        assert_eq!(child.resolve("x"), Some(Value::Int32(1)));
        assert_eq!(child.resolve("NOW"), root.resolve("NOW"));
    }

    #[test]
    fn two_frozen_contexts_see_the_same_now() {
        let time = snapshot();
        let a = VariableContext::root_scope(time, Value::Null);
        let b = VariableContext::root_scope(time, Value::Null);
        assert_eq!(a.resolve("NOW"), b.resolve("NOW"));
    }
}
