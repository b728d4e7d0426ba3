//! The projection engine itself (spec.md §4.3): walks a source document and
//! a [`PathTree`] in lockstep to produce a target document.

use crate::bson::value::extract_path;
use crate::bson::{Document, Value};
use crate::error::{ErrorKind, Result};
use crate::path::tree::{Intermediate, Leaf, LeafContext, Node, NodeKind};
use crate::path::{Expression, PathTree, TreeMode};

use super::query::{MatchPredicate, QueryEvaluator};
use super::variables::{TimeSnapshot, VariableContext};

/// Drives one document through a [`PathTree`] (spec.md §4.3 "Algorithm").
/// Stateless across documents except for the frozen time snapshot and the
/// optional positional-operator query evaluator, both of which a cursor
/// holds for the lifetime of a single find/aggregate operation so every
/// document it emits sees the same `$$NOW` and the same `$`-match index
/// resolution rule.
pub struct ProjectionEngine {
    time: TimeSnapshot,
    /// Resolves which array element `$`-positional selects. `None` when
    /// the tree has no positional leaf (the common case); using `$`
    /// without one supplied is a caller error (spec.md §4.3).
    positional: Option<QueryEvaluator>,
}

impl ProjectionEngine {
    pub fn new(time: TimeSnapshot, positional: Option<QueryEvaluator>) -> Self {
        Self { time, positional }
    }

    /// Project `source` through `tree`, producing the target document.
    pub fn project(&self, source: &Document, tree: &PathTree) -> Result<Document> {
        let vars = VariableContext::root_scope(self.time, Value::Document(source.clone()));

        let mut target = match tree.mode {
            TreeMode::Exclusion => {
                let mut target = source.clone();
                self.apply_exclusion(&mut target, &tree.root)?;
                target
            }
            TreeMode::Inclusion | TreeMode::Expression | TreeMode::Mixed => {
                self.project_children(Some(source), &tree.root, &vars)?
            }
        };

        if !matches!(tree.mode, TreeMode::Exclusion)
            && tree.root.child("_id").is_none()
            && !tree.id_excluded
        {
            if let Some(id) = source.get("_id") {
                target = prepend_id(id.clone(), target);
            }
        }

        Ok(target)
    }

    /// Inclusion/Expression/Mixed walker: builds a fresh document containing
    /// only the paths the tree names (spec.md §4.3 Inclusion/Expression
    /// modes share this algorithm — the only difference between them is
    /// which leaf kinds appear, which the tree builder already validated).
    fn project_children(
        &self,
        parent_doc: Option<&Document>,
        intermediate: &Intermediate,
        vars: &VariableContext,
    ) -> Result<Document> {
        let mut target = Document::with_capacity(intermediate.children().len());
        for node in intermediate.children() {
            let field_source = parent_doc.and_then(|d| d.get(&node.segment));
            let projected = self.project_node(field_source, node, vars)?;
            if let Some(value) = projected {
                target.append(node.segment.clone(), value);
            }
        }
        Ok(target)
    }

    fn project_node(
        &self,
        source: Option<&Value>,
        node: &Node,
        vars: &VariableContext,
    ) -> Result<Option<Value>> {
        match &node.kind {
            NodeKind::Leaf(leaf) => self.project_leaf(source, leaf, vars),
            NodeKind::Intermediate(inner) => self.project_intermediate(source, inner, vars),
        }
    }

    fn project_leaf(
        &self,
        source: Option<&Value>,
        leaf: &Leaf,
        vars: &VariableContext,
    ) -> Result<Option<Value>> {
        match leaf {
            Leaf::Included => Ok(source.cloned()),
            Leaf::Excluded => Ok(None),
            Leaf::Field(expr) => self.evaluate_expression(expr, vars),
            Leaf::LeafWithArrayField(entries) => {
                let max_index = entries.iter().map(|(i, _)| *i).max().unwrap_or(0);
                let mut slots: Vec<Value> = vec![Value::Null; max_index + 1];
                for (index, sub_leaf) in entries {
                    if let Some(value) = self.project_leaf(None, sub_leaf, vars)? {
                        slots[*index] = value;
                    }
                }
                Ok(Some(Value::Array(slots)))
            }
            Leaf::LeafFieldWithContext(ctx) => {
                // Reached only when a context leaf has no enclosing array
                // intermediate (e.g. a bare `{"$": 1}` at the top level),
                // which is meaningless outside of `try_handle_intermediate_array`.
                let _ = ctx;
                Err(ErrorKind::BadValue {
                    message: "projection operator used outside of an array field path"
                        .to_string(),
                }
                .into())
            }
        }
    }

    /// Recurse into an intermediate (non-leaf) path segment: first give the
    /// array-consuming operators (`$`, `$elemMatch`, `$slice`, `$meta`) a
    /// chance to claim the whole subtree (spec.md §4.3
    /// `try-handle-intermediate-array`); otherwise descend normally,
    /// mapping over array elements and recursing into documents.
    fn project_intermediate(
        &self,
        source: Option<&Value>,
        intermediate: &Intermediate,
        vars: &VariableContext,
    ) -> Result<Option<Value>> {
        if let Some(handled) = self.try_handle_intermediate_array(source, intermediate, vars)? {
            return Ok(handled);
        }

        match source {
            None => Ok(None), // skip-unresolved-intermediate: don't materialize
            Some(Value::Document(doc)) => {
                let projected = self.project_children(Some(doc), intermediate, vars)?;
                Ok(Some(Value::Document(projected)))
            }
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Document(d) => {
                            let projected = self.project_children(Some(d), intermediate, vars)?;
                            out.push(Value::Document(projected));
                        }
                        other => out.push(other.clone()),
                    }
                }
                Ok(Some(Value::Array(out)))
            }
            Some(other) => Ok(Some(other.clone())),
        }
    }

    /// `try-handle-intermediate-array`: an intermediate node whose sole
    /// child is a context leaf (`$`, `$elemMatch`, `$slice`, `$meta`)
    /// represents an array-consuming operator applied to the path at this
    /// node, rather than an ordinary nested document. Returns `Ok(None)`
    /// when this node isn't such a case, so the caller falls back to the
    /// default recursion.
    fn try_handle_intermediate_array(
        &self,
        source: Option<&Value>,
        intermediate: &Intermediate,
        _vars: &VariableContext,
    ) -> Result<Option<Option<Value>>> {
        let only_child = match intermediate.children() {
            [single] => single,
            _ => return Ok(None),
        };
        let ctx = match &only_child.kind {
            NodeKind::Leaf(Leaf::LeafFieldWithContext(ctx)) => ctx,
            _ => return Ok(None),
        };

        let array = match source {
            Some(Value::Array(items)) => items,
            _ => return Ok(Some(None)),
        };

        let result = match ctx {
            LeafContext::Positional => {
                let evaluator = self.positional.as_ref().ok_or_else(|| {
                    Into::<crate::error::Error>::into(ErrorKind::BadValue {
                        message: "$ positional projection requires a query evaluator".to_string(),
                    })
                })?;
                evaluator
                    .first_matching_index(array)
                    .map(|idx| Value::Array(vec![array[idx].clone()]))
            }
            LeafContext::ElemMatch { query } => {
                let predicate = MatchPredicate::compile(query);
                array
                    .iter()
                    .find(|item| matches!(item, Value::Document(d) if predicate.matches(d)))
                    .map(|item| Value::Array(vec![item.clone()]))
            }
            LeafContext::Slice { skip, limit } => Some(Value::Array(apply_slice(array, *skip, *limit))),
            LeafContext::Meta { .. } => {
                // No query-metadata source (text score, search rank, ...) is
                // wired into the core; that belongs to the Row Store /
                // Protocol Frontend collaborators (spec.md §1). Omit rather
                // than fabricate a value.
                None
            }
        };
        Ok(Some(result))
    }

    /// Exclusion walker: mutate a clone of `source` in place, removing
    /// named paths (spec.md §4.3 Exclusion mode).
    fn apply_exclusion(&self, target: &mut Document, intermediate: &Intermediate) -> Result<()> {
        for node in intermediate.children() {
            match &node.kind {
                NodeKind::Leaf(Leaf::Excluded) => {
                    target.remove(&node.segment);
                }
                NodeKind::Leaf(_) => {
                    // Exclusion trees never mix in Field/Included leaves
                    // (enforced at build time); nothing to do.
                }
                NodeKind::Intermediate(inner) => match target.get(&node.segment).cloned() {
                    Some(Value::Document(mut sub)) => {
                        self.apply_exclusion(&mut sub, inner)?;
                        target.set(node.segment.clone(), sub);
                    }
                    Some(Value::Array(items)) => {
                        let mut out = Vec::with_capacity(items.len());
                        for item in items {
                            if let Value::Document(mut d) = item {
                                self.apply_exclusion(&mut d, inner)?;
                                out.push(Value::Document(d));
                            } else {
                                out.push(item);
                            }
                        }
                        target.set(node.segment.clone(), Value::Array(out));
                    }
                    _ => {}
                },
            }
        }
        Ok(())
    }

    fn evaluate_expression(&self, expr: &Expression, vars: &VariableContext) -> Result<Option<Value>> {
        match expr {
            Expression::Literal(v) => Ok(Some(v.clone())),
            Expression::FieldPath(path) => Ok(extract_path(vars.current(), path, true)),
            Expression::Variable(name) => Ok(vars.resolve(name)),
            Expression::Operator { name, .. } => Err(ErrorKind::CommandNotSupported {
                command: name.clone(),
            }
            .into()),
        }
    }
}

fn prepend_id(id: Value, target: Document) -> Document {
    let mut with_id = Document::with_capacity(target.len() + 1);
    with_id.append("_id", id);
    for (key, value) in target.entries() {
        with_id.append(key.clone(), value.clone());
    }
    with_id
}

/// `$slice` windowing (spec.md §4.2 `$slice` leaf context). A positive
/// `skip` counts from the front; a negative `skip` counts from the back, as
/// in MongoDB's two-argument `$slice`. A negative `limit` is not meaningful
/// without its own skip-from-end counterpart and yields an empty window.
fn apply_slice(array: &[Value], skip: i64, limit: i64) -> Vec<Value> {
    let len = array.len() as i64;
    if limit <= 0 {
        return Vec::new();
    }
    let start = if skip < 0 {
        (len + skip).max(0)
    } else {
        skip.min(len)
    };
    let end = (start + limit).min(len);
    if end <= start {
        return Vec::new();
    }
    array[start as usize..end as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{build_tree, BuildOptions};
    use pretty_assertions::assert_eq;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        let mut d = Document::new();
        for (k, v) in pairs {
            d.append(*k, v.clone());
        }
        d
    }

    fn time() -> TimeSnapshot {
        TimeSnapshot {
            now_millis: 1_700_000_000_000,
            cluster_time_seconds: 1,
            cluster_time_increment: 1,
        }
    }

    #[test]
    fn inclusion_keeps_named_paths_and_id() {
        let source = doc(&[
            ("_id", Value::Int32(1)),
            ("a", Value::Int32(10)),
            ("b", Value::Int32(20)),
        ]);
        let spec = doc(&[("a", Value::Int32(1))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        let engine = ProjectionEngine::new(time(), None);
        let result = engine.project(&source, &tree).unwrap();
        assert_eq!(result.get("_id"), Some(&Value::Int32(1)));
        assert_eq!(result.get("a"), Some(&Value::Int32(10)));
        assert_eq!(result.get("b"), None);
    }

    #[test]
    fn exclusion_drops_named_paths_keeps_rest() {
        let source = doc(&[
            ("_id", Value::Int32(1)),
            ("a", Value::Int32(10)),
            ("b", Value::Int32(20)),
        ]);
        let spec = doc(&[("b", Value::Int32(0))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        let engine = ProjectionEngine::new(time(), None);
        let result = engine.project(&source, &tree).unwrap();
        assert_eq!(result.get("a"), Some(&Value::Int32(10)));
        assert_eq!(result.get("b"), None);
    }

    #[test]
    fn nested_inclusion_recurses_into_subdocument() {
        let inner = doc(&[("x", Value::Int32(1)), ("y", Value::Int32(2))]);
        let source = doc(&[("_id", Value::Int32(1)), ("a", Value::Document(inner))]);
        let spec = doc(&[("a.x", Value::Int32(1))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        let engine = ProjectionEngine::new(time(), None);
        let result = engine.project(&source, &tree).unwrap();
        let a = result.get("a").and_then(Value::as_document).unwrap();
        assert_eq!(a.get("x"), Some(&Value::Int32(1)));
        assert_eq!(a.get("y"), None);
    }

    #[test]
    fn positional_projection_selects_matching_element() {
        let grades = vec![
            Value::Document(doc(&[("s", Value::String("math".into())), ("g", Value::Int32(85))])),
            Value::Document(doc(&[("s", Value::String("eng".into())), ("g", Value::Int32(90))])),
        ];
        let source = doc(&[("_id", Value::Int32(1)), ("grades", Value::Array(grades.clone()))]);
        let spec = doc(&[("grades.$", Value::Int32(1))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();

        let mut gte = Document::new();
        gte.append("$gte", 90i32);
        let mut query = Document::new();
        query.append("g", Value::Document(gte));
        let evaluator = QueryEvaluator::new(&query, "g");

        let engine = ProjectionEngine::new(time(), Some(evaluator));
        let result = engine.project(&source, &tree).unwrap();
        match result.get("grades") {
            Some(Value::Array(arr)) => {
                assert_eq!(arr.len(), 1);
                assert_eq!(arr[0], grades[1]);
            }
            other => panic!("expected single-element array, got {other:?}"),
        }
    }

    #[test]
    fn slice_windows_an_array() {
        let items: Vec<Value> = (0..5).map(Value::Int32).collect();
        let source = doc(&[("_id", Value::Int32(1)), ("tags", Value::Array(items))]);
        let mut slice_spec = Document::new();
        slice_spec.append("$slice", Value::Array(vec![Value::Int32(1), Value::Int32(2)]));
        let spec = doc(&[("tags", Value::Document(slice_spec))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        let engine = ProjectionEngine::new(time(), None);
        let result = engine.project(&source, &tree).unwrap();
        assert_eq!(
            result.get("tags"),
            Some(&Value::Array(vec![Value::Int32(1), Value::Int32(2)]))
        );
    }

    #[test]
    fn expression_field_evaluates_variable() {
        let source = doc(&[("_id", Value::Int32(1)), ("a", Value::Int32(1))]);
        let spec = doc(&[("now", Value::String("$$NOW".to_string()))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        let engine = ProjectionEngine::new(time(), None);
        let result = engine.project(&source, &tree).unwrap();
        assert_eq!(result.get("now"), Some(&Value::DateTime(1_700_000_000_000)));
    }
}
