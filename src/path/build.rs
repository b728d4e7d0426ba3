//! The path-tree construction algorithm (spec.md §4.2).

use super::expression::Expression;
use super::tree::{Intermediate, Leaf, LeafContext, Node, NodeKind, PathTree, TreeMode};
use crate::bson::{Document, Value};
use crate::error::{ErrorKind, Result};

/// Options controlling tree construction (spec.md §4.2 validation rules).
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Permit a tree to mix `Included` and `Excluded` leaves. Default
    /// `false` per spec.md §3.2's invariant.
    pub allow_inclusion_exclusion: bool,
    /// Maximum tree depth; exceeding it is `FailedToParse` (spec.md §8).
    pub max_depth: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            allow_inclusion_exclusion: false,
            max_depth: 100,
        }
    }
}

const CONTEXT_OPERATORS: &[&str] = &["$", "$elemMatch", "$slice", "$meta"];

/// Build a path tree from a specification document (spec.md §4.2).
pub fn build_tree(spec: &Document, options: &BuildOptions) -> Result<PathTree> {
    let mut root = Intermediate::default();
    let mut saw_included = false;
    let mut saw_excluded = false;
    let mut saw_field = false;
    let mut id_excluded = false;

    for (key, value) in spec.iter() {
        validate_top_level_name(key)?;
        let segments: Vec<&str> = key.split('.').collect();
        if segments.len() as u32 > options.max_depth {
            return Err(ErrorKind::FailedToParse {
                message: format!(
                    "path {key:?} has depth {} exceeding the configured limit of {}",
                    segments.len(),
                    options.max_depth
                ),
            }
            .into());
        }

        let leaf = compile_leaf(value)?;
        let is_excluded = matches!(leaf, Leaf::Excluded);
        let is_included = matches!(leaf, Leaf::Included);
        let is_expression = matches!(
            leaf,
            Leaf::Field(_) | Leaf::LeafFieldWithContext(_) | Leaf::LeafWithArrayField(_)
        );

        insert_leaf(&mut root, &segments, key, leaf)?;

        if key == "_id" {
            if is_excluded {
                id_excluded = true;
            }
        } else {
            saw_included |= is_included;
            saw_excluded |= is_excluded;
            saw_field |= is_expression;
        }
    }

    let mode = classify_mode(saw_included, saw_excluded, saw_field, options.allow_inclusion_exclusion)?;

    Ok(PathTree {
        root,
        mode,
        id_excluded,
    })
}

fn validate_top_level_name(key: &str) -> Result<()> {
    let first_segment = key.split('.').next().unwrap_or(key);
    if first_segment.starts_with('$') && first_segment != "$" {
        return Err(ErrorKind::BadValue {
            message: format!(
                "field names must not start with '$' (got {key:?}); only the positional \
                 operator escape \"$\" is permitted there"
            ),
        }
        .into());
    }
    Ok(())
}

fn compile_leaf(value: &Value) -> Result<Leaf> {
    match value {
        Value::Int32(0) | Value::Int64(0) => Ok(Leaf::Excluded),
        Value::Double(d) if *d == 0.0 => Ok(Leaf::Excluded),
        Value::Boolean(false) => Ok(Leaf::Excluded),
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) => Ok(Leaf::Included),
        Value::Boolean(true) => Ok(Leaf::Included),
        Value::Document(doc) if is_context_operator_document(doc) => {
            compile_context_leaf(doc)
        }
        other => Ok(Leaf::Field(Expression::compile(other))),
    }
}

fn is_context_operator_document(doc: &Document) -> bool {
    doc.len() == 1
        && doc
            .first_key()
            .map(|k| CONTEXT_OPERATORS.contains(&k))
            .unwrap_or(false)
}

fn compile_context_leaf(doc: &Document) -> Result<Leaf> {
    let (name, value) = doc
        .entries()
        .first()
        .map(|(k, v)| (k.as_str(), v))
        .expect("is_context_operator_document guarantees one entry");
    let context = match name {
        "$" => LeafContext::Positional,
        "$elemMatch" => {
            let query = value.as_document().ok_or_else(|| ErrorKind::BadValue {
                message: "$elemMatch projection requires a document argument".to_string(),
            })?;
            LeafContext::ElemMatch { query: query.clone() }
        }
        "$slice" => {
            let (skip, limit) = parse_slice(value)?;
            LeafContext::Slice { skip, limit }
        }
        "$meta" => {
            let name = value.as_str().ok_or_else(|| ErrorKind::BadValue {
                message: "$meta projection requires a string argument".to_string(),
            })?;
            LeafContext::Meta { name: name.to_string() }
        }
        _ => unreachable!("is_context_operator_document restricts to CONTEXT_OPERATORS"),
    };
    Ok(Leaf::LeafFieldWithContext(context))
}

fn parse_slice(value: &Value) -> Result<(i64, i64)> {
    match value {
        Value::Int32(n) => Ok((0, *n as i64)),
        Value::Int64(n) => Ok((0, *n)),
        Value::Array(items) if items.len() == 2 => {
            let skip = items[0].as_i64_lossy().ok_or_else(slice_bad_value)?;
            let limit = items[1].as_i64_lossy().ok_or_else(slice_bad_value)?;
            Ok((skip, limit))
        }
        _ => Err(slice_bad_value()),
    }
}

fn slice_bad_value() -> crate::error::Error {
    ErrorKind::BadValue {
        message: "$slice requires an integer or a [skip, limit] pair".to_string(),
    }
    .into()
}

fn insert_leaf(root: &mut Intermediate, segments: &[&str], full_path: &str, leaf: Leaf) -> Result<()> {
    let mut current: &mut Intermediate = &mut *root;
    let mut prefix_so_far = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if !prefix_so_far.is_empty() {
            prefix_so_far.push('.');
        }
        prefix_so_far.push_str(segment);
        let is_last = i == segments.len() - 1;

        if is_last {
            match current.child(segment) {
                Some(existing) => {
                    return Err(match &existing.kind {
                        NodeKind::Leaf(_) => ErrorKind::PathCollision {
                            path: full_path.to_string(),
                        },
                        NodeKind::Intermediate(_) => ErrorKind::PartialPathCollision {
                            prefix: full_path.to_string(),
                            path: prefix_so_far.clone(),
                        },
                    }
                    .into());
                }
                None => {
                    let has_expression = matches!(
                        leaf,
                        Leaf::Field(_) | Leaf::LeafFieldWithContext(_) | Leaf::LeafWithArrayField(_)
                    );
                    current.insert_child(Node {
                        segment: segment.to_string(),
                        kind: NodeKind::Leaf(leaf),
                    });
                    if has_expression {
                        current.has_expression_fields_in_children = true;
                        mark_ancestors(root, &segments[..segments.len() - 1]);
                    }
                    return Ok(());
                }
            }
        }

        // Not the last segment: need an intermediate node here.
        match current.child(segment) {
            Some(existing) => match &existing.kind {
                NodeKind::Leaf(_) => {
                    return Err(ErrorKind::PartialPathCollision {
                        prefix: prefix_so_far.clone(),
                        path: full_path.to_string(),
                    }
                    .into());
                }
                NodeKind::Intermediate(_) => {}
            },
            None => {
                current.insert_child(Node {
                    segment: segment.to_string(),
                    kind: NodeKind::Intermediate(Intermediate::default()),
                });
            }
        }

        current = match &mut current.child_mut(segment).unwrap().kind {
            NodeKind::Intermediate(inner) => inner,
            NodeKind::Leaf(_) => unreachable!("just ensured this child is Intermediate"),
        };
    }
    Ok(())
}

/// Set `has_expression_fields_in_children` on every intermediate node from
/// the root down through `segments` (spec.md §4.2 step 3: "set
/// has-expression-fields-in-children on every ancestor of any
/// Field/LeafFieldWithContext leaf").
fn mark_ancestors(root: &mut Intermediate, segments: &[&str]) {
    root.has_expression_fields_in_children = true;
    let mut current = root;
    for segment in segments {
        current = match &mut current.child_mut(segment).unwrap().kind {
            NodeKind::Intermediate(inner) => {
                inner.has_expression_fields_in_children = true;
                inner
            }
            NodeKind::Leaf(_) => return,
        };
    }
}

fn classify_mode(
    saw_included: bool,
    saw_excluded: bool,
    saw_field: bool,
    allow_mixed: bool,
) -> Result<TreeMode> {
    match (saw_included, saw_excluded, saw_field) {
        (false, false, false) => Ok(TreeMode::Inclusion), // empty/only-_id spec
        (_, false, true) => Ok(TreeMode::Expression),
        (true, false, false) => Ok(TreeMode::Inclusion),
        (false, true, false) => Ok(TreeMode::Exclusion),
        (true, true, _) if allow_mixed => Ok(TreeMode::Mixed),
        (true, true, _) => Err(ErrorKind::BadValue {
            message: "cannot mix inclusion and exclusion specifications".to_string(),
        }
        .into()),
        (false, true, true) => Ok(TreeMode::Expression),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Document;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        let mut d = Document::new();
        for (k, v) in pairs {
            d.append(*k, v.clone());
        }
        d
    }

    #[test]
    fn inclusion_tree_from_dotted_path() {
        let spec = doc(&[("a.b", Value::Int32(1))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        assert_eq!(tree.mode, TreeMode::Inclusion);
        let a = tree.root.child("a").unwrap();
        match &a.kind {
            NodeKind::Intermediate(inner) => {
                assert!(inner.child("b").is_some());
            }
            _ => panic!("expected intermediate node"),
        }
    }

    #[test]
    fn exact_duplicate_path_is_a_collision() {
        let mut spec = Document::new();
        spec.append("a", Value::Int32(1));
        // Simulate a duplicate by inserting the tree twice manually via two
        // build calls against trees sharing "a" is not expressible with a
        // single Document (keys are deduplicated at the BSON level in
        // practice); instead exercise the lower-level insert directly.
        let mut root = Intermediate::default();
        insert_leaf(&mut root, &["a"], "a", Leaf::Included).unwrap();
        let err = insert_leaf(&mut root, &["a"], "a", Leaf::Included).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PathCollision { .. }));
        let _ = spec;
    }

    #[test]
    fn partial_path_collision_when_prefix_then_longer() {
        let mut root = Intermediate::default();
        insert_leaf(&mut root, &["a"], "a", Leaf::Included).unwrap();
        let err = insert_leaf(&mut root, &["a", "b"], "a.b", Leaf::Included).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PartialPathCollision { .. }));
    }

    #[test]
    fn partial_path_collision_when_longer_then_prefix() {
        let mut root = Intermediate::default();
        insert_leaf(&mut root, &["a", "b"], "a.b", Leaf::Included).unwrap();
        let err = insert_leaf(&mut root, &["a"], "a", Leaf::Included).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PartialPathCollision { .. }));
    }

    #[test]
    fn mixing_inclusion_and_exclusion_fails_by_default() {
        let spec = doc(&[("a", Value::Int32(1)), ("b", Value::Int32(0))]);
        let err = build_tree(&spec, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadValue { .. }));
    }

    #[test]
    fn id_exclusion_is_exempt_from_mixing_rule() {
        let spec = doc(&[("a", Value::Int32(1)), ("_id", Value::Int32(0))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        assert_eq!(tree.mode, TreeMode::Inclusion);
        assert!(tree.id_excluded);
    }

    #[test]
    fn mixing_allowed_when_opted_in() {
        let spec = doc(&[("a", Value::Int32(1)), ("b", Value::Int32(0))]);
        let options = BuildOptions {
            allow_inclusion_exclusion: true,
            ..BuildOptions::default()
        };
        let tree = build_tree(&spec, &options).unwrap();
        assert_eq!(tree.mode, TreeMode::Mixed);
    }

    #[test]
    fn top_level_dollar_prefixed_name_rejected() {
        let spec = doc(&[("$bogus", Value::Int32(1))]);
        let err = build_tree(&spec, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadValue { .. }));
    }

    #[test]
    fn positional_escape_is_allowed() {
        let spec = doc(&[("grades.$", Value::Int32(1))]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        let grades = tree.root.child("grades").unwrap();
        match &grades.kind {
            NodeKind::Intermediate(inner) => {
                let dollar = inner.child("$").unwrap();
                assert!(matches!(
                    dollar.kind,
                    NodeKind::Leaf(Leaf::LeafFieldWithContext(LeafContext::Positional))
                ));
            }
            _ => panic!("expected intermediate"),
        }
    }

    #[test]
    fn elem_match_and_slice_compile_to_contexts() {
        let mut elem = Document::new();
        elem.append("g", {
            let mut gte = Document::new();
            gte.append("$gte", 90i32);
            Value::Document(gte)
        });
        let spec = doc(&[
            ("grades", Value::Document({
                let mut d = Document::new();
                d.append("$elemMatch", Value::Document(elem));
                d
            })),
        ]);
        let tree = build_tree(&spec, &BuildOptions::default()).unwrap();
        match &tree.root.child("grades").unwrap().kind {
            NodeKind::Leaf(Leaf::LeafFieldWithContext(LeafContext::ElemMatch { .. })) => {}
            other => panic!("expected elemMatch leaf, got {other:?}"),
        }
    }

    #[test]
    fn depth_limit_is_enforced() {
        let spec = doc(&[("a.b.c", Value::Int32(1))]);
        let options = BuildOptions {
            max_depth: 2,
            ..BuildOptions::default()
        };
        let err = build_tree(&spec, &options).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FailedToParse { .. }));
    }
}
