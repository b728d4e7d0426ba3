//! A minimal match-predicate evaluator used by `$elemMatch` projection
//! leaves and by the `$`-positional operator's "which array index
//! matched the query" resolution (spec.md §4.3). This is *not* the query
//! planner — it is the small subset of matching the projection engine
//! needs to decide which array element a leaf context applies to; full
//! query evaluation for filtering rows is the Row Store collaborator's
//! job (spec.md §1).

use crate::bson::compare::{compare, Ordering3};
use crate::bson::{Document, Value};

/// A single-field comparison predicate compiled from a `{field: {$op:
/// value}}` or `{field: value}` query document.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchPredicate {
    clauses: Vec<FieldClause>,
}

#[derive(Clone, Debug, PartialEq)]
struct FieldClause {
    field: String,
    op: CompareOp,
    operand: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl MatchPredicate {
    /// Compile a query document of the shape `{field: value}` or
    /// `{field: {$gte: value, ...}}`. Fields not recognized as one of the
    /// comparison operators are ignored; this evaluator only needs to
    /// support the simple comparisons that drive $-positional and
    /// $elemMatch selection (spec.md Open Question notes the precedence
    /// between them needs a source-level test-suite comparison, which is
    /// out of scope for this crate's synthetic implementation).
    pub fn compile(query: &Document) -> Self {
        let mut clauses = Vec::new();
        for (field, value) in query.iter() {
            match value {
                Value::Document(ops) if is_operator_doc(ops) => {
                    for (op_name, operand) in ops.iter() {
                        if let Some(op) = CompareOp::from_name(op_name) {
                            clauses.push(FieldClause {
                                field: field.to_string(),
                                op,
                                operand: operand.clone(),
                            });
                        }
                    }
                }
                other => clauses.push(FieldClause {
                    field: field.to_string(),
                    op: CompareOp::Eq,
                    operand: other.clone(),
                }),
            }
        }
        Self { clauses }
    }

    /// Whether `doc` satisfies every compiled clause (conjunction).
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = doc.get(&clause.field);
            match actual {
                Some(actual) => clause.op.evaluate(actual, &clause.operand),
                None => false,
            }
        })
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.entries().iter().all(|(k, _)| k.starts_with('$'))
}

impl CompareOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$eq" => CompareOp::Eq,
            "$gt" => CompareOp::Gt,
            "$gte" => CompareOp::Gte,
            "$lt" => CompareOp::Lt,
            "$lte" => CompareOp::Lte,
            "$ne" => CompareOp::Ne,
            _ => return None,
        })
    }

    fn evaluate(self, actual: &Value, operand: &Value) -> bool {
        let ord = compare(actual, operand, None);
        match self {
            CompareOp::Eq => ord == Ordering3::Equal,
            CompareOp::Ne => ord != Ordering3::Equal,
            CompareOp::Gt => ord == Ordering3::Greater,
            CompareOp::Gte => ord != Ordering3::Less,
            CompareOp::Lt => ord == Ordering3::Less,
            CompareOp::Lte => ord != Ordering3::Greater,
        }
    }
}

/// Resolves, once per document, the index of the outermost array element
/// that a `$`-positional projection should select (spec.md §4.3
/// "$-positional evaluation"). Backed by the same query predicate used for
/// the find filter, so the positional operator and the filter agree on
/// which element matched.
pub struct QueryEvaluator {
    predicate: MatchPredicate,
    array_field: String,
}

impl QueryEvaluator {
    pub fn new(query: &Document, array_field: impl Into<String>) -> Self {
        Self {
            predicate: MatchPredicate::compile(query),
            array_field: array_field.into(),
        }
    }

    /// Find the index of the first element of `array` (located at
    /// `self.array_field` in `source`) that satisfies the compiled query.
    pub fn first_matching_index(&self, array: &[Value]) -> Option<usize> {
        array.iter().position(|item| match item {
            Value::Document(d) => self.predicate.matches(d),
            other => {
                // Scalar arrays are matched by wrapping the element under
                // the array field's own name, mirroring how the filter
                // compares `grades: {$gte: 90}` against a bare-scalar
                // array.
                let mut wrapper = Document::new();
                wrapper.append(self.array_field.clone(), other.clone());
                self.predicate.matches(&wrapper)
            }
        })
    }
}
