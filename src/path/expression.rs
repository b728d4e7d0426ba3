//! A minimal compiled-expression representation for `Field` and
//! `LeafFieldWithContext` leaves (spec.md §4.2 step 2c). This is
//! intentionally small: the aggregation *expression language* itself
//! (`$add`, `$cond`, ...) is an external concern of the relational
//! substrate's optimizer once a query tree is emitted (spec.md §1
//! Non-goals: "implementing a relational optimizer"); what the path tree
//! and projection engine need is just enough structure to (a) recognize a
//! field reference vs. a literal vs. an operator call, and (b) evaluate
//! the handful of cases spec.md's own operator vocabulary ($, $elemMatch,
//! $slice, $meta) and variable substitution ($$NOW, $$CLUSTER_TIME)
//! require.

use crate::bson::Value;

/// A compiled expression tree, as produced by [`super::build::build_tree`]
/// when a leaf's spec value is an operator document or a literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// A literal document/array/scalar, reproduced verbatim in the output.
    Literal(Value),
    /// A `"$field.path"` reference into the source document.
    FieldPath(String),
    /// A `"$$name"` reference into the variable context (spec.md §4.3
    /// Variables), e.g. `$$NOW`, `$$CLUSTER_TIME`, or a `$let` binding.
    Variable(String),
    /// An operator call, e.g. `{"$toUpper": "$name"}`.
    Operator { name: String, args: Vec<Expression> },
}

impl Expression {
    /// Parse a BSON value into an expression tree (spec.md §4.2 step 2c:
    /// "operator document ... → Field with compiled expression OR literal
    /// document/array/scalar → Field with constant expression").
    pub fn compile(value: &Value) -> Expression {
        match value {
            Value::String(s) if s.starts_with("$$") => Expression::Variable(s[2..].to_string()),
            Value::String(s) if s.starts_with('$') => Expression::FieldPath(s[1..].to_string()),
            Value::Document(doc) if is_operator_document(doc) => {
                let (name, arg) = doc
                    .entries()
                    .first()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .expect("is_operator_document guarantees at least one entry");
                let args = match &arg {
                    Value::Array(items) => items.iter().map(Expression::compile).collect(),
                    other => vec![Expression::compile(other)],
                };
                Expression::Operator { name, args }
            }
            other => Expression::Literal(other.clone()),
        }
    }
}

fn is_operator_document(doc: &crate::bson::Document) -> bool {
    doc.first_key().map(|k| k.starts_with('$')).unwrap_or(false) && doc.len() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Document;

    #[test]
    fn compiles_field_path() {
        assert_eq!(
            Expression::compile(&Value::String("$a.b".to_string())),
            Expression::FieldPath("a.b".to_string())
        );
    }

    #[test]
    fn compiles_variable_reference() {
        assert_eq!(
            Expression::compile(&Value::String("$$NOW".to_string())),
            Expression::Variable("NOW".to_string())
        );
    }

    #[test]
    fn compiles_operator_call() {
        let mut doc = Document::new();
        doc.append("$toUpper", "$name");
        let compiled = Expression::compile(&Value::Document(doc));
        assert_eq!(
            compiled,
            Expression::Operator {
                name: "$toUpper".to_string(),
                args: vec![Expression::FieldPath("name".to_string())],
            }
        );
    }

    #[test]
    fn literal_document_with_multiple_keys_is_not_an_operator() {
        let mut doc = Document::new();
        doc.append("a", 1i32);
        doc.append("b", 2i32);
        let compiled = Expression::compile(&Value::Document(doc.clone()));
        assert_eq!(compiled, Expression::Literal(Value::Document(doc)));
    }
}
