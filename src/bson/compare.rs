//! Canonical BSON comparison (spec.md §3.1, §4.1).

use std::cmp::Ordering;

use super::value::{Document, Value};

/// A three-way comparison result. Distinct from [`std::cmp::Ordering`] only
/// in name, kept as its own type because spec.md §4.1 specifies the
/// operation as returning `{less, equal, greater}` rather than assuming
/// `Ord`; `Value` cannot soundly implement `Ord` itself (NaN), so callers
/// that need `Ord`-shaped APIs (sort keys, BTree-backed indexes) go through
/// this explicit function instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ordering3 {
    Less,
    Equal,
    Greater,
}

impl From<Ordering3> for Ordering {
    fn from(o: Ordering3) -> Self {
        match o {
            Ordering3::Less => Ordering::Less,
            Ordering3::Equal => Ordering::Equal,
            Ordering3::Greater => Ordering::Greater,
        }
    }
}

/// A collation descriptor. The core does not implement ICU collation
/// itself (spec.md §1 delegates locale-aware comparison to an external
/// collaborator); `Collation::compare_strings` is the seam a future
/// collation provider plugs into. With `None`, string comparison falls
/// back to byte-lexicographic order on UTF-8, per spec.md §4.1.
pub trait Collation: Send + Sync {
    fn compare_strings(&self, a: &str, b: &str) -> Ordering3;
}

/// Canonical MongoDB-style type rank used to order values of differing
/// BSON types (spec.md §3.1): minkey < null < numbers < string < document <
/// array < binary < objectid < bool < date < timestamp < regex < maxkey.
/// Legacy/rare types (undefined, dbpointer, javascript, symbol,
/// javascript-with-scope) are ranked alongside their closest modern
/// analogue so the ordering stays total without spec.md needing to name
/// them explicitly.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::MinKey => 0,
        Value::Undefined => 1,
        Value::Null => 2,
        Value::Double(_) | Value::Int32(_) | Value::Int64(_) | Value::Decimal128(_) => 3,
        Value::String(_) | Value::Symbol(_) => 4,
        Value::Document(_) => 5,
        Value::Array(_) => 6,
        Value::Binary { .. } => 7,
        Value::ObjectId(_) => 8,
        Value::Boolean(_) => 9,
        Value::DateTime(_) => 10,
        Value::Timestamp(_) => 11,
        Value::RegularExpression(_) => 12,
        Value::JavaScriptCode(_) | Value::JavaScriptCodeWithScope { .. } => 13,
        Value::DbPointer { .. } => 14,
        Value::MaxKey => 15,
        Value::End => u8::MAX,
    }
}

/// Compare two BSON values following the canonical type-order plus
/// per-type ordering described in spec.md §4.1. Numbers of differing tags
/// compare by mathematical value; NaN compares less than all numbers and
/// equal to other NaN. Strings use the provided collation if given,
/// otherwise byte-lexicographic order on UTF-8.
pub fn compare(a: &Value, b: &Value, collation: Option<&dyn Collation>) -> Ordering3 {
    if a.is_numeric() && b.is_numeric() {
        return compare_numeric(a, b);
    }

    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return if ra < rb {
            Ordering3::Less
        } else {
            Ordering3::Greater
        };
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) | (Value::Symbol(x), Value::Symbol(y)) => {
            match collation {
                Some(c) => c.compare_strings(x, y),
                None => from_std(x.as_bytes().cmp(y.as_bytes())),
            }
        }
        (Value::Document(x), Value::Document(y)) => compare_documents(x, y, collation),
        (Value::Array(x), Value::Array(y)) => compare_sequences(x, y, collation),
        (Value::Binary { subtype: st, data: x }, Value::Binary { subtype: sb, data: y }) => {
            from_std(x.len().cmp(&y.len()).then(st.cmp(sb)).then(x.cmp(y)))
        }
        (Value::ObjectId(x), Value::ObjectId(y)) => from_std(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => from_std(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => from_std(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => from_std(x.cmp(y)),
        (Value::RegularExpression(x), Value::RegularExpression(y)) => from_std(
            x.pattern
                .cmp(&y.pattern)
                .then_with(|| x.flags.cmp(&y.flags)),
        ),
        _ => Ordering3::Equal,
    }
}

fn compare_numeric(a: &Value, b: &Value) -> Ordering3 {
    let (fa, fb) = (a.as_f64_lossy(), b.as_f64_lossy());
    match (fa, fb) {
        (Some(x), Some(y)) => {
            if x.is_nan() && y.is_nan() {
                Ordering3::Equal
            } else if x.is_nan() {
                Ordering3::Less
            } else if y.is_nan() {
                Ordering3::Greater
            } else if x < y {
                Ordering3::Less
            } else if x > y {
                Ordering3::Greater
            } else {
                Ordering3::Equal
            }
        }
        // Decimal128 operands fall back to treating unparsed values as
        // equal; full decimal128 arithmetic is out of scope (spec.md §1).
        _ => Ordering3::Equal,
    }
}

fn compare_documents(a: &Document, b: &Document, collation: Option<&dyn Collation>) -> Ordering3 {
    let mut ai = a.iter();
    let mut bi = b.iter();
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering3::Equal,
            (None, Some(_)) => return Ordering3::Less,
            (Some(_), None) => return Ordering3::Greater,
            (Some((ak, av)), Some((bk, bv))) => {
                let key_cmp = from_std(ak.as_bytes().cmp(bk.as_bytes()));
                if key_cmp != Ordering3::Equal {
                    return key_cmp;
                }
                let val_cmp = compare(av, bv, collation);
                if val_cmp != Ordering3::Equal {
                    return val_cmp;
                }
            }
        }
    }
}

fn compare_sequences(a: &[Value], b: &[Value], collation: Option<&dyn Collation>) -> Ordering3 {
    let mut ai = a.iter();
    let mut bi = b.iter();
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering3::Equal,
            (None, Some(_)) => return Ordering3::Less,
            (Some(_), None) => return Ordering3::Greater,
            (Some(av), Some(bv)) => {
                let val_cmp = compare(av, bv, collation);
                if val_cmp != Ordering3::Equal {
                    return val_cmp;
                }
            }
        }
    }
}

fn from_std(o: Ordering) -> Ordering3 {
    match o {
        Ordering::Less => Ordering3::Less,
        Ordering::Equal => Ordering3::Equal,
        Ordering::Greater => Ordering3::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cross_type_compares_mathematically() {
        assert_eq!(
            compare(&Value::Int32(5), &Value::Double(5.0), None),
            Ordering3::Equal
        );
        assert_eq!(
            compare(&Value::Int64(3), &Value::Double(3.5), None),
            Ordering3::Less
        );
    }

    #[test]
    fn nan_compares_less_than_numbers_and_equal_to_nan() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(compare(&nan, &Value::Int32(0), None), Ordering3::Less);
        assert_eq!(compare(&nan, &nan, None), Ordering3::Equal);
    }

    #[test]
    fn type_order_is_canonical() {
        assert_eq!(compare(&Value::Null, &Value::Int32(0), None), Ordering3::Less);
        assert_eq!(
            compare(&Value::Int32(0), &Value::String("".to_string()), None),
            Ordering3::Less
        );
        assert_eq!(
            compare(&Value::MaxKey, &Value::RegularExpression(super::super::value::Regex { pattern: "a".into(), flags: String::new() }), None),
            Ordering3::Greater
        );
        assert_eq!(compare(&Value::MinKey, &Value::Null, None), Ordering3::Less);
    }

    #[test]
    fn documents_compare_field_by_field_in_order() {
        let mut a = Document::new();
        a.append("x", 1i32);
        let mut b = Document::new();
        b.append("x", 2i32);
        assert_eq!(
            compare(&Value::Document(a), &Value::Document(b), None),
            Ordering3::Less
        );
    }

    #[test]
    fn compare_is_antisymmetric() {
        let a = Value::Int32(3);
        let b = Value::Int32(7);
        let ab = compare(&a, &b, None);
        let ba = compare(&b, &a, None);
        assert_eq!(ab, Ordering3::Less);
        assert_eq!(ba, Ordering3::Greater);
    }
}
