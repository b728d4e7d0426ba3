//! Canonical hashing for BSON values (spec.md §4.1), used by hash indexes
//! and group-stage accumulators. Must agree with [`super::compare::compare`]
//! so that `compare == equal` implies `hash == equal`.

use std::hash::{Hash, Hasher};

use super::value::{Document, Value};

/// A `std::hash::Hasher` bound to MongoDB-compatible canonicalization
/// rules: numeric values of different tags that compare equal (e.g. `5`
/// and `5.0`) must hash identically, so every numeric value is first
/// canonicalized to its mathematical value before being fed to the
/// underlying hasher.
pub struct BsonHasher(std::collections::hash_map::DefaultHasher);

impl Default for BsonHasher {
    fn default() -> Self {
        Self(std::collections::hash_map::DefaultHasher::new())
    }
}

impl BsonHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish_i64(&self) -> i64 {
        self.0.finish() as i64
    }
}

/// Canonical hash of a value, agreeing with `compare` (spec.md §4.1).
pub fn hash(value: &Value) -> i64 {
    let mut hasher = BsonHasher::new();
    hash_into(value, &mut hasher.0);
    hasher.finish_i64()
}

fn hash_into(value: &Value, hasher: &mut impl Hasher) {
    value.type_rank_for_hash().hash(hasher);
    match value {
        Value::Double(_) | Value::Int32(_) | Value::Int64(_) => {
            // Canonicalize to the mathematical value: an integral f64 and
            // the matching i64 must hash identically, since `compare`
            // treats them as equal.
            if let Some(f) = value.as_f64_lossy() {
                if f.is_nan() {
                    // All NaNs compare equal to each other; hash them to a
                    // single canonical bit pattern rather than their raw
                    // (possibly distinct) payload bits.
                    0xdead_beefu64.hash(hasher);
                } else if f == f.trunc() && f.abs() < i64::MAX as f64 {
                    (f as i64).hash(hasher);
                } else {
                    f.to_bits().hash(hasher);
                }
            }
        }
        Value::Decimal128(bytes) => bytes.hash(hasher),
        Value::String(s) | Value::Symbol(s) | Value::JavaScriptCode(s) => s.hash(hasher),
        Value::Document(doc) => hash_document(doc, hasher),
        Value::Array(items) => {
            for item in items {
                hash_into(item, hasher);
            }
        }
        Value::Binary { subtype, data } => {
            subtype.hash(hasher);
            data.hash(hasher);
        }
        Value::ObjectId(oid) => oid.bytes().hash(hasher),
        Value::Boolean(b) => b.hash(hasher),
        Value::DateTime(ms) => ms.hash(hasher),
        Value::Timestamp(ts) => {
            ts.time.hash(hasher);
            ts.increment.hash(hasher);
        }
        Value::RegularExpression(re) => {
            re.pattern.hash(hasher);
            re.flags.hash(hasher);
        }
        Value::DbPointer { namespace, id } => {
            namespace.hash(hasher);
            id.bytes().hash(hasher);
        }
        Value::JavaScriptCodeWithScope { code, scope } => {
            code.hash(hasher);
            hash_document(scope, hasher);
        }
        Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey | Value::End => {}
    }
}

fn hash_document(doc: &Document, hasher: &mut impl Hasher) {
    for (key, val) in doc.iter() {
        key.hash(hasher);
        hash_into(val, hasher);
    }
}

impl Value {
    /// Groups numeric tags into a single hash-type bucket so that `5` and
    /// `5.0` land in the same bucket before the canonicalized value itself
    /// is hashed.
    fn type_rank_for_hash(&self) -> u8 {
        if self.is_numeric() {
            0
        } else {
            self.type_tag() as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_numbers_of_different_tags_hash_equal() {
        assert_eq!(hash(&Value::Int32(5)), hash(&Value::Double(5.0)));
        assert_eq!(hash(&Value::Int64(5)), hash(&Value::Double(5.0)));
    }

    #[test]
    fn nan_hashes_canonically() {
        assert_eq!(
            hash(&Value::Double(f64::NAN)),
            hash(&Value::Double(-f64::NAN))
        );
    }

    #[test]
    fn document_field_order_affects_hash() {
        let mut a = Document::new();
        a.append("x", 1i32);
        a.append("y", 2i32);
        let mut b = Document::new();
        b.append("y", 2i32);
        b.append("x", 1i32);
        assert_ne!(hash(&Value::Document(a)), hash(&Value::Document(b)));
    }

    #[test]
    fn distinct_strings_usually_hash_differently() {
        assert_ne!(
            hash(&Value::String("a".into())),
            hash(&Value::String("b".into()))
        );
    }
}
