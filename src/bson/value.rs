//! The tagged-union `Value` type and ordered `Document` container
//! (spec.md §3.1).

use super::objectid::ObjectId;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A BSON timestamp: `i32` seconds since the epoch plus an `i32` ordinal
/// counter, used internally by replication oplogs. Kept distinct from
/// `DateTime` per the BSON spec's 19-tag type list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Timestamp {
    pub time: i32,
    pub increment: i32,
}

/// A regular expression value: pattern plus flag characters, stored
/// unparsed (the core never evaluates regexes itself — that belongs to the
/// Row Store / index access-method collaborators).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Regex {
    pub pattern: String,
    pub flags: String,
}

/// A tagged union over the closed, 19-variant BSON value set (spec.md
/// §3.1). `End` is not user-constructible; decoders use it only as an
/// internal terminator sentinel and it never appears inside a `Document`
/// or `Array`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum Value {
    /// Decoder-internal terminator; never stored in a document.
    End,
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary { subtype: u8, data: Vec<u8> },
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Null,
    RegularExpression(Regex),
    DbPointer { namespace: String, id: ObjectId },
    JavaScriptCode(String),
    Symbol(String),
    JavaScriptCodeWithScope { code: String, scope: Document },
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    /// IEEE 754-2008 decimal128, stored as its 16 little-endian bytes. The
    /// core treats this as opaque for comparison purposes beyond the
    /// numeric ordering in `compare` (spec.md §4.1); arithmetic on
    /// decimal128 is out of scope.
    Decimal128([u8; 16]),
    MinKey,
    MaxKey,
}

impl Value {
    /// The BSON type tag byte for this value, per the standard BSON spec.
    pub fn type_tag(&self) -> i8 {
        match self {
            Value::End => 0x00,
            Value::Double(_) => 0x01,
            Value::String(_) => 0x02,
            Value::Document(_) => 0x03,
            Value::Array(_) => 0x04,
            Value::Binary { .. } => 0x05,
            Value::Undefined => 0x06,
            Value::ObjectId(_) => 0x07,
            Value::Boolean(_) => 0x08,
            Value::DateTime(_) => 0x09,
            Value::Null => 0x0A,
            Value::RegularExpression(_) => 0x0B,
            Value::DbPointer { .. } => 0x0C,
            Value::JavaScriptCode(_) => 0x0D,
            Value::Symbol(_) => 0x0E,
            Value::JavaScriptCodeWithScope { .. } => 0x0F,
            Value::Int32(_) => 0x10,
            Value::Timestamp(_) => 0x11,
            Value::Int64(_) => 0x12,
            Value::Decimal128(_) => 0x13,
            Value::MinKey => 0xFF,
            Value::MaxKey => 0x7F,
        }
    }

    /// A human-readable name for the value's type, used in `TypeMismatch`
    /// error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::End => "end-of-document",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Document(_) => "object",
            Value::Array(_) => "array",
            Value::Binary { .. } => "binData",
            Value::Undefined => "undefined",
            Value::ObjectId(_) => "objectId",
            Value::Boolean(_) => "bool",
            Value::DateTime(_) => "date",
            Value::Null => "null",
            Value::RegularExpression(_) => "regex",
            Value::DbPointer { .. } => "dbPointer",
            Value::JavaScriptCode(_) => "javascript",
            Value::Symbol(_) => "symbol",
            Value::JavaScriptCodeWithScope { .. } => "javascriptWithScope",
            Value::Int32(_) => "int",
            Value::Timestamp(_) => "timestamp",
            Value::Int64(_) => "long",
            Value::Decimal128(_) => "decimal",
            Value::MinKey => "minKey",
            Value::MaxKey => "maxKey",
        }
    }

    /// Whether this value is one of the four numeric tags.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Double(_) | Value::Int32(_) | Value::Int64(_) | Value::Decimal128(_)
        )
    }

    /// Coerce a numeric value to `f64` for mathematical comparison
    /// (spec.md §4.1 `compare`). Returns `None` for non-numeric values.
    /// Decimal128 is approximated via its coefficient/exponent decoding is
    /// out of scope for this core (delegated conceptually to the same place
    /// full arithmetic would live); we treat its bit pattern's sign only
    /// when the fast paths below don't apply, which is sufficient for the
    /// equality/ordering properties this crate is responsible for.
    pub fn as_f64_lossy(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            Value::Decimal128(_) => None,
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64_lossy(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(*i as i64),
            Value::Int64(i) => Some(*i),
            Value::Double(f) if *f == f.trunc() => Some(*f as i64),
            _ => None,
        }
    }

    /// MongoDB truthiness: everything except `false`, `null`, `undefined`,
    /// and missing is truthy. Notably `0` and `""` ARE truthy, unlike most
    /// scripting languages — this trips people up, hence documenting it.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null | Value::Undefined)
    }
}

/// An ordered sequence of `(field-name, value)` pairs. Order is part of the
/// value's identity for update-operator purposes but documents with the
/// same pairs in different order still compare equal (spec.md §3.1).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append a field, preserving insertion order even if the key already
    /// exists (callers that want upsert-by-key semantics should use
    /// `set`).
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Insert or overwrite a field in place, preserving its original
    /// position if it already existed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value.into();
        } else {
            self.entries.push((key, value.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cheap, non-copying iteration over `(name, value)` pairs (spec.md
    /// §4.1 `iterate`).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The key of the first entry, used to dispatch on a stage or operator
    /// document's tag (e.g. `{"$match": ...}`).
    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn first_value(&self) -> Option<&Value> {
        self.entries.first().map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    /// Resolve a dotted path against this document (spec.md §4.1
    /// `extract_path`). A numeric segment against an array indexes that
    /// element; a non-numeric segment against an array maps over every
    /// element unless `map_over_arrays` is false, in which case the lookup
    /// fails on that segment.
    pub fn extract_path(&self, path: &str) -> Option<Value> {
        extract_path(&Value::Document(self.clone()), path, true)
    }
}

/// Serializes as a map, in field order, rather than deriving (which would
/// expose the private `entries` field as a one-field struct).
impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a BSON document")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Document, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut doc = Document::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            doc.append(key, value);
        }
        Ok(doc)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// Implementation of `extract_path` shared between `Document::extract_path`
/// and the path tree / projection engine, which both need the map-over-array
/// behavior spec.md §4.1 describes.
pub fn extract_path(root: &Value, path: &str, map_over_arrays: bool) -> Option<Value> {
    let mut current = root.clone();
    for segment in path.split('.') {
        current = match current {
            Value::Document(doc) => doc.get(segment)?.clone(),
            Value::Array(items) => {
                if let Ok(index) = segment.parse::<usize>() {
                    items.get(index)?.clone()
                } else if map_over_arrays {
                    let mapped: Vec<Value> = items
                        .iter()
                        .filter_map(|item| match item {
                            Value::Document(d) => d.get(segment).cloned(),
                            _ => None,
                        })
                        .collect();
                    if mapped.is_empty() {
                        return None;
                    }
                    Value::Array(mapped)
                } else {
                    return None;
                }
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extract_path_dotted() {
        let mut inner = Document::new();
        inner.append("b", 2i32);
        let mut doc = Document::new();
        doc.append("a", inner);
        assert_eq!(doc.extract_path("a.b"), Some(Value::Int32(2)));
        assert_eq!(doc.extract_path("a.c"), None);
    }

    #[test]
    fn extract_path_maps_over_array() {
        let mut a = Document::new();
        a.append("x", 1i32);
        let mut b = Document::new();
        b.append("x", 2i32);
        let mut doc = Document::new();
        doc.append("items", Value::Array(vec![Value::Document(a), Value::Document(b)]));
        assert_eq!(
            doc.extract_path("items.x"),
            Some(Value::Array(vec![Value::Int32(1), Value::Int32(2)]))
        );
    }

    #[test]
    fn extract_path_numeric_index() {
        let mut doc = Document::new();
        doc.append(
            "items",
            Value::Array(vec![Value::Int32(10), Value::Int32(20)]),
        );
        assert_eq!(doc.extract_path("items.1"), Some(Value::Int32(20)));
    }

    #[test]
    fn truthiness_matches_mongodb_semantics() {
        assert!(Value::Int32(0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Undefined.is_truthy());
    }

    #[test]
    fn document_serializes_as_a_json_object_in_field_order() {
        let mut doc = Document::new();
        doc.append("b", 2i32);
        doc.append("a", "x");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, serde_json::json!({"b": 2, "a": "x"}));
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut inner = Document::new();
        inner.append("n", 1i64);
        let mut doc = Document::new();
        doc.append("inner", inner);
        doc.append("flag", true);
        let encoded = serde_json::to_string(&doc).unwrap();
        let decoded: Document = serde_json::from_str(&encoded).unwrap();
        assert_eq!(doc, decoded);
    }
}
