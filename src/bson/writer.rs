//! Builders for constructing new BSON values (spec.md §4.1): a document
//! writer and an array writer, both supporting nested start/end and cheap
//! appends of raw sub-documents by value copy (used by the projection
//! engine to avoid re-walking unchanged subtrees).

use super::value::{Document, Value};

/// Appends `(name, value)` pairs into an in-progress [`Document`]. Distinct
/// from directly mutating a `Document` only in spirit (this crate's
/// `Document` is cheap to build directly) — kept as its own type because
/// the projection engine's pending-projection machinery (spec.md §4.3)
/// needs to stage writes before committing them at the right output
/// position, and giving that staging area the same shape as the final
/// writer keeps the two code paths uniform.
#[derive(Debug, Default)]
pub struct DocumentWriter {
    doc: Document,
}

impl DocumentWriter {
    pub fn new() -> Self {
        Self { doc: Document::new() }
    }

    /// Append a field by value.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.doc.append(name, value);
        self
    }

    /// Append a sub-document by copying it wholesale rather than
    /// traversing it field-by-field — the cheap path spec.md §4.1's
    /// builders exist for.
    pub fn append_raw_document(&mut self, name: impl Into<String>, doc: Document) -> &mut Self {
        self.doc.append(name, Value::Document(doc));
        self
    }

    pub fn start_document(&mut self, name: impl Into<String>) -> NestedDocumentWriter<'_> {
        NestedDocumentWriter {
            parent: self,
            name: Some(name.into()),
            nested: DocumentWriter::new(),
        }
    }

    pub fn start_array(&mut self, name: impl Into<String>) -> NestedArrayWriter<'_> {
        NestedArrayWriter {
            parent: self,
            name: Some(name.into()),
            nested: ArrayWriter::new(),
        }
    }

    pub fn finish(self) -> Document {
        self.doc
    }
}

/// A document writer borrowed from a parent writer, committed to the
/// parent on [`NestedDocumentWriter::end`] (or on drop).
pub struct NestedDocumentWriter<'a> {
    parent: &'a mut DocumentWriter,
    name: Option<String>,
    nested: DocumentWriter,
}

impl NestedDocumentWriter<'_> {
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.nested.append(name, value);
        self
    }

    pub fn end(mut self) {
        let name = self.name.take().expect("end called twice");
        let doc = std::mem::take(&mut self.nested).finish();
        self.parent.append(name, doc);
    }
}

impl Drop for NestedDocumentWriter<'_> {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            let doc = std::mem::take(&mut self.nested).finish();
            self.parent.append(name, doc);
        }
    }
}

/// Appends values into an in-progress BSON array.
#[derive(Debug, Default)]
pub struct ArrayWriter {
    items: Vec<Value>,
}

impl ArrayWriter {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.items.push(value.into());
        self
    }

    pub fn push_raw_document(&mut self, doc: Document) -> &mut Self {
        self.items.push(Value::Document(doc));
        self
    }

    pub fn finish(self) -> Vec<Value> {
        self.items
    }
}

pub struct NestedArrayWriter<'a> {
    parent: &'a mut DocumentWriter,
    name: Option<String>,
    nested: ArrayWriter,
}

impl NestedArrayWriter<'_> {
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.nested.push(value);
        self
    }

    pub fn end(mut self) {
        let name = self.name.take().expect("end called twice");
        let items = std::mem::take(&mut self.nested).finish();
        self.parent.append(name, Value::Array(items));
    }
}

impl Drop for NestedArrayWriter<'_> {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            let items = std::mem::take(&mut self.nested).finish();
            self.parent.append(name, Value::Array(items));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_documents() {
        let mut w = DocumentWriter::new();
        w.append("a", 1i32);
        {
            let mut nested = w.start_document("b");
            nested.append("c", "x");
        }
        let doc = w.finish();
        assert_eq!(doc.get("a"), Some(&Value::Int32(1)));
        assert_eq!(
            doc.get("b").and_then(Value::as_document).and_then(|d| d.get("c")),
            Some(&Value::String("x".to_string()))
        );
    }

    #[test]
    fn builds_arrays() {
        let mut w = DocumentWriter::new();
        {
            let mut arr = w.start_array("items");
            arr.push(1i32);
            arr.push(2i32);
        }
        let doc = w.finish();
        assert_eq!(
            doc.get("items").and_then(Value::as_array),
            Some(&[Value::Int32(1), Value::Int32(2)][..])
        );
    }
}
