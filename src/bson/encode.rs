//! Binary BSON encoding (spec.md §4.1 `write_to`).

use super::value::{Document, Timestamp, Value};

/// Append a value's wire encoding (tag + payload, no field name) to `out`.
/// Used both for top-level document encoding and for building values
/// destined for [`super::writer::DocumentWriter`].
pub fn encode_document(doc: &Document, out: &mut Vec<u8>) {
    let start = out.len();
    // Placeholder for the length prefix; patched once the body is known.
    out.extend_from_slice(&[0u8; 4]);
    for (key, value) in doc.iter() {
        encode_element(key, value, out);
    }
    out.push(0x00);
    patch_length(out, start);
}

fn encode_array(items: &[Value], out: &mut Vec<u8>) {
    let start = out.len();
    out.extend_from_slice(&[0u8; 4]);
    for (index, value) in items.iter().enumerate() {
        encode_element(&index.to_string(), value, out);
    }
    out.push(0x00);
    patch_length(out, start);
}

fn patch_length(out: &mut Vec<u8>, start: usize) {
    let len = (out.len() - start) as i32;
    out[start..start + 4].copy_from_slice(&len.to_le_bytes());
}

fn encode_cstring(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(s.as_bytes());
    out.push(0x00);
}

fn encode_string(s: &str, out: &mut Vec<u8>) {
    let bytes = s.as_bytes();
    let len = (bytes.len() + 1) as i32;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    out.push(0x00);
}

fn encode_element(key: &str, value: &Value, out: &mut Vec<u8>) {
    out.push(value.type_tag() as u8);
    encode_cstring(key, out);
    encode_value(value, out);
}

/// Encode just a value's payload (no leading type tag, no field name).
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::End => {}
        Value::Double(d) => out.extend_from_slice(&d.to_le_bytes()),
        Value::String(s) => encode_string(s, out),
        Value::Document(d) => encode_document(d, out),
        Value::Array(items) => encode_array(items, out),
        Value::Binary { subtype, data } => {
            out.extend_from_slice(&(data.len() as i32).to_le_bytes());
            out.push(*subtype);
            out.extend_from_slice(data);
        }
        Value::Undefined => {}
        Value::ObjectId(oid) => out.extend_from_slice(&oid.bytes()),
        Value::Boolean(b) => out.push(*b as u8),
        Value::DateTime(ms) => out.extend_from_slice(&ms.to_le_bytes()),
        Value::Null => {}
        Value::RegularExpression(re) => {
            encode_cstring(&re.pattern, out);
            encode_cstring(&re.flags, out);
        }
        Value::DbPointer { namespace, id } => {
            encode_string(namespace, out);
            out.extend_from_slice(&id.bytes());
        }
        Value::JavaScriptCode(code) => encode_string(code, out),
        Value::Symbol(s) => encode_string(s, out),
        Value::JavaScriptCodeWithScope { code, scope } => {
            let start = out.len();
            out.extend_from_slice(&[0u8; 4]);
            encode_string(code, out);
            encode_document(scope, out);
            patch_length(out, start);
        }
        Value::Int32(i) => out.extend_from_slice(&i.to_le_bytes()),
        Value::Timestamp(Timestamp { time, increment }) => {
            out.extend_from_slice(&(*increment as u32).to_le_bytes());
            out.extend_from_slice(&(*time as u32).to_le_bytes());
        }
        Value::Int64(i) => out.extend_from_slice(&i.to_le_bytes()),
        Value::Decimal128(bytes) => out.extend_from_slice(bytes),
        Value::MinKey | Value::MaxKey => {}
    }
}

/// Encode a document to a freshly allocated byte buffer.
pub fn encode(doc: &Document) -> Vec<u8> {
    let mut out = Vec::new();
    encode_document(doc, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::decode::decode;

    #[test]
    fn round_trips_a_simple_document() {
        let mut doc = Document::new();
        doc.append("a", 1i32);
        doc.append("b", "hello");
        doc.append("c", true);
        let bytes = encode(&doc);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, doc);
    }
}
