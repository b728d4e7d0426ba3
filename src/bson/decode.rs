//! Binary BSON decoding (spec.md §4.1 `decode`). Every decode path rejects
//! malformed encodings with a structured `MalformedEncoding` error carrying
//! an offset; this layer never panics on untrusted input.

use super::objectid::ObjectId;
use super::value::{Document, Timestamp, Value};
use crate::error::{Error, ErrorKind, Result};

/// The maximum document nesting depth a decoder will follow before
/// rejecting the input as malformed, bounding recursion (spec.md §3.1
/// invariant). Intentionally generous relative to the path-tree depth
/// limit (§8) since a document may legitimately nest deeper than any
/// single projection path does.
pub const DEFAULT_MAX_DECODE_DEPTH: u32 = 200;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    max_depth: u32,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], max_depth: u32) -> Self {
        Self { bytes, pos: 0, max_depth }
    }

    fn err(&self, message: impl Into<String>) -> Error {
        ErrorKind::MalformedEncoding {
            offset: self.pos,
            message: message.into(),
        }
        .into()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(self.err(format!("expected {} more bytes, found {}", n, self.bytes.len() - self.pos)));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes(b.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    fn read_cstring(&mut self) -> Result<String> {
        let start = self.pos;
        let nul = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.err("unterminated cstring"))?;
        let s = std::str::from_utf8(&self.bytes[start..start + nul])
            .map_err(|_| self.err("cstring is not valid UTF-8"))?
            .to_string();
        self.pos = start + nul + 1;
        Ok(s)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len <= 0 {
            return Err(self.err("string length must be positive"));
        }
        let bytes = self.take(len as usize)?;
        if bytes.last() != Some(&0) {
            return Err(self.err("string is not null-terminated"));
        }
        std::str::from_utf8(&bytes[..bytes.len() - 1])
            .map(str::to_string)
            .map_err(|_| self.err("string is not valid UTF-8"))
    }

    fn read_document(&mut self, depth: u32) -> Result<Document> {
        if depth > self.max_depth {
            return Err(self.err(format!(
                "document nesting exceeds max depth {}",
                self.max_depth
            )));
        }
        let start = self.pos;
        let declared_len = self.read_i32()?;
        if declared_len < 5 {
            return Err(self.err("document length must be at least 5"));
        }
        let end = start + declared_len as usize;
        if end > self.bytes.len() {
            return Err(self.err("document length exceeds buffer"));
        }

        let mut doc = Document::new();
        loop {
            if self.pos >= end {
                return Err(self.err("document missing terminator"));
            }
            let tag = self.read_u8()?;
            if tag == 0x00 {
                break;
            }
            let name = self.read_cstring()?;
            let value = self.read_value(tag, depth + 1)?;
            doc.append(name, value);
        }
        if self.pos != end {
            return Err(self.err("document length does not match encoded content"));
        }
        Ok(doc)
    }

    fn read_array(&mut self, depth: u32) -> Result<Vec<Value>> {
        let doc = self.read_document(depth)?;
        Ok(doc.entries().iter().map(|(_, v)| v.clone()).collect())
    }

    fn read_value(&mut self, tag: u8, depth: u32) -> Result<Value> {
        Ok(match tag {
            0x01 => Value::Double(self.read_f64()?),
            0x02 => Value::String(self.read_string()?),
            0x03 => Value::Document(self.read_document(depth)?),
            0x04 => Value::Array(self.read_array(depth)?),
            0x05 => {
                let len = self.read_i32()?;
                if len < 0 {
                    return Err(self.err("binary length must not be negative"));
                }
                let subtype = self.read_u8()?;
                let data = self.take(len as usize)?.to_vec();
                Value::Binary { subtype, data }
            }
            0x06 => Value::Undefined,
            0x07 => {
                let mut bytes = [0u8; 12];
                bytes.copy_from_slice(self.take(12)?);
                Value::ObjectId(ObjectId::from_bytes(bytes))
            }
            0x08 => {
                let b = self.read_u8()?;
                if b > 1 {
                    return Err(self.err("boolean must be 0 or 1"));
                }
                Value::Boolean(b == 1)
            }
            0x09 => Value::DateTime(self.read_i64()?),
            0x0A => Value::Null,
            0x0B => {
                let pattern = self.read_cstring()?;
                let flags = self.read_cstring()?;
                Value::RegularExpression(super::value::Regex { pattern, flags })
            }
            0x0C => {
                let namespace = self.read_string()?;
                let mut bytes = [0u8; 12];
                bytes.copy_from_slice(self.take(12)?);
                Value::DbPointer {
                    namespace,
                    id: ObjectId::from_bytes(bytes),
                }
            }
            0x0D => Value::JavaScriptCode(self.read_string()?),
            0x0E => Value::Symbol(self.read_string()?),
            0x0F => {
                let _total_len = self.read_i32()?;
                let code = self.read_string()?;
                let scope = self.read_document(depth + 1)?;
                Value::JavaScriptCodeWithScope { code, scope }
            }
            0x10 => Value::Int32(self.read_i32()?),
            0x11 => {
                let increment = self.read_u32()? as i32;
                let time = self.read_u32()? as i32;
                Value::Timestamp(Timestamp { time, increment })
            }
            0x12 => Value::Int64(self.read_i64()?),
            0x13 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(self.take(16)?);
                Value::Decimal128(bytes)
            }
            0xFF => Value::MinKey,
            0x7F => Value::MaxKey,
            other => return Err(self.err(format!("unknown BSON type tag 0x{:02X}", other))),
        })
    }
}

/// Decode a single top-level BSON document from `bytes` using the default
/// recursion bound.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    decode_with_max_depth(bytes, DEFAULT_MAX_DECODE_DEPTH)
}

/// Decode a single top-level BSON document, rejecting nesting deeper than
/// `max_depth` with `MalformedEncoding` (spec.md §3.1 invariant).
pub fn decode_with_max_depth(bytes: &[u8], max_depth: u32) -> Result<Document> {
    let mut reader = Reader::new(bytes, max_depth);
    let doc = reader.read_document(0)?;
    if reader.pos != bytes.len() {
        return Err(reader.err("trailing bytes after document"));
    }
    Ok(doc)
}
