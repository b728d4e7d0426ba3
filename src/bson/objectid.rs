//! A 12-byte opaque object-id value (spec.md §3.1).

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::error::{Error, ErrorKind, Result};

/// A 12-byte MongoDB-style object id: 4-byte seconds-since-epoch, 5-byte
/// random process identifier, 3-byte monotonic counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);

impl ObjectId {
    /// Generate a new object id using the current wall-clock time, a
    /// per-process random identifier, and a monotonic counter, matching the
    /// classic MongoDB object-id layout.
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());

        let mut process_id = [0u8; 5];
        rand::rng().fill_bytes(&mut process_id);
        bytes[4..9].copy_from_slice(&process_id);

        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);

        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parse the canonical 24-character lowercase hex representation.
    pub fn parse_str(s: &str) -> Result<Self> {
        if s.len() != 24 {
            return Err(ErrorKind::BadValue {
                message: format!("object id must be 24 hex characters, got {}", s.len()),
            }
            .into());
        }
        let decoded = hex::decode(s).map_err(|e| {
            Error::with_source(
                ErrorKind::BadValue {
                    message: "object id must be valid hex".to_string(),
                },
                InvalidHex(e.to_string()),
            )
        })?;
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&decoded);
        Ok(ObjectId(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct InvalidHex(String);

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

/// Serializes as its canonical 24-character hex string, matching `Display`.
impl serde::Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        ObjectId::parse_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let oid = ObjectId::new();
        let s = oid.to_string();
        let parsed = ObjectId::parse_str(&s).unwrap();
        assert_eq!(oid, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(ObjectId::parse_str("abc").is_err());
    }

    #[test]
    fn successive_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_its_hex_string() {
        let oid = ObjectId::new();
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, format!("\"{oid}\""));
        let decoded: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(oid, decoded);
    }
}
