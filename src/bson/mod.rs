//! The BSON value model (spec.md §4.1): decode, iterate, compare, hash, and
//! re-encode BSON binary documents without copying bytes except when
//! constructing new values.

pub mod compare;
pub mod decode;
pub mod encode;
pub mod hash;
pub mod objectid;
pub mod value;
pub mod writer;

pub use compare::{compare, Collation, Ordering3};
pub use objectid::ObjectId;
pub use value::{Document, Timestamp, Value};
pub use writer::{ArrayWriter, DocumentWriter};
