//! `docdb-core`: the document-database engine core that makes MongoDB-
//! compatible document storage and querying possible on top of a
//! relational storage substrate.
//!
//! This crate covers the four subsystems where the hard design decisions
//! live:
//!
//! - [`bson`]: the BSON value model — decode, iterate, compare, hash, and
//!   re-encode binary documents.
//! - [`path`] and [`projection`]: the path tree and the projection engine
//!   that walks it to rewrite documents, including the positional
//!   operator, `$elemMatch`, and `$slice`.
//! - [`pipeline`]: the aggregation pipeline compiler, translating a
//!   sequence of stages into a [`pipeline::QueryTree`] with stage fusion
//!   and subquery injection.
//! - [`cursor`]: the cursor/pagination subsystem — streamable, single-
//!   batch, point-read, tailable, and persistent cursors.
//! - [`index`]: the index access-method dispatch registry.
//!
//! The relational storage substrate, the wire-protocol gateway, and
//! distributed execution are external collaborators this crate calls
//! through [`rowstore`], [`protocol`], and [`coordinator`] respectively,
//! rather than redesigning them.

pub mod bson;
pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod index;
pub mod path;
pub mod pipeline;
pub mod projection;
pub mod protocol;
pub mod rowstore;
#[cfg(feature = "tracing-unstable")]
pub mod trace;

pub use config::EngineConfig;
pub use error::{Error, ErrorKind, Result};
