//! The index access-method registry (spec.md §4.6): capability-driven
//! dispatch over alternate index implementations (regular, composite,
//! text, hashed, geospatial, vector), consumed by the pipeline compiler
//! for index selection and referenced by the Row Store for scans.

pub mod entry;
pub mod registry;
pub mod strategy;

pub use entry::{IndexAmEntry, IndexCapabilities, IndexClass, IndexPredicate, OpFamilyId};
pub use registry::{IndexAmRegistry, IndexOnlyScanSupport, MAX_ALTERNATE_AMS};
pub use strategy::IndexStrategy;
