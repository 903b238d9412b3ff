//! # Domain Module
//!
//! Core domain types for shard routing: records, descriptors, topology,
//! errors and invariants.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod topology;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use topology::*;
pub use value_objects::*;
