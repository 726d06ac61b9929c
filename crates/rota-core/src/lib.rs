//! Shared types for map rotations: resources, the catalog contract, and errors.

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::{ResourceCatalog, StaticCatalog};
pub use error::RotationError;
pub use types::{OutputFormat, Resource};
