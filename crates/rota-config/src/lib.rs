//! Persisted rotation state (`rotations.toml`) and the filesystem map catalog.

pub mod catalog;
pub mod paths;
pub mod record;
pub mod store;
pub mod toml_store;

pub use catalog::DirectoryCatalog;
pub use record::{RotationField, RotationRecord};
pub use store::{MemoryRotationStore, RotationStore};
pub use toml_store::TomlRotationStore;
