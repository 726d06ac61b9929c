//! Scheduler: map rotations, player-count tier selection, and cursor persistence.

pub mod manager;
pub mod rotation;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_support;

pub use manager::RotationManager;
pub use rotation::{CursorRecovery, FallbackReason, Rotation, RotationSummary};
pub use selection::select_eligible;
