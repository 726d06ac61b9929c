//! Persistence contract for rotation state.
//!
//! Writes only touch the in-memory view; nothing reaches backing storage
//! until `flush` is called. Implementations must apply flushes in the order
//! they are requested so an older cursor never overwrites a newer one.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::record::{RotationField, RotationRecord};

pub trait RotationStore: Send + Sync {
    /// Names of every rotation section, sorted.
    fn rotation_names(&self) -> Result<Vec<String>>;

    /// Read one rotation section; `None` if the section does not exist.
    fn read(&self, rotation: &str) -> Result<Option<RotationRecord>>;

    /// Set one field of a rotation section, creating the section if needed.
    fn write(&self, rotation: &str, field: RotationField) -> Result<()>;

    /// Persist all pending writes.
    fn flush(&self) -> Result<()>;

    /// Re-read backing storage. Writes that have not been flushed must not be
    /// lost: they are flushed first or replayed over the re-read state.
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

/// Store kept entirely in memory, for hosts without on-disk state.
#[derive(Debug, Default)]
pub struct MemoryRotationStore {
    records: Mutex<BTreeMap<String, RotationRecord>>,
    flushes: AtomicU64,
}

impl MemoryRotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, RotationRecord)>,
    {
        Self {
            records: Mutex::new(records.into_iter().collect()),
            flushes: AtomicU64::new(0),
        }
    }

    /// Number of flushes requested so far.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, RotationRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow!("memory rotation store poisoned"))
    }
}

impl RotationStore for MemoryRotationStore {
    fn rotation_names(&self) -> Result<Vec<String>> {
        Ok(self.records()?.keys().cloned().collect())
    }

    fn read(&self, rotation: &str) -> Result<Option<RotationRecord>> {
        Ok(self.records()?.get(rotation).cloned())
    }

    fn write(&self, rotation: &str, field: RotationField) -> Result<()> {
        let mut records = self.records()?;
        field.apply(records.entry(rotation.to_string()).or_default());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
