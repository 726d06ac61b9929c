//! Owns every rotation, mediates cursor moves, and writes them back.
//!
//! Each rotation sits behind its own `RwLock`: cursor moves take the write
//! lock, so concurrent pops on one rotation serve positions strictly one
//! after another, while status queries share the read lock. The cursor
//! write-back and flush happen before the write lock is released, which keeps
//! flushes for a rotation in cursor order.
//!
//! Cursor moves also hold the set's read lock until their flush returns, and
//! `reload` holds the set's write lock from the store re-read to the swap, so
//! a rebuilt rotation always starts from the latest written cursor.

use anyhow::Result;
use rota_config::{RotationField, RotationStore};
use rota_core::{Resource, ResourceCatalog, RotationError};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::rotation::{Rotation, RotationSummary};
use crate::selection::select_eligible;

type RotationSet = BTreeMap<String, Arc<RwLock<Rotation>>>;

pub struct RotationManager {
    store: Arc<dyn RotationStore>,
    catalog: Arc<dyn ResourceCatalog>,
    rotations: RwLock<RotationSet>,
}

impl std::fmt::Debug for RotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationManager")
            .field("rotations", &self.rotation_names().unwrap_or_default())
            .finish()
    }
}

impl RotationManager {
    /// Build every rotation found in `store`, resolving maps via `catalog`.
    pub fn load(store: Arc<dyn RotationStore>, catalog: Arc<dyn ResourceCatalog>) -> Result<Self> {
        let rotations = build_rotations(store.as_ref(), catalog.as_ref())?;
        Ok(Self {
            store,
            catalog,
            rotations: RwLock::new(rotations),
        })
    }

    /// Re-read the store and rebuild every rotation from scratch.
    pub fn reload(&self) -> Result<()> {
        let mut rotations = self
            .rotations
            .write()
            .map_err(|_| RotationError::LockPoisoned("rotation set".into()))?;
        self.store.reload()?;
        *rotations = build_rotations(self.store.as_ref(), self.catalog.as_ref())?;
        Ok(())
    }

    pub fn rotation_names(&self) -> Result<Vec<String>, RotationError> {
        Ok(self.set()?.keys().cloned().collect())
    }

    pub fn summary(&self, rotation: &str) -> Result<RotationSummary, RotationError> {
        let handle = self.handle(rotation)?;
        let guard = read(&handle, rotation)?;
        Ok(guard.summary())
    }

    /// Summaries of every rotation, sorted by name.
    pub fn summaries(&self) -> Result<Vec<RotationSummary>, RotationError> {
        let set = self.set()?;
        set.iter()
            .map(|(name, handle)| Ok(read(handle, name)?.summary()))
            .collect()
    }

    /// Map `rotation` will serve next, without moving the cursor.
    pub fn peek_next_map(&self, rotation: &str) -> Result<Arc<Resource>, RotationError> {
        let handle = self.handle(rotation)?;
        let guard = read(&handle, rotation)?;
        guard.peek_next_map()
    }

    /// Serve the next map of `rotation` and advance its cursor by one.
    pub fn pop_next_map(&self, rotation: &str) -> Result<Arc<Resource>, RotationError> {
        self.mutate(rotation, |r| r.pop_next_map())
    }

    /// Move the cursor of `rotation` forward by `steps`. Returns the map now
    /// up next.
    pub fn advance(&self, rotation: &str, steps: usize) -> Result<Arc<Resource>, RotationError> {
        self.mutate(rotation, |r| r.advance(steps))
    }

    pub fn set_position(
        &self,
        rotation: &str,
        position: usize,
    ) -> Result<Arc<Resource>, RotationError> {
        self.mutate(rotation, |r| r.set_position(position))
    }

    /// Make `map` the next map served by `rotation`.
    pub fn set_next_map(&self, rotation: &str, map: &str) -> Result<Arc<Resource>, RotationError> {
        self.mutate(rotation, |r| r.set_next_map(map))
    }

    /// Rotation that should serve a server with `participants` players online.
    pub fn select_rotation(&self, participants: u32) -> Result<RotationSummary, RotationError> {
        select_in(&*self.set()?, participants)
    }

    /// Select the rotation for `participants` and pop its next map.
    ///
    /// Returns the rotation name alongside the served map. Selection and pop
    /// share one view of the rotation set.
    pub fn pop_for_participants(
        &self,
        participants: u32,
    ) -> Result<(String, Arc<Resource>), RotationError> {
        let set = self.set()?;
        let selected = select_in(&set, participants)?;
        let map = self.mutate_in(&set, &selected.name, |r| r.pop_next_map())?;
        Ok((selected.name, map))
    }

    fn set(&self) -> Result<RwLockReadGuard<'_, RotationSet>, RotationError> {
        self.rotations
            .read()
            .map_err(|_| RotationError::LockPoisoned("rotation set".into()))
    }

    fn handle(&self, rotation: &str) -> Result<Arc<RwLock<Rotation>>, RotationError> {
        self.set()?
            .get(rotation)
            .cloned()
            .ok_or_else(|| RotationError::RotationNotFound(rotation.to_string()))
    }

    /// Run a cursor move under the rotation's write lock and persist the
    /// resulting cursor before releasing it.
    fn mutate<T>(
        &self,
        rotation: &str,
        f: impl FnOnce(&mut Rotation) -> Result<T, RotationError>,
    ) -> Result<T, RotationError> {
        self.mutate_in(&*self.set()?, rotation, f)
    }

    fn mutate_in<T>(
        &self,
        set: &RotationSet,
        rotation: &str,
        f: impl FnOnce(&mut Rotation) -> Result<T, RotationError>,
    ) -> Result<T, RotationError> {
        let handle = set
            .get(rotation)
            .ok_or_else(|| RotationError::RotationNotFound(rotation.to_string()))?;
        let mut guard = write(handle, rotation)?;
        let result = f(&mut *guard)?;
        self.persist_cursor(&guard);
        Ok(result)
    }

    fn persist_cursor(&self, rotation: &Rotation) {
        let Ok(next) = rotation.peek_next_map() else {
            return;
        };
        if let Err(e) = self
            .store
            .write(rotation.name(), RotationField::NextMap(next.name().to_string()))
        {
            warn!(
                rotation = %rotation.name(),
                map = %next.name(),
                "Failed to record next map: {e:#}"
            );
            return;
        }
        self.save_rotations();
    }

    /// Flush pending writes. Failures leave the in-memory cursor as the
    /// source of truth; the store stays dirty and the next flush retries.
    fn save_rotations(&self) {
        match self.store.flush() {
            Ok(()) => debug!("Saved rotations"),
            Err(e) => warn!("Failed to save rotations, keeping in-memory cursor: {e:#}"),
        }
    }
}

fn build_rotations(store: &dyn RotationStore, catalog: &dyn ResourceCatalog) -> Result<RotationSet> {
    let mut rotations = RotationSet::new();
    for name in store.rotation_names()? {
        match store.read(&name) {
            Ok(Some(record)) => {
                let rotation = Rotation::from_record(name.clone(), &record, catalog);
                rotations.insert(name, Arc::new(RwLock::new(rotation)));
            }
            Ok(None) => {}
            Err(e) => warn!(rotation = %name, "Skipping unreadable rotation: {e:#}"),
        }
    }
    info!(count = rotations.len(), "Loaded rotations");
    Ok(rotations)
}

fn select_in(set: &RotationSet, participants: u32) -> Result<RotationSummary, RotationError> {
    let guards = set
        .iter()
        .map(|(name, handle)| read(handle, name))
        .collect::<Result<Vec<_>, _>>()?;

    select_eligible(guards.iter().map(|g| &**g), participants)
        .map(Rotation::summary)
        .ok_or(RotationError::NoEligibleRotation { participants })
}

fn read<'a>(
    handle: &'a RwLock<Rotation>,
    name: &str,
) -> Result<RwLockReadGuard<'a, Rotation>, RotationError> {
    handle
        .read()
        .map_err(|_| RotationError::LockPoisoned(name.to_string()))
}

fn write<'a>(
    handle: &'a RwLock<Rotation>,
    name: &str,
) -> Result<RwLockWriteGuard<'a, Rotation>, RotationError> {
    handle
        .write()
        .map_err(|_| RotationError::LockPoisoned(name.to_string()))
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
