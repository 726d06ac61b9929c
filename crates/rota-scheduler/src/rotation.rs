//! A rotation: an ordered, cyclic list of maps with a resumable cursor.
//!
//! Construction never fails. Map names the catalog cannot resolve are dropped
//! and a stale `next_map` degrades to position 0; both are logged and kept on
//! the rotation for inspection. Operations that need at least one map return
//! [`RotationError::EmptyRotation`] instead of wrapping over zero.

use rota_config::RotationRecord;
use rota_core::{Resource, ResourceCatalog, RotationError};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// How the cursor was positioned when the rotation was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum CursorRecovery {
    /// The persisted `next_map` was found in the rotation.
    Restored { map: String, position: usize },
    /// The cursor started at position 0.
    FellBack { reason: FallbackReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "map")]
pub enum FallbackReason {
    /// No `next_map` was persisted.
    Missing,
    /// `next_map` is unknown to the catalog.
    Unresolved(String),
    /// `next_map` resolves, but is not one of this rotation's maps.
    NotInRotation(String),
}

impl CursorRecovery {
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Rotation {
    name: String,
    enabled: bool,
    /// Minimum player count for this rotation to be eligible.
    players: u32,
    maps: Vec<Arc<Resource>>,
    position: usize,
    unresolved: Vec<String>,
    recovery: CursorRecovery,
}

impl Rotation {
    /// Build a rotation from its persisted section, resolving map names
    /// through `catalog`.
    pub fn from_record(
        name: impl Into<String>,
        record: &RotationRecord,
        catalog: &dyn ResourceCatalog,
    ) -> Self {
        let name = name.into();

        let mut maps = Vec::with_capacity(record.maps.len());
        let mut unresolved = Vec::new();
        for map_name in &record.maps {
            match catalog.resolve(map_name) {
                Some(map) => maps.push(map),
                None => {
                    warn!(
                        rotation = %name,
                        map = %map_name,
                        "Map not found in map catalog, ignoring"
                    );
                    unresolved.push(map_name.clone());
                }
            }
        }

        let mut rotation = Self {
            name,
            enabled: record.enabled,
            players: record.players,
            maps,
            position: 0,
            unresolved,
            recovery: CursorRecovery::FellBack {
                reason: FallbackReason::Missing,
            },
        };
        rotation.recovery = rotation.recover_cursor(record.next_map.as_deref(), catalog);
        rotation
    }

    fn recover_cursor(
        &mut self,
        next_map: Option<&str>,
        catalog: &dyn ResourceCatalog,
    ) -> CursorRecovery {
        let reason = match next_map {
            None => FallbackReason::Missing,
            Some(map_name) => match catalog.resolve(map_name) {
                None => FallbackReason::Unresolved(map_name.to_string()),
                Some(map) => match self.index_of(&map) {
                    Some(position) => {
                        self.position = position;
                        debug!(
                            rotation = %self.name,
                            map = %map.name(),
                            position,
                            "Restored rotation cursor"
                        );
                        return CursorRecovery::Restored {
                            map: map.name().to_string(),
                            position,
                        };
                    }
                    None => FallbackReason::NotInRotation(map_name.to_string()),
                },
            },
        };

        self.position = 0;
        error!(
            rotation = %self.name,
            reason = ?reason,
            "Could not resolve next map from rotation. Resuming on initial position: 0"
        );
        CursorRecovery::FellBack { reason }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn players(&self) -> u32 {
        self.players
    }

    pub fn maps(&self) -> &[Arc<Resource>] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Map names from the persisted list that the catalog could not resolve.
    pub fn unresolved_maps(&self) -> &[String] {
        &self.unresolved
    }

    pub fn recovery(&self) -> &CursorRecovery {
        &self.recovery
    }

    /// Enabled, has maps, and `participants` meets the player threshold.
    pub fn is_eligible(&self, participants: u32) -> bool {
        self.enabled && !self.maps.is_empty() && self.players <= participants
    }

    /// Position of the first map with the same name as `map`.
    pub fn index_of(&self, map: &Resource) -> Option<usize> {
        self.maps.iter().position(|m| m.same_map(map))
    }

    /// Map at `index`, clamped to the first map when out of range.
    pub fn resource_at(&self, index: isize) -> Result<Arc<Resource>, RotationError> {
        let first = self.first()?;
        match usize::try_from(index).ok().and_then(|i| self.maps.get(i)) {
            Some(map) => Ok(Arc::clone(map)),
            None => {
                warn!(
                    rotation = %self.name,
                    index,
                    size = self.maps.len(),
                    "Unexpected map position requested from rotation, returning position 0 instead"
                );
                Ok(first)
            }
        }
    }

    /// Map the next pop will serve.
    pub fn peek_next_map(&self) -> Result<Arc<Resource>, RotationError> {
        self.checked_len()?;
        Ok(Arc::clone(&self.maps[self.position]))
    }

    /// Position the cursor will hold after the next pop.
    pub fn next_position(&self) -> Result<usize, RotationError> {
        let len = self.checked_len()?;
        Ok((self.position + 1) % len)
    }

    /// Serve the current map and move the cursor one step forward.
    pub fn pop_next_map(&mut self) -> Result<Arc<Resource>, RotationError> {
        let served = self.resource_at(self.position as isize)?;
        self.advance(1)?;
        Ok(served)
    }

    /// Move the cursor `steps` forward, wrapping around. Returns the map now
    /// at the cursor.
    pub fn advance(&mut self, steps: usize) -> Result<Arc<Resource>, RotationError> {
        let len = self.checked_len()?;
        self.position = (self.position + steps % len) % len;
        debug!(
            rotation = %self.name,
            steps,
            position = self.position,
            "Advanced rotation cursor"
        );
        self.peek_next_map()
    }

    /// Point the cursor at `position` (taken modulo the rotation size).
    pub fn set_position(&mut self, position: usize) -> Result<Arc<Resource>, RotationError> {
        let len = self.checked_len()?;
        self.position = position % len;
        self.peek_next_map()
    }

    /// Point the cursor at the map named `map_name`.
    pub fn set_next_map(&mut self, map_name: &str) -> Result<Arc<Resource>, RotationError> {
        self.checked_len()?;
        let position = self
            .maps
            .iter()
            .position(|m| m.name() == map_name)
            .ok_or_else(|| RotationError::MapNotInRotation {
                rotation: self.name.clone(),
                map: map_name.to_string(),
            })?;
        self.set_position(position)
    }

    pub fn summary(&self) -> RotationSummary {
        RotationSummary {
            name: self.name.clone(),
            enabled: self.enabled,
            players: self.players,
            position: self.position,
            next_map: self.maps.get(self.position).map(|m| m.name().to_string()),
            maps: self.maps.iter().map(|m| m.name().to_string()).collect(),
            unresolved_maps: self.unresolved.clone(),
            recovery: self.recovery.clone(),
        }
    }

    fn checked_len(&self) -> Result<usize, RotationError> {
        match self.maps.len() {
            0 => Err(RotationError::EmptyRotation(self.name.clone())),
            len => Ok(len),
        }
    }

    fn first(&self) -> Result<Arc<Resource>, RotationError> {
        self.maps
            .first()
            .cloned()
            .ok_or_else(|| RotationError::EmptyRotation(self.name.clone()))
    }
}

/// Rotations order by player threshold. The name only breaks ties so the
/// order stays consistent with equality.
impl Ord for Rotation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.players
            .cmp(&other.players)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Rotation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Rotation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rotation {}

/// Point-in-time view of a rotation, safe to hand out without holding locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationSummary {
    pub name: String,
    pub enabled: bool,
    pub players: u32,
    pub position: usize,
    pub next_map: Option<String>,
    pub maps: Vec<String>,
    pub unresolved_maps: Vec<String>,
    pub recovery: CursorRecovery,
}

#[cfg(test)]
#[path = "rotation_tests.rs"]
mod tests;
