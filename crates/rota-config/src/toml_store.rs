//! `rotations.toml` backed [`RotationStore`].
//!
//! The whole document is kept in memory as a TOML table so keys this crate
//! does not know about survive write-back. Field writes are also queued until
//! the next flush. A flush holds an `fd-lock` on `rotations.toml.lock`,
//! re-reads the file, replays the queued writes on top, and lands the result
//! via temp-file + rename, so processes sharing the file never undo each
//! other's cursors.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::record::{RotationField, RotationRecord};
use crate::store::RotationStore;

const ROTATIONS_KEY: &str = "rotations";
const LOCK_SUFFIX: &str = "lock";

#[derive(Debug)]
struct StoreState {
    document: toml::Table,
    /// Writes not yet on disk, oldest first.
    pending: Vec<(String, RotationField)>,
}

impl StoreState {
    fn new(document: toml::Table) -> Self {
        Self {
            document,
            pending: Vec::new(),
        }
    }

    fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    fn rotations(&self) -> Option<&toml::Table> {
        self.document.get(ROTATIONS_KEY).and_then(toml::Value::as_table)
    }
}

#[derive(Debug)]
pub struct TomlRotationStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl TomlRotationStore {
    /// Open the rotations file at `path`. A missing file is an empty store;
    /// it is created on the first flush.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = read_document(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(StoreState::new(document)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether writes are pending that have not reached disk.
    pub fn is_dirty(&self) -> bool {
        self.state().map(|s| s.is_dirty()).unwrap_or(true)
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("rotation store lock poisoned: {}", self.path.display()))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "rotations.toml".into());
        name.push(".");
        name.push(LOCK_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Acquire the cross-process write lock, execute `f`, then release.
    fn with_write_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create rotations directory: {}", parent.display())
            })?;
        }

        let lock_path = self.lock_path();
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| anyhow!("Failed to acquire rotations write lock: {e}"))?;

        f()
    }

    /// Read-modify-write of the file under the cross-process lock. On success
    /// the in-memory document becomes the merged one and the queue empties.
    fn flush_state(&self, state: &mut StoreState) -> Result<()> {
        let merged = self.with_write_lock(|| {
            let mut merged = read_document(&self.path)?;
            for (rotation, field) in &state.pending {
                set_field(&mut merged, rotation, field, &self.path)?;
            }
            let content =
                toml::to_string_pretty(&merged).context("Failed to serialize rotations")?;
            atomic_write(&self.path, content.as_bytes())?;
            Ok(merged)
        })?;

        debug!(
            path = %self.path.display(),
            writes = state.pending.len(),
            "Flushed rotation state"
        );
        state.document = merged;
        state.pending.clear();
        Ok(())
    }
}

impl RotationStore for TomlRotationStore {
    fn rotation_names(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        let mut names: Vec<String> = state
            .rotations()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    fn read(&self, rotation: &str) -> Result<Option<RotationRecord>> {
        let state = self.state()?;
        let Some(section) = state.rotations().and_then(|t| t.get(rotation)) else {
            return Ok(None);
        };
        let record = section.clone().try_into::<RotationRecord>().with_context(|| {
            format!(
                "Invalid rotation '{}' in {}",
                rotation,
                self.path.display()
            )
        })?;
        Ok(Some(record))
    }

    fn write(&self, rotation: &str, field: RotationField) -> Result<()> {
        let mut state = self.state()?;
        set_field(&mut state.document, rotation, &field, &self.path)?;
        state.pending.push((rotation.to_string(), field));
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // Held for the whole write so flushes reach disk in request order.
        let mut state = self.state()?;
        if !state.is_dirty() {
            debug!(path = %self.path.display(), "Rotation state clean, skipping flush");
            return Ok(());
        }
        self.flush_state(&mut state)
    }

    /// Re-read the file. Pending writes are flushed first; if that fails they
    /// stay queued and are replayed over the fresh document.
    fn reload(&self) -> Result<()> {
        let mut state = self.state()?;
        if state.is_dirty()
            && let Err(e) = self.flush_state(&mut state)
        {
            warn!(
                path = %self.path.display(),
                pending = state.pending.len(),
                "Failed to flush before reload, keeping pending writes: {e:#}"
            );
        }

        let mut document = read_document(&self.path)?;
        for (rotation, field) in &state.pending {
            set_field(&mut document, rotation, field, &self.path)?;
        }
        state.document = document;
        Ok(())
    }
}

/// Set one field of `[rotations.<rotation>]`, creating tables as needed.
fn set_field(
    document: &mut toml::Table,
    rotation: &str,
    field: &RotationField,
    path: &Path,
) -> Result<()> {
    let rotations = document
        .entry(ROTATIONS_KEY.to_string())
        .or_insert(toml::Value::Table(toml::Table::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("`{ROTATIONS_KEY}` in {} is not a table", path.display()))?;
    let section = rotations
        .entry(rotation.to_string())
        .or_insert(toml::Value::Table(toml::Table::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("Rotation '{rotation}' in {} is not a table", path.display()))?;
    section.insert(field.key().to_string(), field.to_value());
    Ok(())
}

fn read_document(path: &Path) -> Result<toml::Table> {
    if !path.exists() {
        debug!(path = %path.display(), "No rotations file yet, starting empty");
        return Ok(toml::Table::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rotations: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(toml::Table::new());
    }
    toml::from_str(&content).with_context(|| format!("Failed to parse rotations: {}", path.display()))
}

/// Write data to a file atomically using temp-file + rename.
fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    std::io::Write::write_all(&mut tmp, data).context("Failed to write temp file")?;

    tmp.persist(target)
        .with_context(|| format!("Failed to persist to {}", target.display()))?;

    Ok(())
}

#[cfg(test)]
#[path = "toml_store_tests.rs"]
mod tests;
