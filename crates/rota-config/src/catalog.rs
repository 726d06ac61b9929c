use anyhow::{Context, Result};
use rota_core::{Resource, ResourceCatalog, StaticCatalog};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Catalog built from a maps directory: every non-hidden sub-directory is a
/// map named after the directory.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
    maps: StaticCatalog,
}

impl DirectoryCatalog {
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let entries = fs::read_dir(&root)
            .with_context(|| format!("Failed to read maps directory: {}", root.display()))?;

        let mut maps = StaticCatalog::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to list maps directory: {}", root.display()))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                debug!(path = %entry.path().display(), "Skipping map with non UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            maps.insert(Resource::with_source(name, entry.path()));
        }

        debug!(root = %root.display(), count = maps.len(), "Scanned map catalog");
        Ok(Self { root, maps })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl ResourceCatalog for DirectoryCatalog {
    fn resolve(&self, name: &str) -> Option<Arc<Resource>> {
        self.maps.resolve(name)
    }
}
