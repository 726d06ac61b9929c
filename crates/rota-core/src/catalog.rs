//! Map catalog contract.
//!
//! Rotations never own maps: they hold `Arc<Resource>` handles handed out by
//! whatever catalog the host injects.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::Resource;

/// Resolves map names to shared resource handles.
pub trait ResourceCatalog: Send + Sync {
    /// Look up a map by name; `None` when the catalog does not know it.
    fn resolve(&self, name: &str) -> Option<Arc<Resource>>;
}

/// In-memory catalog keyed by exact map name.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    maps: BTreeMap<String, Arc<Resource>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog of source-less resources from plain names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Resource::new).collect()
    }

    /// Insert a resource, replacing any previous entry with the same name.
    pub fn insert(&mut self, resource: Resource) {
        self.maps
            .insert(resource.name().to_string(), Arc::new(resource));
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Map names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }
}

impl FromIterator<Resource> for StaticCatalog {
    fn from_iter<T: IntoIterator<Item = Resource>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for resource in iter {
            catalog.insert(resource);
        }
        catalog
    }
}

impl ResourceCatalog for StaticCatalog {
    fn resolve(&self, name: &str) -> Option<Arc<Resource>> {
        self.maps.get(name).cloned()
    }
}
