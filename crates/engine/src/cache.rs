//! Memoized resolutions, keyed by snapshot version and role set.

use crate::resolve::{Resolution, normalize_roles, resolve_normalized};
use catalog::{Catalog, DocumentType, RoleId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Role sets a [`ResolutionCache`] holds before it starts over.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct CacheState {
    /// Snapshot version every entry was resolved against.
    version: u64,
    entries: HashMap<Vec<RoleId>, Arc<Resolution>>,
}

/// Read-mostly cache of resolutions.
///
/// Every entry belongs to the newest snapshot version the cache has seen.
/// Observing a newer version drops all entries; lookups for an older
/// version bypass the cache. A result is therefore never served for a
/// snapshot other than the one it was resolved against.
///
/// At most `capacity` role sets are held; inserting into a full cache
/// empties it first. Role sets naming a role the snapshot does not know
/// are resolved but never stored.
#[derive(Debug)]
pub struct ResolutionCache {
    state: RwLock<CacheState>,
    capacity: usize,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` role sets. Zero disables storing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::default(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the cached resolution of `role_ids` on `catalog`, resolving
    /// and storing it on a miss.
    pub fn get_or_resolve<I, S>(&self, catalog: &Catalog, role_ids: I) -> Arc<Resolution>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = normalize_roles(role_ids);
        let version = catalog.version();

        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.version == version {
                if let Some(hit) = state.entries.get(&key) {
                    return Arc::clone(hit);
                }
            }
        }

        let resolution = Arc::new(resolve_normalized(catalog, key.clone()));
        if self.capacity == 0 || names_unknown_role(&resolution) {
            return resolution;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if version > state.version {
            if !state.entries.is_empty() {
                tracing::debug!(
                    from = state.version,
                    to = version,
                    dropped = state.entries.len(),
                    "Invalidated resolution cache"
                );
            }
            state.entries.clear();
            state.version = version;
        }
        if version == state.version {
            if state.entries.len() >= self.capacity && !state.entries.contains_key(&key) {
                tracing::debug!(
                    version,
                    dropped = state.entries.len(),
                    "Resolution cache full, starting over"
                );
                state.entries.clear();
            }
            state.entries.insert(key, Arc::clone(&resolution));
        }
        resolution
    }

    /// Number of cached resolutions.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version the cached entries belong to.
    pub fn version(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    pub fn clear(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }
}

fn names_unknown_role(resolution: &Resolution) -> bool {
    resolution
        .unresolved
        .iter()
        .any(|reference| reference.kind == DocumentType::Role)
}
