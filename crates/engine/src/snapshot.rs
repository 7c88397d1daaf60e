//! Atomically swapped catalog snapshots.

use crate::Result;
use catalog::{Catalog, CatalogRecords, CatalogSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the current catalog snapshot.
///
/// Readers take an `Arc<Catalog>` with [`current`](Self::current) and keep
/// using it for the whole request; a reload publishes a new snapshot
/// without touching the one they hold. Versions only ever increase.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
    next_version: AtomicU64,
}

impl CatalogHandle {
    /// A handle holding the empty version-0 catalog.
    pub fn new() -> Self {
        Self::with_catalog(Catalog::empty())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let next = catalog.version() + 1;
        Self {
            current: RwLock::new(Arc::new(catalog)),
            next_version: AtomicU64::new(next),
        }
    }

    /// The snapshot readers should use right now.
    pub fn current(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub fn version(&self) -> u64 {
        self.current().version()
    }

    /// Fetch every record from `source` and publish them as a new snapshot.
    ///
    /// On any error the current snapshot stays in place.
    pub fn load(&self, source: &dyn CatalogSource) -> Result<Arc<Catalog>> {
        let records = source.load_all()?;
        self.publish_records(records)
    }

    /// Validate `records` and publish them as a new snapshot.
    pub fn publish_records(&self, records: CatalogRecords) -> Result<Arc<Catalog>> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let catalog = Catalog::build(records, version)?;
        Ok(self.publish(catalog))
    }

    /// Swap in `catalog` unless a newer snapshot was published meanwhile.
    /// Returns whichever snapshot is current afterwards.
    fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if catalog.version() > guard.version() {
            *guard = Arc::new(catalog);
            tracing::info!(
                version = guard.version(),
                functions = guard.function_count(),
                groups = guard.group_count(),
                roles = guard.role_count(),
                "Published catalog snapshot"
            );
        } else {
            tracing::warn!(
                version = catalog.version(),
                current = guard.version(),
                "Discarded outdated catalog snapshot"
            );
        }
        Arc::clone(&*guard)
    }
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::new()
    }
}
