//! Shared entry point: current snapshot, resolution cache and refresh.

use crate::{
    CatalogHandle, DEFAULT_CACHE_CAPACITY, Decision, Error, MenuBuilder, MenuForest, Resolution,
    ResolutionCache, Result, resolve,
};
use catalog::{CapabilityType, Catalog, CatalogSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Minimum age of a snapshot before [`Authorizer::refresh_if_stale`]
/// reloads it.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Options for an [`Authorizer`].
#[derive(Debug, Clone)]
pub struct AuthorizerOptions {
    /// Memoize resolutions per snapshot version and role set.
    pub cache: bool,
    /// Role sets the cache holds before it starts over.
    pub cache_capacity: usize,
    pub refresh_interval: Duration,
}

impl Default for AuthorizerOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// What [`Authorizer::refresh_if_stale`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot is younger than the refresh interval.
    Fresh,
    /// Another caller is reloading; the current snapshot stays in use.
    InProgress,
    /// A new snapshot was published.
    Reloaded { version: u64 },
}

/// Answers authorization questions for role sets against the current
/// catalog snapshot.
///
/// Safe to share between threads. Every call captures the snapshot once
/// and answers entirely from it, so a concurrent reload never mixes two
/// catalog versions into one answer.
#[derive(Debug)]
pub struct Authorizer {
    catalog: CatalogHandle,
    cache: Option<ResolutionCache>,
    refresh_interval: Duration,
    refreshing: AtomicBool,
    last_load: Mutex<Option<Instant>>,
}

impl Authorizer {
    /// An authorizer over the empty catalog; call [`reload`](Self::reload)
    /// before use.
    pub fn new(options: AuthorizerOptions) -> Self {
        Self::from_handle(CatalogHandle::new(), options, None)
    }

    /// An authorizer over an already built catalog.
    pub fn with_catalog(catalog: Catalog, options: AuthorizerOptions) -> Self {
        Self::from_handle(
            CatalogHandle::with_catalog(catalog),
            options,
            Some(Instant::now()),
        )
    }

    fn from_handle(
        catalog: CatalogHandle,
        options: AuthorizerOptions,
        last_load: Option<Instant>,
    ) -> Self {
        Self {
            catalog,
            cache: options
                .cache
                .then(|| ResolutionCache::with_capacity(options.cache_capacity)),
            refresh_interval: options.refresh_interval,
            refreshing: AtomicBool::new(false),
            last_load: Mutex::new(last_load),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.current()
    }

    /// Reload from `source` now.
    ///
    /// Fails with [`Error::ReloadInProgress`] if another reload is running.
    /// On failure the current snapshot stays in use.
    pub fn reload(&self, source: &dyn CatalogSource) -> Result<Arc<Catalog>> {
        let _guard = RefreshGuard::acquire(&self.refreshing).ok_or(Error::ReloadInProgress)?;
        self.load_now(source)
    }

    /// Reload from `source` if the snapshot is older than the refresh
    /// interval and nobody else is reloading.
    pub fn refresh_if_stale(&self, source: &dyn CatalogSource) -> Result<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            return Ok(RefreshOutcome::InProgress);
        };
        if !self.is_stale() {
            return Ok(RefreshOutcome::Fresh);
        }
        let catalog = self.load_now(source)?;
        Ok(RefreshOutcome::Reloaded {
            version: catalog.version(),
        })
    }

    /// Whether the last successful load is older than the refresh interval
    /// (or there was none).
    pub fn is_stale(&self) -> bool {
        let last_load = self.last_load.lock().unwrap_or_else(PoisonError::into_inner);
        match *last_load {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => true,
        }
    }

    fn load_now(&self, source: &dyn CatalogSource) -> Result<Arc<Catalog>> {
        tracing::info!(
            version = self.catalog.version(),
            "Catalog reload start"
        );
        match self.catalog.load(source) {
            Ok(catalog) => {
                *self.last_load.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(Instant::now());
                tracing::info!(version = catalog.version(), "Catalog reload done");
                Ok(catalog)
            }
            Err(e) => {
                tracing::error!(error = %e, "Catalog reload failed");
                Err(e)
            }
        }
    }

    /// Resolve `role_ids` against the current snapshot.
    pub fn resolve<I, S>(&self, role_ids: I) -> Arc<Resolution>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = self.snapshot();
        match &self.cache {
            Some(cache) => cache.get_or_resolve(&snapshot, role_ids),
            None => Arc::new(resolve(&snapshot, role_ids)),
        }
    }

    pub fn is_authorized<I, S>(&self, role_ids: I, operation_id: &str) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve(role_ids).set.is_authorized(operation_id)
    }

    pub fn authorize<I, S>(&self, role_ids: I, operation_id: &str) -> Decision
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve(role_ids).set.authorize(operation_id)
    }

    pub fn has_capability<I, S>(
        &self,
        role_ids: I,
        capability_type: CapabilityType,
        app_id: Option<&str>,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve(role_ids)
            .set
            .has_capability(capability_type, app_id)
    }

    /// Whether any of `role_ids` grants function `function_id`.
    pub fn grants_function<I, S>(&self, role_ids: I, function_id: &str) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve(role_ids).set.contains(function_id)
    }

    /// The menu forest for `role_ids`, optionally scoped to one app.
    pub fn menu<I, S>(&self, role_ids: I, app_id: Option<&str>) -> MenuForest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let resolution = self.resolve(role_ids);
        let builder = match app_id {
            Some(app) => MenuBuilder::new().for_app(app),
            None => MenuBuilder::new(),
        };
        builder.build(&resolution.set)
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new(AuthorizerOptions::default())
    }
}

/// Holds the reload flag; released on drop.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
