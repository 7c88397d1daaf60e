//! Authorization engine over a permission catalog.
//!
//! Given a set of role ids, the engine resolves the functions those roles
//! grant (role → function groups → functions) and answers three questions
//! from the result:
//!
//! - may these roles call backend operation `X`? ([`ResolvedPermissionSet::is_authorized`])
//! - do they hold capability `client`/`server`, optionally for an app?
//!   ([`ResolvedPermissionSet::has_capability`])
//! - what menu should they see? ([`MenuBuilder`])
//!
//! Resolution is a pure function of a [`catalog::Catalog`] snapshot. The
//! [`CatalogHandle`] swaps snapshots atomically on reload, and the
//! [`Authorizer`] ties a handle, a [`ResolutionCache`] and a staleness-based
//! refresh policy together for shared use.
//!
//! ```
//! use catalog::{CapabilityType, sample};
//! use engine::{Authorizer, AuthorizerOptions};
//!
//! let authorizer = Authorizer::with_catalog(sample::catalog()?, AuthorizerOptions::default());
//! assert!(authorizer.is_authorized(["ROLE_ADMIN"], "whoami"));
//! assert!(!authorizer.is_authorized(["ROLE_REPORT"], "createUser"));
//! assert!(authorizer.has_capability(["ROLE_USER"], CapabilityType::Client, Some("APP_A")));
//! # Ok::<(), engine::Error>(())
//! ```

mod authorizer;
mod cache;
mod check;
mod error;
mod menu;
mod resolve;
mod snapshot;

pub use authorizer::{Authorizer, AuthorizerOptions, DEFAULT_REFRESH_INTERVAL, RefreshOutcome};
pub use cache::{DEFAULT_CACHE_CAPACITY, ResolutionCache};
pub use check::Decision;
pub use error::{Error, Result};
pub use menu::{
    DepthFirst, MAX_MENU_DEPTH, MenuBuilder, MenuDiagnostic, MenuForest, MenuNode, build_menu,
};
pub use resolve::{Resolution, ResolvedPermissionSet, UnresolvedReference, resolve};
pub use snapshot::CatalogHandle;
