//! SQLite-backed storage for `acl` catalog documents.
//!
//! Roles, function groups and functions live side by side in one `acl`
//! table, one JSON document per row, exactly in the shape the catalog
//! loader reads. The store is a write-side gate as well: function
//! documents that fail validation are refused on insert.
//!
//! # Example
//!
//! ```no_run
//! use catalog::{CatalogSource, sample};
//! use storage::AclStore;
//!
//! let mut store = AclStore::open("acl.db")?;
//! store.upsert_all(&sample::documents()?)?;
//!
//! // Reverse lookups
//! assert_eq!(store.roles_with_group("FG_REPORTS")?, vec!["ROLE_ADMIN", "ROLE_REPORT"]);
//!
//! // The store is a catalog source
//! let records = store.load_all()?;
//! assert_eq!(records.roles.len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{AclStore, StoredDocument};
