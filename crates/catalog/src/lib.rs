//! Permission catalog: roles, function groups and functions.
//!
//! The catalog is the data side of authorization. A **role** bundles
//! **function groups**, a function group bundles **functions**, and every
//! function is exactly one of:
//!
//! - **Endpoint**: authorizes a backend operation (`operationid`)
//! - **Menu**: one node of a navigable UI tree
//! - **Capability**: a `client` or `server` feature flag, optionally
//!   scoped to an application
//!
//! # Loading
//!
//! Records arrive as raw [`AclDocument`]s from a [`CatalogSource`]. They are
//! validated as a whole by [`Catalog::build`], which collects every
//! violation before refusing a load, and then frozen into an immutable
//! [`Catalog`] snapshot tagged with a version.
//!
//! ```
//! use catalog::{CatalogSource, MemorySource, Catalog, sample};
//!
//! let source = MemorySource::new(sample::records()?);
//! let catalog = Catalog::build(source.load_all()?, 1)?;
//! assert!(catalog.role("ROLE_ADMIN").is_some());
//! # Ok::<(), catalog::Error>(())
//! ```
//!
//! References between records are not checked at load time; the resolver
//! reports dangling ones as diagnostics.

mod catalog;
mod document;
mod error;
mod function;
pub mod sample;
mod source;
mod validate;

pub use catalog::{Catalog, CatalogRecords};
pub use document::{
    AclDocument, DocumentType, FunctionGroup, FunctionId, GroupId, RawCapability, RawEndpoint,
    RawFunction, RawMenu, Role, RoleId,
};
pub use error::{Error, Result};
pub use function::{
    Capability, CapabilityType, Endpoint, Function, FunctionKind, Menu, MenuOrder,
};
pub use source::{
    CatalogSource, JsonFileSource, MemorySource, documents_from_values, parse_documents,
};
pub use validate::{
    ValidationResult, Violation, ViolationKind, validate_document, validate_function,
    validate_group, validate_role,
};
