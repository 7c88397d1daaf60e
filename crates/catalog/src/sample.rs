//! The reference seed catalog.
//!
//! Three roles (`ROLE_ADMIN`, `ROLE_USER`, `ROLE_REPORT`) over three
//! function groups, covering every function variant. Handy for demos,
//! tests and as a template for real catalogs.

use crate::{AclDocument, Catalog, CatalogRecords, Result, parse_documents};

/// The seed catalog as a JSON array of `acl` documents.
pub const SEED_JSON: &str = include_str!("../data/acl-seed.json");

pub fn documents() -> Result<Vec<AclDocument>> {
    parse_documents(SEED_JSON)
}

pub fn records() -> Result<CatalogRecords> {
    Ok(CatalogRecords::from_documents(documents()?))
}

/// The seed catalog built as snapshot version 1.
pub fn catalog() -> Result<Catalog> {
    Catalog::build(records()?, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_valid() {
        let catalog = catalog().unwrap();
        assert_eq!(catalog.function_count(), 11);
        assert_eq!(catalog.group_count(), 3);
        assert_eq!(catalog.role_count(), 3);
    }

    #[test]
    fn test_seed_every_reference_resolves() {
        let catalog = catalog().unwrap();
        for role in catalog.roles() {
            for group in &role.function_groups {
                assert!(catalog.group(group).is_some(), "{} -> {group}", role.id);
            }
        }
        for group in catalog.groups() {
            for function in &group.functions {
                assert!(catalog.function(function).is_some(), "{} -> {function}", group.id);
            }
        }
    }
}
