//! The immutable catalog snapshot.

use crate::{
    AclDocument, DocumentType, Error, Function, FunctionGroup, FunctionId, GroupId, RawFunction,
    Result, Role, RoleId, Violation, ViolationKind, validate_function, validate_group,
    validate_role,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Every record of one catalog load, split by document type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRecords {
    pub functions: Vec<RawFunction>,
    pub function_groups: Vec<FunctionGroup>,
    pub roles: Vec<Role>,
}

impl CatalogRecords {
    pub fn from_documents(documents: impl IntoIterator<Item = AclDocument>) -> Self {
        let mut records = Self::default();
        for document in documents {
            match document {
                AclDocument::Function(f) => records.functions.push(f),
                AclDocument::FunctionGroup(g) => records.function_groups.push(g),
                AclDocument::Role(r) => records.roles.push(r),
            }
        }
        records
    }

    pub fn into_documents(self) -> Vec<AclDocument> {
        let mut documents = Vec::with_capacity(self.len());
        documents.extend(self.functions.into_iter().map(AclDocument::Function));
        documents.extend(self.function_groups.into_iter().map(AclDocument::FunctionGroup));
        documents.extend(self.roles.into_iter().map(AclDocument::Role));
        documents
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.function_groups.len() + self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate every record and collect all violations, including
    /// identifiers used twice within the same document type.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        for raw in &self.functions {
            if let Err(errs) = validate_function(raw) {
                violations.extend(errs);
            }
        }
        for group in &self.function_groups {
            violations.extend(validate_group(group));
        }
        for role in &self.roles {
            violations.extend(validate_role(role));
        }

        duplicates(
            self.functions.iter().map(|f| f.id.as_str()),
            DocumentType::Function,
            &mut violations,
        );
        duplicates(
            self.function_groups.iter().map(|g| g.id.as_str()),
            DocumentType::FunctionGroup,
            &mut violations,
        );
        duplicates(
            self.roles.iter().map(|r| r.id.as_str()),
            DocumentType::Role,
            &mut violations,
        );

        violations
    }
}

fn duplicates<'a>(
    ids: impl Iterator<Item = &'a str>,
    document_type: DocumentType,
    violations: &mut Vec<Violation>,
) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for id in ids.filter(|id| !id.is_empty()) {
        if !seen.insert(id) && reported.insert(id) {
            violations.push(Violation::new(
                id,
                Some(document_type),
                ViolationKind::DuplicateId,
            ));
        }
    }
}

/// One immutable, fully loaded version of the catalog.
///
/// Function records are shared as `Arc<Function>` with the derived
/// structures built from the snapshot, so resolving never copies them.
#[derive(Debug, Clone)]
pub struct Catalog {
    version: u64,
    loaded_at: DateTime<Utc>,
    functions: HashMap<FunctionId, Arc<Function>>,
    groups: HashMap<GroupId, FunctionGroup>,
    roles: HashMap<RoleId, Role>,
}

impl Catalog {
    /// An empty catalog with version 0, used before the first load.
    pub fn empty() -> Self {
        Self {
            version: 0,
            loaded_at: Utc::now(),
            functions: HashMap::new(),
            groups: HashMap::new(),
            roles: HashMap::new(),
        }
    }

    /// Validate `records` and build a snapshot tagged with `version`.
    ///
    /// Fails with [`Error::Rejected`] carrying every violation found; a
    /// partially valid catalog is never built. References between records
    /// are not checked here, they are reported at resolution time.
    pub fn build(records: CatalogRecords, version: u64) -> Result<Self> {
        let violations = records.validate();
        if !violations.is_empty() {
            tracing::warn!(
                violations = violations.len(),
                version,
                "Rejected catalog"
            );
            return Err(Error::Rejected(violations));
        }

        let mut functions = HashMap::with_capacity(records.functions.len());
        for raw in records.functions {
            let function = Function::try_from(raw).map_err(Error::Rejected)?;
            if let Some(menu) = function.as_menu() {
                if menu.order.is_malformed() {
                    tracing::debug!(function = function.id(), "menu order is not an integer");
                }
            }
            functions.insert(function.id().to_string(), Arc::new(function));
        }

        let groups: HashMap<_, _> = records
            .function_groups
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();
        let roles: HashMap<_, _> = records
            .roles
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        tracing::info!(
            version,
            functions = functions.len(),
            groups = groups.len(),
            roles = roles.len(),
            "Built catalog snapshot"
        );

        Ok(Self {
            version,
            loaded_at: Utc::now(),
            functions,
            groups,
            roles,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn function(&self, id: &str) -> Option<&Arc<Function>> {
        self.functions.get(id)
    }

    pub fn group(&self, id: &str) -> Option<&FunctionGroup> {
        self.groups.get(id)
    }

    pub fn role(&self, id: &str) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &FunctionGroup> {
        self.groups.values()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> CatalogRecords {
        let docs: Vec<AclDocument> = serde_json::from_value(value).unwrap();
        CatalogRecords::from_documents(docs)
    }

    #[test]
    fn test_build_basic() {
        let catalog = Catalog::build(
            records(json!([
                { "_id": "F1", "type": "function", "endpoint": { "operationid": "op1" } },
                { "_id": "M1", "type": "function", "menu": { "order": 1 } },
                { "_id": "G1", "type": "functiongroup", "functions": ["F1", "M1"] },
                { "_id": "R1", "type": "role", "functiongroups": ["G1"] }
            ])),
            7,
        )
        .unwrap();

        assert_eq!(catalog.version(), 7);
        assert_eq!(catalog.function_count(), 2);
        assert_eq!(catalog.group_count(), 1);
        assert_eq!(catalog.role_count(), 1);
        assert!(catalog.function("F1").unwrap().as_endpoint().is_some());
        assert_eq!(catalog.role("R1").unwrap().function_groups, vec!["G1"]);
    }

    #[test]
    fn test_build_collects_all_violations() {
        let err = Catalog::build(
            records(json!([
                { "_id": "NONE", "type": "function" },
                { "_id": "BAD_OP", "type": "function", "endpoint": { "operationid": "" } },
                { "_id": "BAD_CAP", "type": "function", "capability": { "captype": "x" } },
                { "_id": "OK", "type": "function", "menu": {} },
                { "type": "role" }
            ])),
            1,
        )
        .unwrap_err();

        let violations = err.violations();
        assert_eq!(violations.len(), 4);
        let records: Vec<_> = violations.iter().map(|v| v.record.as_str()).collect();
        assert!(records.contains(&"NONE"));
        assert!(records.contains(&"BAD_OP"));
        assert!(records.contains(&"BAD_CAP"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Catalog::build(
            records(json!([
                { "_id": "F1", "type": "function", "menu": {} },
                { "_id": "F1", "type": "function", "menu": {} },
                { "_id": "F1", "type": "function", "menu": {} }
            ])),
            1,
        )
        .unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].kind, ViolationKind::DuplicateId);
    }

    #[test]
    fn test_dangling_references_are_not_build_errors() {
        let catalog = Catalog::build(
            records(json!([
                { "_id": "G1", "type": "functiongroup", "functions": ["MISSING"] },
                { "_id": "R1", "type": "role", "functiongroups": ["G1", "NOPE"] }
            ])),
            1,
        )
        .unwrap();
        assert_eq!(catalog.group_count(), 1);
    }

    #[test]
    fn test_records_round_trip_documents() {
        let recs = records(json!([
            { "_id": "F1", "type": "function", "menu": {} },
            { "_id": "R1", "type": "role" }
        ]));
        assert_eq!(recs.len(), 2);
        let docs = recs.clone().into_documents();
        assert_eq!(CatalogRecords::from_documents(docs), recs);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::empty();
        assert_eq!(catalog.version(), 0);
        assert!(catalog.function("anything").is_none());
    }
}
