//! Role → function group → function resolution.

use catalog::{Capability, Catalog, DocumentType, Endpoint, Function, FunctionId, Menu, RoleId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A reference that did not resolve against the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnresolvedReference {
    /// What kind of record was expected.
    pub kind: DocumentType,
    pub id: String,
    /// Roles or groups that point at the missing record, sorted. Empty for
    /// role ids that came straight from the request.
    pub referenced_by: Vec<String>,
}

impl std::fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.id)?;
        if !self.referenced_by.is_empty() {
            write!(f, " (referenced by {})", self.referenced_by.join(", "))?;
        }
        Ok(())
    }
}

/// The deduplicated functions granted by a set of roles.
///
/// Holds shared function records and the version of the snapshot it was
/// resolved against; nothing else of the catalog is retained.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedPermissionSet {
    version: u64,
    roles: Vec<RoleId>,
    functions: BTreeMap<FunctionId, Arc<Function>>,
}

impl ResolvedPermissionSet {
    /// Snapshot version the set was resolved against.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The requested role ids, sorted and deduplicated.
    pub fn roles(&self) -> &[RoleId] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Whether function `id` is granted.
    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Function>> {
        self.functions.get(id)
    }

    /// Granted function ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Granted functions, ordered by id.
    pub fn functions(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&Function, &Endpoint)> {
        self.functions()
            .filter_map(|f| f.as_endpoint().map(|e| (f.as_ref(), e)))
    }

    pub fn menus(&self) -> impl Iterator<Item = (&Function, &Menu)> {
        self.functions().filter_map(|f| f.as_menu().map(|m| (f.as_ref(), m)))
    }

    pub fn capabilities(&self) -> impl Iterator<Item = (&Function, &Capability)> {
        self.functions()
            .filter_map(|f| f.as_capability().map(|c| (f.as_ref(), c)))
    }
}

/// Outcome of a resolution: the granted set plus every reference that
/// could not be followed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub set: ResolvedPermissionSet,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Resolution {
    /// True when every role, group and function reference resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn into_parts(self) -> (ResolvedPermissionSet, Vec<UnresolvedReference>) {
        (self.set, self.unresolved)
    }
}

/// Normalize a role request: sorted, deduplicated.
pub(crate) fn normalize_roles<I, S>(role_ids: I) -> Vec<RoleId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    role_ids
        .into_iter()
        .map(|r| r.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolve `role_ids` against `catalog`.
///
/// Walks roles, then the union of their groups, then the union of the
/// groups' functions. A missing id at any level is recorded and skipped;
/// the rest still resolves. The result does not depend on the order or
/// multiplicity of `role_ids`.
pub fn resolve<I, S>(catalog: &Catalog, role_ids: I) -> Resolution
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    resolve_normalized(catalog, normalize_roles(role_ids))
}

pub(crate) fn resolve_normalized(catalog: &Catalog, roles: Vec<RoleId>) -> Resolution {
    let mut unresolved = Vec::new();

    let mut group_refs: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for role_id in &roles {
        match catalog.role(role_id) {
            Some(role) => {
                for group in &role.function_groups {
                    group_refs.entry(group.as_str()).or_default().insert(role.id.as_str());
                }
            }
            None => unresolved.push(UnresolvedReference {
                kind: DocumentType::Role,
                id: role_id.clone(),
                referenced_by: Vec::new(),
            }),
        }
    }

    let mut function_refs: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (group_id, referrers) in &group_refs {
        match catalog.group(group_id) {
            Some(group) => {
                for function in &group.functions {
                    function_refs
                        .entry(function.as_str())
                        .or_default()
                        .insert(group.id.as_str());
                }
            }
            None => unresolved.push(missing(DocumentType::FunctionGroup, group_id, referrers)),
        }
    }

    let mut functions = BTreeMap::new();
    for (function_id, referrers) in &function_refs {
        match catalog.function(function_id) {
            Some(function) => {
                functions.insert(function_id.to_string(), Arc::clone(function));
            }
            None => unresolved.push(missing(DocumentType::Function, function_id, referrers)),
        }
    }

    unresolved.sort();

    tracing::debug!(
        version = catalog.version(),
        roles = roles.len(),
        groups = group_refs.len(),
        functions = functions.len(),
        unresolved = unresolved.len(),
        "Resolved permission set"
    );

    Resolution {
        set: ResolvedPermissionSet {
            version: catalog.version(),
            roles,
            functions,
        },
        unresolved,
    }
}

fn missing(kind: DocumentType, id: &str, referrers: &BTreeSet<&str>) -> UnresolvedReference {
    UnresolvedReference {
        kind,
        id: id.to_string(),
        referenced_by: referrers.iter().map(|r| r.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{AclDocument, CatalogRecords};
    use serde_json::json;

    fn make_catalog() -> Catalog {
        let docs: Vec<AclDocument> = serde_json::from_value(json!([
            { "_id": "F_READ", "type": "function", "endpoint": { "operationid": "read" } },
            { "_id": "F_WRITE", "type": "function", "endpoint": { "operationid": "write" } },
            { "_id": "F_MENU", "type": "function", "menu": { "order": 1 } },
            { "_id": "G_READ", "type": "functiongroup", "functions": ["F_READ", "F_MENU"] },
            { "_id": "G_WRITE", "type": "functiongroup", "functions": ["F_WRITE", "F_READ", "F_GONE"] },
            { "_id": "R_READER", "type": "role", "functiongroups": ["G_READ"] },
            { "_id": "R_WRITER", "type": "role", "functiongroups": ["G_WRITE", "G_GONE"] },
            { "_id": "R_BOTH", "type": "role", "functiongroups": ["G_READ", "G_WRITE"] }
        ]))
        .unwrap();
        Catalog::build(CatalogRecords::from_documents(docs), 3).unwrap()
    }

    fn ids(set: &ResolvedPermissionSet) -> Vec<&str> {
        set.ids().collect()
    }

    #[test]
    fn test_resolve_single_role() {
        let catalog = make_catalog();
        let resolution = resolve(&catalog, ["R_READER"]);
        assert!(resolution.is_complete());
        assert_eq!(ids(&resolution.set), vec!["F_MENU", "F_READ"]);
        assert_eq!(resolution.set.version(), 3);
    }

    #[test]
    fn test_resolve_deduplicates_across_groups() {
        let catalog = make_catalog();
        let resolution = resolve(&catalog, ["R_BOTH"]);
        // F_READ is in both groups but appears once
        assert_eq!(ids(&resolution.set), vec!["F_MENU", "F_READ", "F_WRITE"]);
    }

    #[test]
    fn test_resolve_reports_dangling_references() {
        let catalog = make_catalog();
        let resolution = resolve(&catalog, ["R_WRITER"]);
        assert_eq!(ids(&resolution.set), vec!["F_READ", "F_WRITE"]);
        assert_eq!(
            resolution.unresolved,
            vec![
                UnresolvedReference {
                    kind: DocumentType::Function,
                    id: "F_GONE".into(),
                    referenced_by: vec!["G_WRITE".into()],
                },
                UnresolvedReference {
                    kind: DocumentType::FunctionGroup,
                    id: "G_GONE".into(),
                    referenced_by: vec!["R_WRITER".into()],
                },
            ]
        );
    }

    #[test]
    fn test_missing_referenced_once_per_id() {
        let catalog = make_catalog();
        let resolution = resolve(&catalog, ["R_WRITER", "R_BOTH"]);
        let gone: Vec<_> = resolution
            .unresolved
            .iter()
            .filter(|u| u.id == "F_GONE")
            .collect();
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].referenced_by, vec!["G_WRITE"]);
    }

    #[test]
    fn test_unknown_role_does_not_affect_others() {
        let catalog = make_catalog();
        let resolution = resolve(&catalog, ["R_READER", "R_NOBODY"]);
        assert_eq!(ids(&resolution.set), vec!["F_MENU", "F_READ"]);
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(resolution.unresolved[0].kind, DocumentType::Role);
        assert_eq!(resolution.unresolved[0].id, "R_NOBODY");
        assert_eq!(
            resolution.unresolved[0].to_string(),
            "unknown role `R_NOBODY`"
        );
    }

    #[test]
    fn test_order_and_duplicates_in_request_ignored() {
        let catalog = make_catalog();
        let a = resolve(&catalog, ["R_READER", "R_WRITER"]);
        let b = resolve(&catalog, ["R_WRITER", "R_READER", "R_WRITER"]);
        assert_eq!(ids(&a.set), ids(&b.set));
        assert_eq!(a.unresolved, b.unresolved);
        assert_eq!(b.set.roles(), ["R_READER", "R_WRITER"]);
    }

    #[test]
    fn test_resolve_is_monotonic() {
        let catalog = make_catalog();
        let small = resolve(&catalog, ["R_READER"]);
        let large = resolve(&catalog, ["R_READER", "R_WRITER"]);
        assert!(small.set.ids().all(|id| large.set.contains(id)));
    }

    #[test]
    fn test_resolve_empty_request() {
        let catalog = make_catalog();
        let resolution = resolve(&catalog, Vec::<String>::new());
        assert!(resolution.set.is_empty());
        assert!(resolution.is_complete());
    }

    #[test]
    fn test_variant_views() {
        let catalog = make_catalog();
        let set = resolve(&catalog, ["R_BOTH"]).set;
        assert_eq!(set.endpoints().count(), 2);
        assert_eq!(set.menus().count(), 1);
        assert_eq!(set.capabilities().count(), 0);
    }
}
