//! Authorization and capability checks over a resolved set.

use crate::{Error, ResolvedPermissionSet, Result};
use catalog::CapabilityType;

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl ResolvedPermissionSet {
    /// Whether an endpoint function grants `operation_id`.
    ///
    /// Exact, case-sensitive comparison; no wildcards.
    pub fn is_authorized(&self, operation_id: &str) -> bool {
        self.endpoints()
            .any(|(_, endpoint)| endpoint.operation_id == operation_id)
    }

    /// Whether a capability of `capability_type` is granted for `app_id`.
    ///
    /// A stored capability without an app id applies to every app; a query
    /// without an app id accepts any capability of the right type.
    pub fn has_capability(&self, capability_type: CapabilityType, app_id: Option<&str>) -> bool {
        self.capabilities().any(|(_, capability)| {
            capability.capability_type == capability_type && capability.applies_to(app_id)
        })
    }

    /// Operation ids granted by this set, sorted and deduplicated.
    pub fn operations(&self) -> Vec<&str> {
        let mut operations: Vec<&str> = self
            .endpoints()
            .map(|(_, endpoint)| endpoint.operation_id.as_str())
            .collect();
        operations.sort_unstable();
        operations.dedup();
        operations
    }

    /// Check `operation_id`, explaining a denial.
    pub fn authorize(&self, operation_id: &str) -> Decision {
        if self.is_authorized(operation_id) {
            Decision::Allow
        } else {
            Decision::Deny {
                reason: format!(
                    "operation `{operation_id}` not granted to roles [{}]",
                    self.roles().join(", ")
                ),
            }
        }
    }

    /// Require `operation_id`, returning an error if denied.
    pub fn require_operation(&self, operation_id: &str) -> Result<()> {
        match self.authorize(operation_id) {
            Decision::Allow => Ok(()),
            Decision::Deny { reason } => Err(Error::Denied(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve;
    use catalog::{AclDocument, Catalog, CatalogRecords};
    use serde_json::json;

    fn make_catalog() -> Catalog {
        let docs: Vec<AclDocument> = serde_json::from_value(json!([
            { "_id": "F_LIST", "type": "function", "endpoint": { "operationid": "getUsers" } },
            { "_id": "F_LIST_AGAIN", "type": "function", "endpoint": { "operationid": "getUsers" } },
            { "_id": "C_EXPORT", "type": "function", "capability": { "captype": "client", "appid": "APP_A" } },
            { "_id": "C_AUDIT", "type": "function", "capability": { "captype": "server" } },
            { "_id": "G_USERS", "type": "functiongroup", "functions": ["F_LIST", "F_LIST_AGAIN", "C_EXPORT"] },
            { "_id": "G_AUDIT", "type": "functiongroup", "functions": ["C_AUDIT"] },
            { "_id": "R_USER", "type": "role", "functiongroups": ["G_USERS"] },
            { "_id": "R_AUDITOR", "type": "role", "functiongroups": ["G_AUDIT"] }
        ]))
        .unwrap();
        Catalog::build(CatalogRecords::from_documents(docs), 1).unwrap()
    }

    #[test]
    fn test_is_authorized_exact_match() {
        let catalog = make_catalog();
        let set = resolve(&catalog, ["R_USER"]).set;
        assert!(set.is_authorized("getUsers"));
        assert!(!set.is_authorized("getusers"));
        assert!(!set.is_authorized("getUser"));
        assert!(!set.is_authorized("*"));
        assert!(!set.is_authorized(""));
    }

    #[test]
    fn test_operations_are_deduplicated() {
        let catalog = make_catalog();
        let set = resolve(&catalog, ["R_USER"]).set;
        assert_eq!(set.operations(), vec!["getUsers"]);
    }

    #[test]
    fn test_has_capability_app_scoping() {
        let catalog = make_catalog();
        let set = resolve(&catalog, ["R_USER"]).set;
        assert!(set.has_capability(CapabilityType::Client, Some("APP_A")));
        assert!(set.has_capability(CapabilityType::Client, None));
        assert!(!set.has_capability(CapabilityType::Client, Some("APP_B")));
        assert!(!set.has_capability(CapabilityType::Server, None));
    }

    #[test]
    fn test_global_capability_applies_to_every_app() {
        let catalog = make_catalog();
        let set = resolve(&catalog, ["R_AUDITOR"]).set;
        assert!(set.has_capability(CapabilityType::Server, None));
        assert!(set.has_capability(CapabilityType::Server, Some("APP_Z")));
        assert!(!set.has_capability(CapabilityType::Client, None));
    }

    #[test]
    fn test_authorize_decision() {
        let catalog = make_catalog();
        let set = resolve(&catalog, ["R_AUDITOR", "R_USER"]).set;
        assert!(set.authorize("getUsers").is_allowed());

        let Decision::Deny { reason } = set.authorize("createUser") else {
            panic!("expected deny");
        };
        assert_eq!(
            reason,
            "operation `createUser` not granted to roles [R_AUDITOR, R_USER]"
        );
        assert!(matches!(
            set.require_operation("createUser"),
            Err(Error::Denied(_))
        ));
        assert!(set.require_operation("getUsers").is_ok());
    }

    #[test]
    fn test_empty_set_grants_nothing() {
        let set = ResolvedPermissionSet::default();
        assert!(!set.is_authorized("getUsers"));
        assert!(!set.has_capability(CapabilityType::Client, None));
    }
}
