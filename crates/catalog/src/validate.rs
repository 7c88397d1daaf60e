//! Schema validation for `acl` documents.
//!
//! A function document must carry exactly one of `endpoint`, `menu` or
//! `capability`. Endpoints need a non-empty `operationid`, capabilities a
//! `captype` of `client` or `server`. Menus accept any
//! combination of their optional fields.
//! Roles and groups only need an identifier.

use crate::{
    AclDocument, Capability, CapabilityType, DocumentType, Endpoint, Function, FunctionGroup,
    FunctionKind, Menu, MenuOrder, RawCapability, RawEndpoint, RawFunction, RawMenu, Role,
};
use serde::Serialize;
use serde_json::Value;

/// What is wrong with a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A function with zero or several of endpoint/menu/capability.
    Shape { present: Vec<&'static str> },
    /// The variant is present but one of its required fields is invalid.
    Field { field: &'static str, reason: String },
    /// The record has no identifier.
    MissingId,
    /// Another record in the same catalog already uses this identifier.
    DuplicateId,
    /// The document could not be read at all.
    Malformed { reason: String },
}

/// A single validation failure, attributed to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Identifier of the offending record, or its position when it has none.
    pub record: String,
    pub document_type: Option<DocumentType>,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(
        record: impl Into<String>,
        document_type: Option<DocumentType>,
        kind: ViolationKind,
    ) -> Self {
        Self {
            record: record.into(),
            document_type,
            kind,
        }
    }

    pub fn is_shape(&self) -> bool {
        matches!(self.kind, ViolationKind::Shape { .. })
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, ViolationKind::Field { .. })
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.document_type {
            Some(t) => write!(f, "{t} `{}`: ", self.record)?,
            None => write!(f, "`{}`: ", self.record)?,
        }
        match &self.kind {
            ViolationKind::Shape { present } if present.is_empty() => {
                write!(f, "none of endpoint, menu, capability is present")
            }
            ViolationKind::Shape { present } => {
                write!(f, "exactly one variant allowed, found {}", present.join(", "))
            }
            ViolationKind::Field { field, reason } => write!(f, "{field}: {reason}"),
            ViolationKind::MissingId => write!(f, "missing identifier"),
            ViolationKind::DuplicateId => write!(f, "duplicate identifier"),
            ViolationKind::Malformed { reason } => write!(f, "malformed document: {reason}"),
        }
    }
}

/// A validated function, or every reason it was refused.
pub type ValidationResult = std::result::Result<Function, Vec<Violation>>;

/// Validate a raw function document and build the typed record.
pub fn validate_function(raw: &RawFunction) -> ValidationResult {
    let mut violations = Vec::new();
    let fail = |kind| Violation::new(raw.id.clone(), Some(DocumentType::Function), kind);

    if raw.id.is_empty() {
        violations.push(fail(ViolationKind::MissingId));
    }

    let mut present = Vec::new();
    if raw.endpoint.is_some() {
        present.push("endpoint");
    }
    if raw.menu.is_some() {
        present.push("menu");
    }
    if raw.capability.is_some() {
        present.push("capability");
    }
    if present.len() != 1 {
        violations.push(fail(ViolationKind::Shape { present }));
    }

    let endpoint = raw.endpoint.as_ref().map(endpoint_from_raw);
    let capability = raw.capability.as_ref().map(capability_from_raw);
    let menu = raw.menu.as_ref().map(menu_from_raw);

    let mut kinds = Vec::new();
    for result in [endpoint, capability].into_iter().flatten() {
        match result {
            Ok(kind) => kinds.push(kind),
            Err(kind) => violations.push(fail(kind)),
        }
    }
    kinds.extend(menu);

    if !violations.is_empty() {
        return Err(violations);
    }
    match kinds.pop() {
        Some(kind) => Ok(Function::new(
            raw.id.clone(),
            raw.description.clone(),
            kind,
        )),
        // Unreachable after the shape check.
        None => Err(vec![fail(ViolationKind::Shape {
            present: Vec::new(),
        })]),
    }
}

impl TryFrom<RawFunction> for Function {
    type Error = Vec<Violation>;

    fn try_from(raw: RawFunction) -> Result<Self, Self::Error> {
        validate_function(&raw)
    }
}

/// Validate a function group. Only the identifier is required.
pub fn validate_group(group: &FunctionGroup) -> Vec<Violation> {
    require_id(&group.id, DocumentType::FunctionGroup)
}

/// Validate a role. Only the identifier is required.
pub fn validate_role(role: &Role) -> Vec<Violation> {
    require_id(&role.id, DocumentType::Role)
}

/// Validate any `acl` document.
pub fn validate_document(document: &AclDocument) -> Vec<Violation> {
    match document {
        AclDocument::Function(raw) => validate_function(raw).err().unwrap_or_default(),
        AclDocument::FunctionGroup(group) => validate_group(group),
        AclDocument::Role(role) => validate_role(role),
    }
}

fn require_id(id: &str, document_type: DocumentType) -> Vec<Violation> {
    if id.is_empty() {
        vec![Violation::new(id, Some(document_type), ViolationKind::MissingId)]
    } else {
        Vec::new()
    }
}

fn endpoint_from_raw(raw: &RawEndpoint) -> Result<FunctionKind, ViolationKind> {
    match &raw.operationid {
        Some(Value::String(op)) if !op.is_empty() => Ok(FunctionKind::Endpoint(Endpoint {
            operation_id: op.clone(),
        })),
        Some(Value::String(_)) => Err(ViolationKind::Field {
            field: "endpoint.operationid",
            reason: "must not be empty".into(),
        }),
        Some(other) => Err(ViolationKind::Field {
            field: "endpoint.operationid",
            reason: format!("must be a string, found {other}"),
        }),
        None => Err(ViolationKind::Field {
            field: "endpoint.operationid",
            reason: "is required".into(),
        }),
    }
}

fn capability_from_raw(raw: &RawCapability) -> Result<FunctionKind, ViolationKind> {
    let capability_type = match &raw.captype {
        Some(Value::String(s)) => s.parse::<CapabilityType>().map_err(|_| ViolationKind::Field {
            field: "capability.captype",
            reason: format!("must be `client` or `server`, found `{s}`"),
        })?,
        Some(other) => {
            return Err(ViolationKind::Field {
                field: "capability.captype",
                reason: format!("must be `client` or `server`, found {other}"),
            });
        }
        None => {
            return Err(ViolationKind::Field {
                field: "capability.captype",
                reason: "is required".into(),
            });
        }
    };
    let app_id = match &raw.appid {
        Some(Value::String(app)) => Some(app.clone()),
        Some(other) => {
            return Err(ViolationKind::Field {
                field: "capability.appid",
                reason: format!("must be a string, found {other}"),
            });
        }
        None => None,
    };
    Ok(FunctionKind::Capability(Capability {
        capability_type,
        app_id,
    }))
}

/// Menus carry no field constraints: values of the wrong type are dropped.
fn menu_from_raw(raw: &RawMenu) -> FunctionKind {
    FunctionKind::Menu(Menu {
        icon: string_field(raw.icon.as_ref()),
        is_leaf: matches!(raw.isleaf, Some(Value::Bool(true))),
        endpoint_path: string_field(raw.endpoint.as_ref()),
        parent_id: string_field(raw.functionparentid.as_ref()),
        order: MenuOrder::from_value(raw.order.as_ref()),
        app_id: string_field(raw.appid.as_ref()),
    })
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawFunction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_endpoint_only_is_valid() {
        let f = validate_function(&raw(json!({
            "_id": "FUNC_WHOAMI", "endpoint": { "operationid": "whoami" }
        })))
        .unwrap();
        assert_eq!(f.id(), "FUNC_WHOAMI");
        assert_eq!(f.as_endpoint().unwrap().operation_id, "whoami");
    }

    #[test]
    fn test_no_variant_is_shape_violation() {
        let errs = validate_function(&raw(json!({ "_id": "EMPTY" }))).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ViolationKind::Shape { present: vec![] });
    }

    #[test]
    fn test_endpoint_and_capability_is_shape_violation() {
        let errs = validate_function(&raw(json!({
            "_id": "BOTH",
            "endpoint": { "operationid": "x" },
            "capability": { "captype": "client" }
        })))
        .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].kind,
            ViolationKind::Shape {
                present: vec!["endpoint", "capability"]
            }
        );
    }

    #[test]
    fn test_all_three_variants_rejected() {
        let errs = validate_function(&raw(json!({
            "_id": "ALL",
            "endpoint": { "operationid": "x" },
            "menu": {},
            "capability": { "captype": "server" }
        })))
        .unwrap_err();
        assert!(errs[0].is_shape());
    }

    #[test]
    fn test_empty_operation_id_is_field_violation() {
        let errs = validate_function(&raw(json!({
            "_id": "BAD_OP", "endpoint": { "operationid": "" }
        })))
        .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].is_field());
        assert_eq!(errs[0].record, "BAD_OP");
    }

    #[test]
    fn test_missing_or_non_string_operation_id() {
        let missing = validate_function(&raw(json!({ "_id": "A", "endpoint": {} }))).unwrap_err();
        assert!(missing[0].is_field());

        let number =
            validate_function(&raw(json!({ "_id": "B", "endpoint": { "operationid": 7 } })))
                .unwrap_err();
        assert!(number[0].is_field());
    }

    #[test]
    fn test_bad_capability_type_is_field_violation() {
        let errs = validate_function(&raw(json!({
            "_id": "CAP", "capability": { "captype": "desktop" }
        })))
        .unwrap_err();
        assert!(errs[0].is_field());

        let missing =
            validate_function(&raw(json!({ "_id": "CAP2", "capability": {} }))).unwrap_err();
        assert!(missing[0].is_field());
    }

    #[test]
    fn test_capability_keeps_app_id() {
        let f = validate_function(&raw(json!({
            "_id": "CAP_EXPORT", "capability": { "captype": "client", "appid": "APP_A" }
        })))
        .unwrap();
        let cap = f.as_capability().unwrap();
        assert_eq!(cap.capability_type, CapabilityType::Client);
        assert_eq!(cap.app_id.as_deref(), Some("APP_A"));
    }

    #[test]
    fn test_empty_menu_gets_defaults() {
        let f = validate_function(&raw(json!({ "_id": "MENU_X", "menu": {} }))).unwrap();
        let menu = f.as_menu().unwrap();
        assert!(!menu.is_leaf);
        assert_eq!(menu.order(), 0);
        assert!(menu.parent_id.is_none());
    }

    #[test]
    fn test_menu_is_permissive() {
        let f = validate_function(&raw(json!({
            "_id": "MENU_ODD",
            "menu": { "order": "first", "isleaf": "yes" }
        })))
        .unwrap();
        let menu = f.as_menu().unwrap();
        assert!(menu.order.is_malformed());
        assert!(!menu.is_leaf);
    }

    #[test]
    fn test_null_variant_does_not_count_toward_shape() {
        let f = validate_function(&raw(json!({
            "_id": "MENU_NULL_EP", "endpoint": null, "capability": null, "menu": { "order": 2 }
        })))
        .unwrap();
        assert_eq!(f.as_menu().unwrap().order(), 2);
    }

    #[test]
    fn test_menu_drops_non_string_fields() {
        let f = validate_function(&raw(json!({
            "_id": "MENU_TYPED",
            "menu": {
                "icon": 5,
                "endpoint": { "path": "/x" },
                "functionparentid": 12,
                "appid": ["APP_A"],
                "order": 1
            }
        })))
        .unwrap();
        let menu = f.as_menu().unwrap();
        assert!(menu.icon.is_none());
        assert!(menu.endpoint_path.is_none());
        assert!(menu.parent_id.is_none());
        assert!(menu.app_id.is_none());
        assert_eq!(menu.order(), 1);
    }

    #[test]
    fn test_non_string_capability_app_is_field_violation() {
        let errs = validate_function(&raw(json!({
            "_id": "CAP_NUM", "capability": { "captype": "client", "appid": 5 }
        })))
        .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].kind,
            ViolationKind::Field {
                field: "capability.appid",
                reason: "must be a string, found 5".into(),
            }
        );
    }

    #[test]
    fn test_shape_and_field_violations_are_both_reported() {
        let errs = validate_function(&raw(json!({
            "_id": "WORST",
            "endpoint": { "operationid": "" },
            "capability": { "captype": "nope" }
        })))
        .unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(errs[0].is_shape());
        assert!(errs[1..].iter().all(Violation::is_field));
    }

    #[test]
    fn test_missing_id() {
        let errs =
            validate_function(&raw(json!({ "endpoint": { "operationid": "x" } }))).unwrap_err();
        assert_eq!(errs[0].kind, ViolationKind::MissingId);

        let role_errs = validate_role(&Role::default());
        assert_eq!(role_errs.len(), 1);
        assert!(validate_group(&FunctionGroup {
            id: "FG".into(),
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn test_violation_display() {
        let errs = validate_function(&raw(json!({ "_id": "EMPTY" }))).unwrap_err();
        assert_eq!(
            errs[0].to_string(),
            "function `EMPTY`: none of endpoint, menu, capability is present"
        );
    }
}
