//! Raw `acl` documents as they come out of a store.
//!
//! These mirror the stored shape field for field and stay loosely typed
//! where the store itself is loose: the function sub-documents keep
//! `serde_json::Value` for the fields the validator has to judge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a function record.
pub type FunctionId = String;
/// Identifier of a function group record.
pub type GroupId = String;
/// Identifier of a role record.
pub type RoleId = String;

/// The `type` discriminator of an `acl` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Function,
    FunctionGroup,
    Role,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Function => "function",
            DocumentType::FunctionGroup => "functiongroup",
            DocumentType::Role => "role",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document of the `acl` collection, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AclDocument {
    Function(RawFunction),
    FunctionGroup(FunctionGroup),
    Role(Role),
}

impl AclDocument {
    pub fn id(&self) -> &str {
        match self {
            AclDocument::Function(f) => &f.id,
            AclDocument::FunctionGroup(g) => &g.id,
            AclDocument::Role(r) => &r.id,
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            AclDocument::Function(_) => DocumentType::Function,
            AclDocument::FunctionGroup(_) => DocumentType::FunctionGroup,
            AclDocument::Role(_) => DocumentType::Role,
        }
    }
}

/// A function document before validation.
///
/// Any combination of the three sub-documents may be present here; the
/// validator decides whether it becomes a [`Function`](crate::Function).
/// A JSON `null` sub-document deserializes as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFunction {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: FunctionId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<RawEndpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<RawMenu>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<RawCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operationid: Option<Value>,
}

/// A menu sub-document. Every field is optional and loosely typed; the
/// validator keeps what it can use and drops the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMenu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isleaf: Option<Value>,

    /// Client-side route of the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functionparentid: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captype: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<Value>,
}

/// A named bundle of functions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionGroup {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: GroupId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionId>,
}

/// A named bundle of function groups, assigned to principals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: RoleId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(
        rename = "functiongroups",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub function_groups: Vec<GroupId>,
}
