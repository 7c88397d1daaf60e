//! Validated function records.
//!
//! A [`Function`] always carries exactly one [`FunctionKind`]. The only way
//! to obtain one is through [`validate_function`](crate::validate_function)
//! (or `TryFrom<RawFunction>`), so consumers never re-check the shape.

use crate::{Error, FunctionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Whether a capability is enforced on the client or on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityType {
    Client,
    Server,
}

impl CapabilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityType::Client => "client",
            CapabilityType::Server => "server",
        }
    }
}

impl std::fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(CapabilityType::Client),
            "server" => Ok(CapabilityType::Server),
            other => Err(Error::UnknownCapabilityType(other.to_string())),
        }
    }
}

/// Authorizes a backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    #[serde(rename = "operationid")]
    pub operation_id: String,
}

/// The `order` of a menu entry as it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum MenuOrder {
    #[default]
    Absent,
    Value(i64),
    /// Present but not an integer. Kept verbatim so it can be reported.
    Malformed(Value),
}

impl MenuOrder {
    /// Parse a stored `order` value. Integral floats are accepted since
    /// mongo shells write every number literal as a double.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return MenuOrder::Absent;
        };
        if value.is_null() {
            return MenuOrder::Absent;
        }
        if let Some(n) = value.as_i64() {
            return MenuOrder::Value(n);
        }
        if let Some(f) = value.as_f64() {
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                return MenuOrder::Value(f as i64);
            }
        }
        MenuOrder::Malformed(value.clone())
    }

    /// The value used for sorting; anything but a valid integer sorts as 0.
    pub fn sort_key(&self) -> i64 {
        match self {
            MenuOrder::Value(n) => *n,
            MenuOrder::Absent | MenuOrder::Malformed(_) => 0,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, MenuOrder::Absent)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, MenuOrder::Malformed(_))
    }
}

/// One node of the navigable UI tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Informational: whether the entry is clickable rather than a header.
    #[serde(rename = "isleaf")]
    pub is_leaf: bool,

    #[serde(rename = "endpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint_path: Option<String>,

    #[serde(rename = "functionparentid", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FunctionId>,

    #[serde(skip_serializing_if = "MenuOrder::is_absent")]
    pub order: MenuOrder,

    #[serde(rename = "appid", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl Menu {
    pub fn order(&self) -> i64 {
        self.order.sort_key()
    }

    /// Whether this entry is shown for `app`. Entries without an app id
    /// are shown everywhere.
    pub fn applies_to(&self, app: Option<&str>) -> bool {
        scoped_to(self.app_id.as_deref(), app)
    }
}

/// A client- or server-side feature flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    #[serde(rename = "captype")]
    pub capability_type: CapabilityType,

    #[serde(rename = "appid", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl Capability {
    /// Whether this capability applies to `app`. A capability without an
    /// app id applies to all apps; a query without an app matches any.
    pub fn applies_to(&self, app: Option<&str>) -> bool {
        scoped_to(self.app_id.as_deref(), app)
    }
}

fn scoped_to(stored: Option<&str>, query: Option<&str>) -> bool {
    match (stored, query) {
        (Some(stored), Some(query)) => stored == query,
        _ => true,
    }
}

/// The single payload of a function record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Endpoint(Endpoint),
    Menu(Menu),
    Capability(Capability),
}

impl FunctionKind {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::Endpoint(_) => "endpoint",
            FunctionKind::Menu(_) => "menu",
            FunctionKind::Capability(_) => "capability",
        }
    }
}

/// An atomic permission record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    #[serde(rename = "_id")]
    id: FunctionId,

    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,

    #[serde(flatten)]
    kind: FunctionKind,
}

impl Function {
    pub(crate) fn new(id: FunctionId, description: String, kind: FunctionKind) -> Self {
        Self {
            id,
            description,
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn as_endpoint(&self) -> Option<&Endpoint> {
        match &self.kind {
            FunctionKind::Endpoint(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_menu(&self) -> Option<&Menu> {
        match &self.kind {
            FunctionKind::Menu(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_capability(&self) -> Option<&Capability> {
        match &self.kind {
            FunctionKind::Capability(c) => Some(c),
            _ => None,
        }
    }
}
