use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role key used for RBAC.
///
/// Role keys are opaque strings. A key that is not present in the loaded
/// registry is still a valid `Role`; it simply holds no permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Anonymous visitors.
    pub const PUBLIC: Role = Role(Cow::Borrowed("public"));
    /// Signed-in shoppers without an explicit assignment.
    pub const CUSTOMER: Role = Role(Cow::Borrowed("customer"));
    /// Back-office staff; second-highest privilege.
    pub const STAFF: Role = Role(Cow::Borrowed("staff"));
    /// Highest-privilege role.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_public(&self) -> bool {
        self.as_str() == Self::PUBLIC.as_str()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for Role {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A loaded role: its key, description and closed permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub key: Role,
    pub description: String,
    pub permissions: BTreeSet<Permission>,
}

impl RoleDefinition {
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
