//! What a guarded element needs from the current visitor.

use serde::{Deserialize, Serialize};
use storefront_auth::{AccessControl, Permission, Role};

/// A predicate over the effective role, evaluated fresh on every call.
///
/// `AllOf([])` is always satisfied and `AnyOf([])` never is, matching the
/// evaluator's composite checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Requirement {
    Permission(Permission),
    AllOf(Vec<Permission>),
    AnyOf(Vec<Permission>),
    /// Effective role equals this role.
    Role(Role),
    AdminArea,
    /// Whatever the route table says about this path.
    Route(String),
    Api { endpoint: String, verb: String },
}

impl Requirement {
    pub fn permission(permission: impl Into<Permission>) -> Self {
        Self::Permission(permission.into())
    }

    pub fn all_of<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self::AllOf(permissions.into_iter().map(Into::into).collect())
    }

    pub fn any_of<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self::AnyOf(permissions.into_iter().map(Into::into).collect())
    }

    pub fn role(role: impl Into<Role>) -> Self {
        Self::Role(role.into())
    }

    pub fn route(path: impl Into<String>) -> Self {
        Self::Route(path.into())
    }

    pub fn api(endpoint: impl Into<String>, verb: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            verb: verb.into(),
        }
    }

    pub fn is_satisfied_by(&self, access: &AccessControl) -> bool {
        match self {
            Requirement::Permission(permission) => access.has_permission(permission.as_str()),
            Requirement::AllOf(permissions) => access.has_all_permissions(permissions),
            Requirement::AnyOf(permissions) => access.has_any_permission(permissions),
            Requirement::Role(role) => access.has_role(role.as_str()),
            Requirement::AdminArea => access.can_access_admin_area(),
            Requirement::Route(path) => access.check_route(path),
            Requirement::Api { endpoint, verb } => access.has_api_permission(endpoint, verb),
        }
    }
}

fn join(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::Permission(permission) => write!(f, "permission '{permission}'"),
            Requirement::AllOf(permissions) => write!(f, "all of [{}]", join(permissions)),
            Requirement::AnyOf(permissions) => write!(f, "any of [{}]", join(permissions)),
            Requirement::Role(role) => write!(f, "role '{role}'"),
            Requirement::AdminArea => f.write_str("admin area access"),
            Requirement::Route(path) => write!(f, "access to route '{path}'"),
            Requirement::Api { endpoint, verb } => {
                write!(f, "api access to {} {endpoint}", verb.to_ascii_uppercase())
            }
        }
    }
}

impl From<Permission> for Requirement {
    fn from(permission: Permission) -> Self {
        Self::Permission(permission)
    }
}
