// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────
//
// Answers "why is this button hidden?" for admin screens and the console.
// Explanations are computed on demand and never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::{RegistrySnapshot, can_access_admin_area};
use crate::{Role, is_valid_permission};

/// Detailed explanation of one permission decision.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    /// The permission that was being checked.
    pub required_permission: String,

    /// Effective role the decision was made for.
    pub role: String,

    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Sorted permission set of the role (empty for unknown roles).
    pub effective_permissions: Vec<String>,

    /// Registry revision the decision was read from.
    pub revision: u64,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownRole,
    MissingPermission,
}

/// Explain whether `role` holds `permission` in `snapshot`.
pub fn explain_permission(
    snapshot: &RegistrySnapshot,
    role: &Role,
    permission: &str,
) -> AccessExplanation {
    let effective_permissions: Vec<String> = snapshot
        .get_role_permissions(role.as_str())
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();

    let base = AccessExplanation {
        required_permission: permission.to_string(),
        role: role.as_str().to_string(),
        granted: false,
        reason: String::new(),
        effective_permissions,
        revision: snapshot.revision(),
        denial_reason: None,
    };

    if snapshot.get_role(role.as_str()).is_none() {
        return AccessExplanation {
            reason: format!("Role '{role}' is not defined in the loaded configuration"),
            denial_reason: Some(DenialReason {
                kind: DenialKind::UnknownRole,
                message: format!("Unknown role '{role}' holds no permissions"),
                suggestions: vec![
                    format!("Add role '{role}' to the rbac configuration"),
                    "Check the role assignment stored for this account".to_string(),
                ],
            }),
            ..base
        };
    }

    if snapshot.has_permission(role.as_str(), permission) {
        return AccessExplanation {
            granted: true,
            reason: format!("Role '{role}' has explicit permission '{permission}'"),
            ..base
        };
    }

    let granting_roles: Vec<String> = snapshot
        .roles_granting(permission)
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();

    let mut suggestions = vec![format!(
        "Add '{permission}' to the permission set of role '{role}'"
    )];
    if granting_roles.is_empty() {
        suggestions.push(format!("No role currently grants '{permission}'"));
    } else {
        suggestions.push(format!(
            "Roles that grant this permission: {}",
            granting_roles.join(", ")
        ));
    }
    if !is_valid_permission(permission) {
        suggestions.push(format!(
            "'{permission}' is not a well-formed category:action token"
        ));
    }

    AccessExplanation {
        reason: format!(
            "Role '{role}' does not have permission '{permission}'. Current permissions: {:?}",
            base.effective_permissions
        ),
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{permission}'"),
            suggestions,
        }),
        ..base
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    pub key: String,
    pub description: String,
    pub permissions: Vec<String>,
    pub admin_area: bool,
}

/// Permission definition (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct PermissionSummary {
    pub name: String,
    pub description: String,
    pub category: String,
    pub well_formed: bool,
    pub granted_to: Vec<String>,
}

/// Complete view of one registry revision, for admin screens and the console.
#[derive(Debug, Clone, Serialize)]
pub struct RbacAudit {
    pub revision: u64,
    pub loaded_at: DateTime<Utc>,
    pub roles: Vec<RoleSummary>,
    pub permissions: Vec<PermissionSummary>,
    pub categories: Vec<String>,
}

impl RbacAudit {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let roles = snapshot
            .roles()
            .map(|definition| RoleSummary {
                key: definition.key.as_str().to_string(),
                description: definition.description.clone(),
                permissions: definition
                    .permissions
                    .iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
                admin_area: can_access_admin_area(definition.key.as_str()),
            })
            .collect();

        let permissions = snapshot
            .known_permissions()
            .iter()
            .map(|permission| PermissionSummary {
                name: permission.as_str().to_string(),
                description: snapshot.get_permission_description(permission.as_str()),
                category: permission.category().to_string(),
                well_formed: permission.is_valid(),
                granted_to: snapshot
                    .roles_granting(permission.as_str())
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect(),
            })
            .collect();

        Self {
            revision: snapshot.revision(),
            loaded_at: snapshot.loaded_at(),
            roles,
            permissions,
            categories: snapshot.get_categories().into_iter().collect(),
        }
    }
}
