//! API endpoint to permission mapping, used to decide which action
//! affordances (create/edit/delete buttons) the UI exposes.
//!
//! Matching is substring containment of a known resource fragment in the
//! endpoint, not full path-template matching. Fragments are tried in table
//! order, so `/categories/5/products` resolves to whichever of the two
//! fragments is listed first.

use serde::{Deserialize, Serialize};

use crate::registry::RegistrySnapshot;
use crate::{Permission, Role, UnmatchedPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    /// Case-insensitive. Unknown verbs are `None`; they still map to `view`.
    pub fn parse(verb: &str) -> Option<Self> {
        match verb.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn action(self) -> ApiAction {
        match self {
            HttpVerb::Post => ApiAction::Create,
            HttpVerb::Put | HttpVerb::Patch => ApiAction::Update,
            HttpVerb::Delete => ApiAction::Delete,
            HttpVerb::Get | HttpVerb::Head | HttpVerb::Options => ApiAction::View,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiAction {
    View,
    Create,
    Update,
    Delete,
}

impl ApiAction {
    pub fn from_verb(verb: &str) -> Self {
        HttpVerb::parse(verb).map_or(ApiAction::View, HttpVerb::action)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiAction::View => "view",
            ApiAction::Create => "create",
            ApiAction::Update => "update",
            ApiAction::Delete => "delete",
        }
    }
}

/// Endpoints containing `fragment` require `<resource>:<action>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRule {
    pub fragment: String,
    pub resource: String,
}

impl ApiRule {
    pub fn new(fragment: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            resource: resource.into(),
        }
    }

    pub fn matches(&self, endpoint: &str) -> bool {
        endpoint.contains(self.fragment.as_str())
    }
}

/// What an endpoint/verb pair requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequirement {
    Permission(Permission),
    /// No fragment matched; the unmatched-API policy decides.
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiPermissionMap {
    rules: Vec<ApiRule>,
}

impl ApiPermissionMap {
    pub fn new(rules: impl IntoIterator<Item = ApiRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Resources the storefront backend exposes.
    pub fn storefront() -> Self {
        Self::new([
            ApiRule::new("/products", "product"),
            ApiRule::new("/categories", "category"),
            ApiRule::new("/orders", "order"),
            ApiRule::new("/users", "user"),
        ])
    }

    pub fn rules(&self) -> &[ApiRule] {
        &self.rules
    }

    pub fn requirement(&self, endpoint: &str, verb: &str) -> ApiRequirement {
        match self.required_permission(endpoint, verb) {
            Some(permission) => ApiRequirement::Permission(permission),
            None => ApiRequirement::Unmatched,
        }
    }

    pub fn required_permission(&self, endpoint: &str, verb: &str) -> Option<Permission> {
        let rule = self.rules.iter().find(|rule| rule.matches(endpoint))?;
        let action = ApiAction::from_verb(verb);
        Some(Permission::new(format!("{}:{}", rule.resource, action.as_str())))
    }

    /// May `role` use `verb` on `endpoint` under `snapshot`?
    pub fn check(
        &self,
        snapshot: &RegistrySnapshot,
        role: &Role,
        endpoint: &str,
        verb: &str,
        unmatched: UnmatchedPolicy,
    ) -> bool {
        match self.requirement(endpoint, verb) {
            ApiRequirement::Permission(permission) => {
                snapshot.has_permission(role.as_str(), permission.as_str())
            }
            ApiRequirement::Unmatched => {
                tracing::debug!(endpoint, verb, role = %role, policy = %unmatched, "no api rule matched");
                match unmatched {
                    UnmatchedPolicy::Allow => allow_if_authenticated(role),
                    UnmatchedPolicy::Deny => false,
                }
            }
        }
    }
}

impl Default for ApiPermissionMap {
    fn default() -> Self {
        Self::storefront()
    }
}

/// Unmatched endpoints under the `allow` policy: allowed for anyone signed in.
fn allow_if_authenticated(role: &Role) -> bool {
    !role.is_public()
}
