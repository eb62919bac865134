//! What to decide when no rule speaks about a path or endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNMATCHED_ROUTES_ENV: &str = "STOREFRONT_UNMATCHED_ROUTES";
pub const UNMATCHED_API_ENV: &str = "STOREFRONT_UNMATCHED_API";

/// Decision for a query no rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Fail open. For API endpoints this still requires a signed-in visitor.
    #[default]
    Allow,
    /// Fail closed.
    Deny,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown unmatched-rule policy '{0}' (expected 'allow' or 'deny')")]
pub struct ParsePolicyError(String);

impl core::str::FromStr for UnmatchedPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl core::fmt::Display for UnmatchedPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UnmatchedPolicy::Allow => f.write_str("allow"),
            UnmatchedPolicy::Deny => f.write_str("deny"),
        }
    }
}

/// Unmatched-rule policies, fixed when the access layer is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    pub unmatched_routes: UnmatchedPolicy,
    pub unmatched_api: UnmatchedPolicy,
}

impl AccessPolicy {
    /// Fail closed for both tables.
    pub fn strict() -> Self {
        Self {
            unmatched_routes: UnmatchedPolicy::Deny,
            unmatched_api: UnmatchedPolicy::Deny,
        }
    }

    /// Defaults overridden by `STOREFRONT_UNMATCHED_ROUTES` /
    /// `STOREFRONT_UNMATCHED_API`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(value) = read_env(UNMATCHED_ROUTES_ENV) {
            policy.unmatched_routes = value;
        }
        if let Some(value) = read_env(UNMATCHED_API_ENV) {
            policy.unmatched_api = value;
        }
        policy
    }
}

fn read_env(key: &str) -> Option<UnmatchedPolicy> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(policy) => Some(policy),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring invalid policy override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_open() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.unmatched_routes, UnmatchedPolicy::Allow);
        assert_eq!(policy.unmatched_api, UnmatchedPolicy::Allow);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" Deny ".parse::<UnmatchedPolicy>(), Ok(UnmatchedPolicy::Deny));
        assert_eq!("ALLOW".parse::<UnmatchedPolicy>(), Ok(UnmatchedPolicy::Allow));
        assert!("maybe".parse::<UnmatchedPolicy>().is_err());
    }

    #[test]
    fn deserializes_partial_documents() {
        let policy: AccessPolicy = serde_json::from_str(r#"{ "unmatched_api": "deny" }"#).unwrap();
        assert_eq!(policy.unmatched_routes, UnmatchedPolicy::Allow);
        assert_eq!(policy.unmatched_api, UnmatchedPolicy::Deny);
    }
}
