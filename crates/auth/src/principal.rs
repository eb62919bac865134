use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;

/// Identity of a signed-in shopper or staff member.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Identity record as handed over by the session layer.
///
/// The session layer authenticates; this crate only reads the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal_id: PrincipalId,

    /// Explicit role assignment, if any.
    #[serde(default)]
    pub role: Option<Role>,

    /// Secondary account classification (e.g. `"elevated-account"`).
    #[serde(default)]
    pub account_type: Option<String>,
}

impl Identity {
    /// Signed-in identity with no role assignment and no account type.
    pub fn new(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            role: None,
            account_type: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_account_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = Some(account_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_deserializes_with_missing_optionals() {
        let id = PrincipalId::new();
        let json = format!(r#"{{ "principal_id": "{id}" }}"#);
        let identity: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity, Identity::new(id));
    }

    #[test]
    fn principal_id_parses_from_string() {
        let id = PrincipalId::new();
        let parsed: PrincipalId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<PrincipalId>().is_err());
    }
}
