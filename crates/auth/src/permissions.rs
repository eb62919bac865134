use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque `category:action` tokens (e.g. `"product:create"`).
/// The registry accepts malformed tokens as-is; callers that care about the
/// format check it with [`is_valid_permission`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix before the first `:`; the whole token when there is no colon.
    pub fn category(&self) -> &str {
        match self.as_str().split_once(':') {
            Some((category, _)) => category,
            None => self.as_str(),
        }
    }

    /// Suffix after the first `:`, if any.
    pub fn action(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(_, action)| action)
    }

    pub fn is_valid(&self) -> bool {
        is_valid_permission(self.as_str())
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Check a token against `[a-z_]+:[a-z_]+`.
///
/// Never enforced by the registry itself.
pub fn is_valid_permission(token: &str) -> bool {
    fn is_part(part: &str) -> bool {
        !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b == b'_')
    }

    match token.split_once(':') {
        Some((category, action)) => is_part(category) && is_part(action),
        None => false,
    }
}
