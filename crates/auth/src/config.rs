//! RBAC configuration document and the sources it is read from.
//!
//! The document has two top-level maps:
//!
//! ```json
//! {
//!   "roles": { "customer": { "description": "...", "permissions": ["product:view"] } },
//!   "permission_descriptions": { "product:view": "View products" }
//! }
//! ```
//!
//! Permission tokens are taken verbatim; nothing here validates their format.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Built-in storefront document, embedded at compile time.
pub const DEFAULT_CONFIG_JSON: &str = include_str!("../config/permissions.json");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacConfig {
    pub roles: BTreeMap<String, RoleConfig>,
    #[serde(default)]
    pub permission_descriptions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rbac configuration from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rbac configuration from {origin}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("registry has been disposed")]
    Disposed,
}

impl RbacConfig {
    /// The embedded storefront document.
    pub fn storefront() -> Result<Self, ConfigError> {
        Self::from_json_str(DEFAULT_CONFIG_JSON, "embedded storefront config")
    }

    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text, &path.display().to_string())
    }

    /// Tokens (from roles or descriptions) that do not match `category:action`.
    pub fn invalid_permissions(&self) -> Vec<String> {
        let mut invalid: Vec<String> = self
            .roles
            .values()
            .flat_map(|role| role.permissions.iter())
            .chain(self.permission_descriptions.keys())
            .filter(|token| !crate::is_valid_permission(token))
            .cloned()
            .collect();
        invalid.sort();
        invalid.dedup();
        invalid
    }
}

/// Backing store the registry re-reads on `reload()`.
pub trait ConfigSource: Send + Sync {
    fn read(&self) -> Result<RbacConfig, ConfigError>;

    /// Human-readable origin used in log lines.
    fn describe(&self) -> String;
}

impl<S> ConfigSource for Arc<S>
where
    S: ConfigSource + ?Sized,
{
    fn read(&self) -> Result<RbacConfig, ConfigError> {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A fixed document held in memory (the embedded default, or caller text).
#[derive(Debug, Clone)]
pub struct StaticSource {
    text: &'static str,
}

impl StaticSource {
    pub fn new(text: &'static str) -> Self {
        Self { text }
    }

    pub fn storefront() -> Self {
        Self::new(DEFAULT_CONFIG_JSON)
    }
}

impl ConfigSource for StaticSource {
    fn read(&self) -> Result<RbacConfig, ConfigError> {
        RbacConfig::from_json_str(self.text, "static source")
    }

    fn describe(&self) -> String {
        "static source".to_string()
    }
}

/// A JSON document on disk, re-read on every reload.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for JsonFileSource {
    fn read(&self) -> Result<RbacConfig, ConfigError> {
        RbacConfig::from_json_file(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Replaceable in-memory text, for config pushes and tests.
#[derive(Debug, Default)]
pub struct InMemorySource {
    text: Mutex<String>,
}

impl InMemorySource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
        }
    }

    /// Replace the document; takes effect on the next reload.
    pub fn replace(&self, text: impl Into<String>) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }
}

impl ConfigSource for InMemorySource {
    fn read(&self) -> Result<RbacConfig, ConfigError> {
        let text = self.text.lock().unwrap_or_else(PoisonError::into_inner);
        RbacConfig::from_json_str(&text, "in-memory source")
    }

    fn describe(&self) -> String {
        "in-memory source".to_string()
    }
}
