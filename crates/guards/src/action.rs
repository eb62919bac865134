//! Permission-aware buttons and links.

use serde::{Deserialize, Serialize};

use storefront_auth::{AccessControl, Role};

use crate::Requirement;

/// How a denied control is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialMode {
    #[default]
    Hide,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControlState {
    Enabled,
    Disabled { reason: String },
    Hidden,
}

impl ControlState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, ControlState::Hidden)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ControlState::Enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionControl {
    requirement: Option<Requirement>,
    role: Option<Role>,
    denial: DenialMode,
    reason: Option<String>,
}

impl ActionControl {
    pub fn new(requirement: impl Into<Requirement>) -> Self {
        Self {
            requirement: Some(requirement.into()),
            role: None,
            denial: DenialMode::default(),
            reason: None,
        }
    }

    /// Control gated on role equality alone.
    pub fn for_role(role: impl Into<Role>) -> Self {
        Self {
            requirement: None,
            role: Some(role.into()),
            denial: DenialMode::default(),
            reason: None,
        }
    }

    /// Checked before the requirement; a mismatch denies outright.
    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_denial(mut self, denial: DenialMode) -> Self {
        self.denial = denial;
        self
    }

    /// Text shown on a disabled control instead of the generated reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn evaluate(&self, access: &AccessControl) -> ControlState {
        if access.identity_state().is_pending() {
            return self.deny("Checking your access".to_string());
        }

        if let Some(role) = &self.role {
            if !access.has_role(role.as_str()) {
                return self.deny(format!("Requires role '{role}'"));
            }
        }

        match &self.requirement {
            Some(requirement) if !requirement.is_satisfied_by(access) => {
                self.deny(format!("Requires {requirement}"))
            }
            _ => ControlState::Enabled,
        }
    }

    fn deny(&self, generated: String) -> ControlState {
        match self.denial {
            DenialMode::Hide => ControlState::Hidden,
            DenialMode::Disable => ControlState::Disabled {
                reason: self.reason.clone().unwrap_or(generated),
            },
        }
    }
}
