//! Navigation-level guard: render, wait or redirect.

use thiserror::Error;

use storefront_auth::{AccessControl, IdentityState};

use crate::Requirement;

pub const DEFAULT_FALLBACK: &str = "/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("redirect target '{0}' must be an absolute path")]
    InvalidRedirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity is still being resolved; show a loading indicator.
    Loading,
    Render,
    Redirect { to: String },
}

fn redirect_target(path: impl Into<String>) -> Result<String, GuardError> {
    let path = path.into();
    if path.starts_with('/') && !path.starts_with("//") {
        Ok(path)
    } else {
        Err(GuardError::InvalidRedirect(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    requirement: Requirement,
    fallback: String,
    login: Option<String>,
}

impl RouteGuard {
    pub fn new(requirement: impl Into<Requirement>) -> Self {
        Self {
            requirement: requirement.into(),
            fallback: DEFAULT_FALLBACK.to_string(),
            login: None,
        }
    }

    /// Where denied visitors go.
    pub fn with_fallback(mut self, path: impl Into<String>) -> Result<Self, GuardError> {
        self.fallback = redirect_target(path)?;
        Ok(self)
    }

    /// Where anonymous visitors go instead of the fallback.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Result<Self, GuardError> {
        self.login = Some(redirect_target(path)?);
        Ok(self)
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn evaluate(&self, access: &AccessControl) -> GuardDecision {
        let state = access.identity_state();
        if state.is_pending() {
            return GuardDecision::Loading;
        }
        if self.requirement.is_satisfied_by(access) {
            return GuardDecision::Render;
        }

        let to = match (&state, &self.login) {
            (IdentityState::Anonymous, Some(login)) => login.clone(),
            _ => self.fallback.clone(),
        };
        tracing::debug!(requirement = %self.requirement, redirect = %to, "route guard denied");
        GuardDecision::Redirect { to }
    }
}
