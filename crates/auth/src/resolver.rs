//! Effective-role resolution.
//!
//! Every place that turns a session identity into a role goes through
//! [`RoleResolver::resolve`]. The result is never cached: it is recomputed from
//! the identity on every authorization query.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Identity, Role};

/// Account type that promotes an identity to the highest-privilege role.
pub const ELEVATED_ACCOUNT_TYPE: &str = "elevated-account";

/// What the session layer currently knows about the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// Initial identity fetch has not completed yet.
    Pending,
    /// Known to be nobody.
    Anonymous,
    Authenticated(Identity),
}

impl IdentityState {
    pub fn is_pending(&self) -> bool {
        matches!(self, IdentityState::Pending)
    }

    /// The identity record, if known. `Pending` counts as absent.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityState::Authenticated(identity) => Some(identity),
            IdentityState::Pending | IdentityState::Anonymous => None,
        }
    }
}

/// Session collaborator the access layer reads identity from.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> IdentityState;
}

/// In-process session holder. Starts in `Pending`.
#[derive(Debug)]
pub struct SessionStore {
    state: RwLock<IdentityState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IdentityState::Pending),
        }
    }

    pub fn with_state(state: IdentityState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn begin_loading(&self) {
        self.set(IdentityState::Pending);
    }

    pub fn sign_in(&self, identity: Identity) {
        self.set(IdentityState::Authenticated(identity));
    }

    pub fn sign_out(&self) {
        self.set(IdentityState::Anonymous);
    }

    fn set(&self, state: IdentityState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionStore {
    fn current(&self) -> IdentityState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Account type that overrides the stored role; `None` disables the
    /// override entirely.
    pub elevated_account_type: Option<String>,

    /// Role granted to elevated accounts.
    pub highest_role: Role,

    /// Role for signed-in identities without an assignment.
    pub default_role: Role,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            elevated_account_type: Some(ELEVATED_ACCOUNT_TYPE.to_string()),
            highest_role: Role::ADMIN,
            default_role: Role::CUSTOMER,
        }
    }
}

/// Derives exactly one effective role from an identity. Pure; no I/O.
#[derive(Debug, Clone, Default)]
pub struct RoleResolver {
    options: ResolverOptions,
}

impl RoleResolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolution order:
    /// 1. no identity: `public`
    /// 2. no role assignment: the default role (`customer`)
    /// 3. elevated account type: the highest role, whatever is stored
    /// 4. otherwise the stored role key, verbatim (not checked against the
    ///    registry)
    pub fn resolve(&self, identity: Option<&Identity>) -> Role {
        let Some(identity) = identity else {
            return Role::PUBLIC;
        };

        let Some(assigned) = &identity.role else {
            return self.options.default_role.clone();
        };

        if self.is_elevated(identity) {
            tracing::debug!(
                principal_id = %identity.principal_id,
                stored_role = %assigned,
                effective_role = %self.options.highest_role,
                "account type overrides stored role"
            );
            return self.options.highest_role.clone();
        }

        assigned.clone()
    }

    pub fn resolve_state(&self, state: &IdentityState) -> Role {
        self.resolve(state.identity())
    }

    fn is_elevated(&self, identity: &Identity) -> bool {
        match (&self.options.elevated_account_type, &identity.account_type) {
            (Some(sentinel), Some(account_type)) => sentinel == account_type,
            _ => false,
        }
    }
}

/// [`RoleResolver::resolve`] with default options.
pub fn effective_role(identity: Option<&Identity>) -> Role {
    RoleResolver::default().resolve(identity)
}
