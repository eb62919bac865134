//! Partial hiding: children, a fallback, or nothing.

use storefront_auth::AccessControl;

use crate::Requirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateView<'a, F> {
    Children,
    Fallback(&'a F),
    Nothing,
}

impl<F> GateView<'_, F> {
    pub fn shows_children(&self) -> bool {
        matches!(self, GateView::Children)
    }
}

/// Conditional gate. `F` is whatever the host renders on denial.
#[derive(Debug, Clone)]
pub struct Gate<F = ()> {
    requirement: Requirement,
    fallback: Option<F>,
}

impl Gate {
    /// Gate that renders nothing on denial.
    pub fn new(requirement: impl Into<Requirement>) -> Self {
        Self {
            requirement: requirement.into(),
            fallback: None,
        }
    }
}

impl<F> Gate<F> {
    pub fn with_fallback<G>(self, fallback: G) -> Gate<G> {
        Gate {
            requirement: self.requirement,
            fallback: Some(fallback),
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Pending identity takes the denial branch so children never flash.
    pub fn evaluate(&self, access: &AccessControl) -> GateView<'_, F> {
        if !access.identity_state().is_pending() && self.requirement.is_satisfied_by(access) {
            return GateView::Children;
        }
        match &self.fallback {
            Some(fallback) => GateView::Fallback(fallback),
            None => GateView::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storefront_auth::{Identity, PermissionRegistry, PrincipalId, SessionStore};

    use super::*;

    fn setup() -> (Arc<SessionStore>, AccessControl) {
        let registry = Arc::new(PermissionRegistry::storefront().unwrap());
        let session = Arc::new(SessionStore::new());
        let access = AccessControl::storefront(registry, session.clone()).unwrap();
        (session, access)
    }

    #[test]
    fn default_fallback_is_nothing() {
        let (session, access) = setup();
        let gate = Gate::new(Requirement::permission("report:view"));

        session.sign_in(Identity::new(PrincipalId::new()));
        assert_eq!(gate.evaluate(&access), GateView::Nothing);

        session.sign_in(Identity::new(PrincipalId::new()).with_role("staff"));
        assert!(gate.evaluate(&access).shows_children());
    }

    #[test]
    fn denial_renders_caller_fallback() {
        let (session, access) = setup();
        let gate = Gate::new(Requirement::permission("cart:update")).with_fallback("Sign in to shop");

        session.sign_out();
        assert_eq!(gate.evaluate(&access), GateView::Fallback(&"Sign in to shop"));
    }

    #[test]
    fn pending_identity_hides_children() {
        let (_session, access) = setup();
        let gate = Gate::new(Requirement::permission("product:view")).with_fallback(0u8);
        assert_eq!(gate.evaluate(&access), GateView::Fallback(&0u8));
    }
}
