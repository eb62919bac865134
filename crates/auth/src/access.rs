//! Consumer-facing access API.
//!
//! [`AccessControl`] ties the registry, the session identity and the two
//! decision tables together. Every call re-reads the identity and re-resolves
//! the effective role; nothing is memoized across identity changes or
//! registry swaps.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::ApiPermissionMap;
use crate::explain::{AccessExplanation, explain_permission};
use crate::registry::{PermissionRegistry, RegistrySnapshot, Subscription, can_access_admin_area};
use crate::resolver::{IdentityProvider, IdentityState, RoleResolver};
use crate::routes::{RouteMatch, RouteTable, RouteTableError};
use crate::{AccessPolicy, Permission, Role};

pub struct AccessControl {
    registry: Arc<PermissionRegistry>,
    identity: Arc<dyn IdentityProvider>,
    resolver: RoleResolver,
    routes: RouteTable,
    api: ApiPermissionMap,
    policy: AccessPolicy,
}

impl AccessControl {
    /// Empty route table, storefront API rules, fail-open policy.
    pub fn new(registry: Arc<PermissionRegistry>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            registry,
            identity,
            resolver: RoleResolver::default(),
            routes: RouteTable::default(),
            api: ApiPermissionMap::storefront(),
            policy: AccessPolicy::default(),
        }
    }

    /// Built-in storefront route and API tables.
    pub fn storefront(
        registry: Arc<PermissionRegistry>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, RouteTableError> {
        Ok(Self::new(registry, identity).with_routes(RouteTable::storefront()?))
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_api_rules(mut self, api: ApiPermissionMap) -> Self {
        self.api = api;
        self
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolver(mut self, resolver: RoleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn api_rules(&self) -> &ApiPermissionMap {
        &self.api
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub fn identity_state(&self) -> IdentityState {
        self.identity.current()
    }

    pub fn effective_role(&self) -> Role {
        self.resolver.resolve_state(&self.identity.current())
    }

    /// One registry revision plus the role, for multi-step decisions.
    fn view(&self) -> (Arc<RegistrySnapshot>, Role) {
        (self.registry.snapshot(), self.effective_role())
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        let (snapshot, role) = self.view();
        snapshot.has_permission(role.as_str(), permission)
    }

    pub fn has_all_permissions<I, P>(&self, permissions: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let (snapshot, role) = self.view();
        snapshot.has_all_permissions(role.as_str(), permissions)
    }

    pub fn has_any_permission<I, P>(&self, permissions: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let (snapshot, role) = self.view();
        snapshot.has_any_permission(role.as_str(), permissions)
    }

    pub fn role_permissions(&self) -> BTreeSet<Permission> {
        let (snapshot, role) = self.view();
        snapshot.get_role_permissions(role.as_str())
    }

    /// Role equality against the effective role.
    pub fn has_role(&self, role: &str) -> bool {
        self.effective_role().as_str() == role
    }

    pub fn can_access_admin_area(&self) -> bool {
        can_access_admin_area(self.effective_role().as_str())
    }

    pub fn check_route(&self, path: &str) -> bool {
        let role = self.effective_role();
        self.routes.check(path, Some(&role), self.policy.unmatched_routes)
    }

    /// `checkRoutePermission` for an explicit role (`None` = public).
    pub fn check_route_for(&self, path: &str, role: Option<&Role>) -> bool {
        self.routes.check(path, role, self.policy.unmatched_routes)
    }

    pub fn match_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.match_path(path)
    }

    pub fn has_api_permission(&self, endpoint: &str, verb: &str) -> bool {
        let (snapshot, role) = self.view();
        self.api
            .check(&snapshot, &role, endpoint, verb, self.policy.unmatched_api)
    }

    pub fn explain(&self, permission: &str) -> AccessExplanation {
        let (snapshot, role) = self.view();
        explain_permission(&snapshot, &role, permission)
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RegistrySnapshot) + Send + Sync + 'static,
    {
        self.registry.subscribe(callback)
    }

    /// Fire-and-forget reload; see [`PermissionRegistry::reload`].
    pub fn reload(&self) -> Option<u64> {
        self.registry.reload()
    }
}

impl core::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessControl")
            .field("registry", &self.registry)
            .field("routes", &self.routes.len())
            .field("api_rules", &self.api.rules().len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ELEVATED_ACCOUNT_TYPE, SessionStore};
    use crate::{Identity, PrincipalId, UnmatchedPolicy};

    fn setup() -> (Arc<SessionStore>, AccessControl) {
        let registry = Arc::new(PermissionRegistry::storefront().unwrap());
        let session = Arc::new(SessionStore::new());
        let access = AccessControl::storefront(registry, session.clone()).unwrap();
        (session, access)
    }

    #[test]
    fn role_follows_session_on_every_call() {
        let (session, access) = setup();
        assert_eq!(access.effective_role(), Role::PUBLIC);
        assert!(!access.has_permission("cart:update"));

        session.sign_in(Identity::new(PrincipalId::new()));
        assert_eq!(access.effective_role(), Role::CUSTOMER);
        assert!(access.has_permission("cart:update"));

        session.sign_in(Identity::new(PrincipalId::new()).with_role("staff"));
        assert!(access.has_role("staff"));
        assert!(access.can_access_admin_area());
        assert!(!access.has_permission("cart:update"));

        session.sign_out();
        assert!(!access.can_access_admin_area());
    }

    #[test]
    fn elevated_account_gets_admin_everywhere() {
        let (session, access) = setup();
        session.sign_in(
            Identity::new(PrincipalId::new())
                .with_role("customer")
                .with_account_type(ELEVATED_ACCOUNT_TYPE),
        );

        assert!(access.has_role("admin"));
        assert!(access.has_permission("user:delete"));
        assert!(access.check_route("/admin/users"));
        assert!(access.has_api_permission("/users/9", "DELETE"));
    }

    #[test]
    fn composite_predicates() {
        let (session, access) = setup();
        session.sign_in(Identity::new(PrincipalId::new()).with_role("staff"));

        assert!(access.has_all_permissions(["product:create", "product:update"]));
        assert!(!access.has_all_permissions(["product:create", "product:delete"]));
        assert!(access.has_any_permission(["product:delete", "order:update"]));
        assert!(!access.has_any_permission(Vec::<String>::new()));
        assert!(access.role_permissions().contains("report:view"));
    }

    #[test]
    fn routes_and_api_use_effective_role() {
        let (session, access) = setup();
        assert!(!access.check_route("/checkout/payment"));
        assert!(access.check_route("/products/3"));
        assert!(access.check_route("/about-us"));
        assert!(!access.has_api_permission("/newsletter", "POST"));

        session.sign_in(Identity::new(PrincipalId::new()));
        assert!(access.check_route("/checkout/payment"));
        assert!(!access.check_route("/admin"));
        assert!(access.has_api_permission("/newsletter", "POST"));
        assert!(!access.has_api_permission("/products/3", "PUT"));
    }

    #[test]
    fn strict_policy_fails_closed() {
        let registry = Arc::new(PermissionRegistry::storefront().unwrap());
        let session = Arc::new(SessionStore::new());
        session.sign_in(Identity::new(PrincipalId::new()).with_role("admin"));
        let access = AccessControl::storefront(registry, session)
            .unwrap()
            .with_policy(AccessPolicy::strict());

        assert!(!access.check_route("/about-us"));
        assert!(!access.has_api_permission("/newsletter", "POST"));
        assert!(access.check_route("/admin/settings"));
        assert_eq!(access.policy().unmatched_routes, UnmatchedPolicy::Deny);
    }

    #[test]
    fn explicit_role_route_check() {
        let (_session, access) = setup();
        assert!(access.check_route_for("/admin/orders", Some(&Role::STAFF)));
        assert!(!access.check_route_for("/admin/orders", None));
    }

    #[test]
    fn explanation_uses_effective_role() {
        let (session, access) = setup();
        session.sign_in(Identity::new(PrincipalId::new()).with_role("staff"));
        let explanation = access.explain("product:delete");
        assert_eq!(explanation.role, "staff");
        assert!(!explanation.granted);
    }
}
