//! Route permission matcher.
//!
//! A route table is an ordered list of path patterns. `:name` segments match
//! any single non-empty segment. Rules are tried in declaration order and the
//! first structural match wins; there is no specificity sorting, so tables must
//! list narrower rules before broader prefix rules that would cover them.
//! [`RouteTable::shadowed_rules`] reports rules an earlier rule makes
//! unreachable.
//!
//! Nothing is cached between checks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Role, UnmatchedPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The whole path must match the pattern.
    #[default]
    Exact,
    /// The pattern must match the leading segments of the path.
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    #[serde(alias = "path")]
    pub pattern: String,
    pub access: AccessLevel,
    #[serde(alias = "roles")]
    pub allowed_roles: Vec<Role>,
    #[serde(default)]
    pub mode: MatchMode,
}

impl RouteRule {
    pub fn new(
        pattern: impl Into<String>,
        access: AccessLevel,
        mode: MatchMode,
        allowed_roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            access,
            allowed_roles: allowed_roles.into_iter().collect(),
            mode,
        }
    }

    pub fn allows(&self, role: &Role) -> bool {
        self.allowed_roles.contains(role)
    }
}

#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("route pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("route pattern '{0}' has an unnamed ':' parameter")]
    EmptyParameter(String),

    #[error("route pattern '{pattern}' declares parameter '{name}' twice")]
    DuplicateParameter { pattern: String, name: String },

    #[error("failed to parse route table")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == candidate,
            Segment::Param(_) => true,
        }
    }

    /// True if every segment `other` accepts is also accepted by `self`.
    fn covers(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Param(_), _) => true,
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Literal(_), Segment::Param(_)) => false,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: RouteRule,
    segments: Vec<Segment>,
}

impl CompiledRule {
    fn compile(rule: RouteRule) -> Result<Self, RouteTableError> {
        if !rule.pattern.starts_with('/') {
            return Err(RouteTableError::MissingLeadingSlash(rule.pattern));
        }

        let mut seen = BTreeSet::new();
        let mut segments = Vec::new();
        for raw in split_segments(&rule.pattern) {
            match raw.strip_prefix(':') {
                Some("") => return Err(RouteTableError::EmptyParameter(rule.pattern.clone())),
                Some(name) => {
                    if !seen.insert(name.to_string()) {
                        return Err(RouteTableError::DuplicateParameter {
                            pattern: rule.pattern.clone(),
                            name: name.to_string(),
                        });
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        Ok(Self {
            rule,
            segments,
        })
    }

    /// `parts` are the normalised, non-empty segments of the candidate path.
    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        match self.rule.mode {
            MatchMode::Exact => {
                if parts.len() != self.segments.len() {
                    return None;
                }
                self.capture(parts)
            }
            MatchMode::Prefix => {
                if parts.len() < self.segments.len() {
                    return None;
                }
                self.capture(&parts[..self.segments.len()])
            }
        }
    }

    fn capture(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            if !segment.matches(part) {
                return None;
            }
            if let Segment::Param(name) = segment {
                params.insert(name.clone(), (*part).to_string());
            }
        }
        Some(params)
    }

    /// True if every path this rule's successor `later` matches is already
    /// matched by `self`.
    fn covers(&self, later: &CompiledRule) -> bool {
        match (self.rule.mode, later.rule.mode) {
            (MatchMode::Prefix, _) => {
                self.segments.len() <= later.segments.len()
                    && self
                        .segments
                        .iter()
                        .zip(&later.segments)
                        .all(|(a, b)| a.covers(b))
            }
            (MatchMode::Exact, MatchMode::Exact) => {
                self.segments.len() == later.segments.len()
                    && self
                        .segments
                        .iter()
                        .zip(&later.segments)
                        .all(|(a, b)| a.covers(b))
            }
            (MatchMode::Exact, MatchMode::Prefix) => false,
        }
    }
}

/// Drop query string and fragment; ignore a trailing slash (except for root).
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    normalize(path).split('/').filter(|segment| !segment.is_empty())
}

/// First matching rule for a path, with captured parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub index: usize,
    pub rule: &'a RouteRule,
    pub params: BTreeMap<String, String>,
}

/// A rule no path can ever reach, and the earlier rule that hides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowedRule {
    pub index: usize,
    pub pattern: String,
    pub shadowed_by: usize,
    pub shadowed_by_pattern: String,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<CompiledRule>,
}

impl RouteTable {
    pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Result<Self, RouteTableError> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// JSON array of rules, in evaluation order.
    pub fn from_json_str(text: &str) -> Result<Self, RouteTableError> {
        let rules: Vec<RouteRule> = serde_json::from_str(text)?;
        Self::new(rules)
    }

    /// Built-in storefront and admin console routes.
    pub fn storefront() -> Result<Self, RouteTableError> {
        use AccessLevel::*;
        use MatchMode::*;

        let everyone = || [Role::PUBLIC, Role::CUSTOMER, Role::STAFF, Role::ADMIN];
        let signed_in = || [Role::CUSTOMER, Role::STAFF, Role::ADMIN];

        Self::new([
            RouteRule::new("/", Public, Exact, everyone()),
            RouteRule::new("/login", Public, Exact, everyone()),
            RouteRule::new("/register", Public, Exact, everyone()),
            RouteRule::new("/products", Public, Prefix, everyone()),
            RouteRule::new("/categories/:slug", Public, Exact, everyone()),
            RouteRule::new("/cart", Authenticated, Exact, signed_in()),
            RouteRule::new("/checkout", Authenticated, Prefix, signed_in()),
            RouteRule::new("/orders/:id", Authenticated, Exact, signed_in()),
            RouteRule::new("/orders", Authenticated, Exact, signed_in()),
            RouteRule::new("/account", Authenticated, Prefix, signed_in()),
            RouteRule::new("/admin/users", Admin, Prefix, [Role::ADMIN]),
            RouteRule::new("/admin/settings", Admin, Prefix, [Role::ADMIN]),
            RouteRule::new("/admin", Admin, Prefix, [Role::ADMIN, Role::STAFF]),
        ])
    }

    pub fn rules(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        let parts: Vec<&str> = split_segments(path).collect();
        self.rules
            .iter()
            .enumerate()
            .find_map(|(index, compiled)| {
                compiled.matches(&parts).map(|params| RouteMatch {
                    index,
                    rule: &compiled.rule,
                    params,
                })
            })
    }

    /// `role` of `None` is treated as `public`. Unmatched paths follow
    /// `unmatched`.
    pub fn check(&self, path: &str, role: Option<&Role>, unmatched: UnmatchedPolicy) -> bool {
        let public = Role::PUBLIC;
        let role = role.unwrap_or(&public);

        match self.match_path(path) {
            Some(found) => found.rule.allows(role),
            None => {
                tracing::debug!(path, role = %role, policy = %unmatched, "no route rule matched");
                unmatched == UnmatchedPolicy::Allow
            }
        }
    }

    pub fn shadowed_rules(&self) -> Vec<ShadowedRule> {
        let mut shadowed = Vec::new();
        for (index, later) in self.rules.iter().enumerate() {
            if let Some((by, earlier)) = self.rules[..index]
                .iter()
                .enumerate()
                .find(|(_, earlier)| earlier.covers(later))
            {
                shadowed.push(ShadowedRule {
                    index,
                    pattern: later.rule.pattern.clone(),
                    shadowed_by: by,
                    shadowed_by_pattern: earlier.rule.pattern.clone(),
                });
            }
        }
        shadowed
    }
}

/// `checkRoutePermission` with the fail-open default.
pub fn check_route_permission(table: &RouteTable, path: &str, role: Option<&Role>) -> bool {
    table.check(path, role, UnmatchedPolicy::Allow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_only() -> RouteTable {
        RouteTable::new([RouteRule::new(
            "/admin",
            AccessLevel::Admin,
            MatchMode::Prefix,
            [Role::ADMIN],
        )])
        .unwrap()
    }

    #[test]
    fn prefix_rule_scenario() {
        let table = admin_only();
        assert!(check_route_permission(&table, "/admin/orders", Some(&Role::ADMIN)));
        assert!(!check_route_permission(&table, "/admin/orders", Some(&Role::CUSTOMER)));
        assert!(check_route_permission(&table, "/unmapped/path", Some(&Role::CUSTOMER)));
    }

    #[test]
    fn missing_role_is_public() {
        let table = admin_only();
        assert!(!check_route_permission(&table, "/admin", None));
        assert!(check_route_permission(&table, "/", None));
    }

    #[test]
    fn doubled_slashes_cannot_slip_past_literal_exact_rules() {
        let table = RouteTable::new([
            RouteRule::new("/admin/settings", AccessLevel::Admin, MatchMode::Exact, [Role::ADMIN]),
            RouteRule::new("/orders/:id", AccessLevel::Authenticated, MatchMode::Exact, [Role::CUSTOMER]),
        ])
        .unwrap();

        for path in ["/admin//settings", "//admin/settings/", "/admin/settings//?tab=1"] {
            let found = table.match_path(path).map(|m| m.index);
            assert_eq!(found, Some(0), "{path} should hit the literal rule");
            assert!(!check_route_permission(&table, path, None), "{path} allowed for public");
        }
        assert_eq!(table.match_path("/orders//5").map(|m| m.index), Some(1));
        assert!(check_route_permission(&table, "/admin//settings", Some(&Role::ADMIN)));
    }

    #[test]
    fn strict_policy_denies_unmatched() {
        let table = admin_only();
        assert!(!table.check("/unmapped", Some(&Role::ADMIN), UnmatchedPolicy::Deny));
        assert!(table.check("/admin", Some(&Role::ADMIN), UnmatchedPolicy::Deny));
    }

    #[test]
    fn prefix_respects_segment_boundaries() {
        let table = admin_only();
        assert!(table.match_path("/admin").is_some());
        assert!(table.match_path("/admin/").is_some());
        assert!(table.match_path("/administrator").is_none());
    }

    #[test]
    fn exact_literal_ignores_query_and_trailing_slash() {
        let table = RouteTable::new([RouteRule::new(
            "/cart",
            AccessLevel::Authenticated,
            MatchMode::Exact,
            [Role::CUSTOMER],
        )])
        .unwrap();
        assert!(table.match_path("/cart").is_some());
        assert!(table.match_path("/cart/?step=2").is_some());
        assert!(table.match_path("/cart#summary").is_some());
        assert!(table.match_path("/cart/items").is_none());
    }

    #[test]
    fn parameters_match_single_segments_and_are_captured() {
        let table = RouteTable::new([RouteRule::new(
            "/orders/:id/items/:item",
            AccessLevel::Authenticated,
            MatchMode::Exact,
            [Role::CUSTOMER],
        )])
        .unwrap();

        let found = table.match_path("/orders/42/items/7").unwrap();
        assert_eq!(found.params["id"], "42");
        assert_eq!(found.params["item"], "7");

        assert!(table.match_path("/orders/42/items").is_none());
        assert!(table.match_path("/orders/42/items/7/extra").is_none());
        assert!(table.match_path("/orders//items/7").is_none());
    }

    #[test]
    fn parametric_prefix_rule() {
        let table = RouteTable::new([RouteRule::new(
            "/admin/products/:id",
            AccessLevel::Admin,
            MatchMode::Prefix,
            [Role::ADMIN, Role::STAFF],
        )])
        .unwrap();

        let found = table.match_path("/admin/products/9/edit").unwrap();
        assert_eq!(found.params["id"], "9");
        assert!(table.match_path("/admin/products").is_none());
    }

    #[test]
    fn first_match_wins_in_declaration_order() {
        let table = RouteTable::new([
            RouteRule::new("/admin", AccessLevel::Admin, MatchMode::Prefix, [Role::ADMIN, Role::STAFF]),
            RouteRule::new("/admin/users", AccessLevel::Admin, MatchMode::Prefix, [Role::ADMIN]),
        ])
        .unwrap();

        let found = table.match_path("/admin/users/3").unwrap();
        assert_eq!(found.index, 0);
        assert!(table.check("/admin/users/3", Some(&Role::STAFF), UnmatchedPolicy::Deny));

        let shadowed = table.shadowed_rules();
        assert_eq!(shadowed.len(), 1);
        assert_eq!(shadowed[0].index, 1);
        assert_eq!(shadowed[0].shadowed_by, 0);
    }

    #[test]
    fn storefront_table_is_ordered_narrow_first() {
        let table = RouteTable::storefront().unwrap();
        assert!(table.shadowed_rules().is_empty());

        assert!(table.check("/admin/users", Some(&Role::ADMIN), UnmatchedPolicy::Deny));
        assert!(!table.check("/admin/users", Some(&Role::STAFF), UnmatchedPolicy::Deny));
        assert!(table.check("/admin/orders", Some(&Role::STAFF), UnmatchedPolicy::Deny));
        assert!(table.check("/products/15", None, UnmatchedPolicy::Deny));
        assert!(!table.check("/orders/15", None, UnmatchedPolicy::Deny));
        assert!(table.check("/orders/15", Some(&Role::CUSTOMER), UnmatchedPolicy::Deny));
        assert_eq!(table.match_path("/").map(|m| m.index), Some(0));
    }

    #[test]
    fn rejects_malformed_patterns() {
        let rule = |pattern: &str| {
            RouteRule::new(pattern.to_string(), AccessLevel::Public, MatchMode::Exact, [Role::PUBLIC])
        };
        assert!(matches!(
            RouteTable::new([rule("admin")]),
            Err(RouteTableError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            RouteTable::new([rule("/orders/:")]),
            Err(RouteTableError::EmptyParameter(_))
        ));
        assert!(matches!(
            RouteTable::new([rule("/a/:id/b/:id")]),
            Err(RouteTableError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn loads_from_json() {
        let table = RouteTable::from_json_str(
            r#"[
                { "path": "/admin", "access": "admin", "mode": "prefix", "roles": ["admin"] },
                { "pattern": "/about", "access": "public", "allowed_roles": ["public", "customer"] }
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rules().nth(1).map(|r| r.mode), Some(MatchMode::Exact));
        assert!(table.check("/about", None, UnmatchedPolicy::Deny));
        assert!(!table.check("/about", Some(&Role::STAFF), UnmatchedPolicy::Allow));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_path() -> impl Strategy<Value = String> {
            proptest::collection::vec(
                prop_oneof![
                    Just("admin".to_string()),
                    Just("products".to_string()),
                    Just("orders".to_string()),
                    Just("users".to_string()),
                    "[a-z0-9]{1,6}",
                ],
                0..5,
            )
            .prop_map(|segments| format!("/{}", segments.join("/")))
        }

        fn any_role() -> impl Strategy<Value = Option<Role>> {
            prop_oneof![
                Just(None),
                Just(Some(Role::PUBLIC)),
                Just(Some(Role::CUSTOMER)),
                Just(Some(Role::STAFF)),
                Just(Some(Role::ADMIN)),
                "[a-z]{1,8}".prop_map(|r| Some(Role::new(r))),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: identical inputs give identical answers.
            #[test]
            fn route_check_is_deterministic(path in any_path(), role in any_role()) {
                let table = RouteTable::storefront().unwrap();
                let first = check_route_permission(&table, &path, role.as_ref());
                let second = check_route_permission(&table, &path, role.as_ref());
                prop_assert_eq!(first, second);
            }

            /// Property: unmatched paths follow the policy, matched paths the rule.
            #[test]
            fn decision_is_rule_or_policy(path in any_path(), role in any_role()) {
                let table = RouteTable::storefront().unwrap();
                let effective = role.clone().unwrap_or(Role::PUBLIC);
                match table.match_path(&path) {
                    Some(found) => {
                        let expected = found.rule.allows(&effective);
                        prop_assert_eq!(table.check(&path, role.as_ref(), UnmatchedPolicy::Allow), expected);
                        prop_assert_eq!(table.check(&path, role.as_ref(), UnmatchedPolicy::Deny), expected);
                    }
                    None => {
                        prop_assert!(table.check(&path, role.as_ref(), UnmatchedPolicy::Allow));
                        prop_assert!(!table.check(&path, role.as_ref(), UnmatchedPolicy::Deny));
                    }
                }
            }
        }
    }
}
