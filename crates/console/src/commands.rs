use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use storefront_auth::explain::explain_permission;
use storefront_auth::routes::ShadowedRule;
use storefront_auth::{
    AccessPolicy, ApiPermissionMap, ApiRequirement, ConfigSource, JsonFileSource,
    PermissionRegistry, RbacAudit, RbacConfig, Role, RouteTable, StaticSource,
};

use crate::SourceArgs;

/// Everything one invocation decides against.
pub struct Workspace {
    source: String,
    config: RbacConfig,
    registry: PermissionRegistry,
    routes: RouteTable,
    api: ApiPermissionMap,
    policy: AccessPolicy,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub revision: u64,
    pub roles: usize,
    pub invalid_permissions: Vec<String>,
    pub shadowed_routes: Vec<ShadowedRule>,
}

impl ValidationReport {
    pub fn problem_count(&self) -> usize {
        self.invalid_permissions.len() + self.shadowed_routes.len()
    }

    pub fn is_clean(&self) -> bool {
        self.problem_count() == 0
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

impl Workspace {
    pub fn load(args: &SourceArgs) -> Result<Self> {
        let source: Arc<dyn ConfigSource> = match &args.config {
            Some(path) => Arc::new(JsonFileSource::new(path)),
            None => Arc::new(StaticSource::storefront()),
        };
        let config = source.read()?;
        let described = source.describe();

        let registry = PermissionRegistry::new(source);
        registry.load(&config);

        let routes = match &args.routes {
            Some(path) => RouteTable::from_json_str(&read_text(path)?)
                .with_context(|| format!("route table {}", path.display()))?,
            None => RouteTable::storefront()?,
        };
        let api = match &args.api_rules {
            Some(path) => ApiPermissionMap::from_json_str(&read_text(path)?)
                .with_context(|| format!("api rules {}", path.display()))?,
            None => ApiPermissionMap::storefront(),
        };
        let policy = if args.strict {
            AccessPolicy::strict()
        } else {
            AccessPolicy::from_env()
        };

        tracing::debug!(source = %described, routes = routes.len(), ?policy, "console workspace loaded");

        Ok(Self {
            source: described,
            config,
            registry,
            routes,
            api,
            policy,
        })
    }

    pub fn audit(&self) -> Result<Value> {
        Ok(serde_json::to_value(RbacAudit::from_snapshot(
            &self.registry.snapshot(),
        ))?)
    }

    pub fn validate(&self) -> ValidationReport {
        ValidationReport {
            source: self.source.clone(),
            revision: self.registry.revision(),
            roles: self.config.roles.len(),
            invalid_permissions: self.config.invalid_permissions(),
            shadowed_routes: self.routes.shadowed_rules(),
        }
    }

    pub fn check_route(&self, path: &str, role: Option<&str>) -> Result<Value> {
        let role = role.map(|r| Role::new(r.to_string()));
        let matched = self.routes.match_path(path).map(|found| {
            json!({
                "index": found.index,
                "pattern": found.rule.pattern,
                "access": found.rule.access,
                "mode": found.rule.mode,
                "params": found.params,
            })
        });
        let allowed = self
            .routes
            .check(path, role.as_ref(), self.policy.unmatched_routes);

        Ok(json!({
            "path": path,
            "role": role.as_ref().map_or(Role::PUBLIC.as_str(), Role::as_str),
            "matched": matched,
            "unmatched_policy": self.policy.unmatched_routes,
            "allowed": allowed,
        }))
    }

    pub fn check_api(&self, endpoint: &str, verb: &str, role: &str) -> Result<Value> {
        let role = Role::new(role.to_string());
        let required = match self.api.requirement(endpoint, verb) {
            ApiRequirement::Permission(permission) => Some(permission),
            ApiRequirement::Unmatched => None,
        };
        let allowed = self.api.check(
            &self.registry.snapshot(),
            &role,
            endpoint,
            verb,
            self.policy.unmatched_api,
        );

        Ok(json!({
            "endpoint": endpoint,
            "verb": verb,
            "role": role,
            "required_permission": required,
            "unmatched_policy": self.policy.unmatched_api,
            "allowed": allowed,
        }))
    }

    pub fn explain(&self, role: &str, permission: &str) -> Result<Value> {
        let explanation = explain_permission(
            &self.registry.snapshot(),
            &Role::new(role.to_string()),
            permission,
        );
        Ok(serde_json::to_value(explanation)?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn defaults() -> SourceArgs {
        SourceArgs {
            config: None,
            routes: None,
            api_rules: None,
            strict: false,
        }
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("storefront-console-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn builtin_workspace_validates_clean() {
        let workspace = Workspace::load(&defaults()).unwrap();
        let report = workspace.validate();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.roles, 4);
        assert_eq!(report.revision, 1);
    }

    #[test]
    fn audit_lists_roles() {
        let workspace = Workspace::load(&defaults()).unwrap();
        let audit = workspace.audit().unwrap();
        assert_eq!(audit["roles"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn route_check_reports_match_and_params() {
        let workspace = Workspace::load(&SourceArgs {
            strict: true,
            ..defaults()
        })
        .unwrap();

        let out = workspace.check_route("/admin/orders", Some("staff")).unwrap();
        assert_eq!(out["allowed"], true);
        assert!(out["matched"]["pattern"].as_str().unwrap().starts_with("/admin"));

        let unmatched = workspace.check_route("/nowhere", Some("admin")).unwrap();
        assert_eq!(unmatched["matched"], Value::Null);
        assert_eq!(unmatched["allowed"], false);
        assert_eq!(unmatched["role"], "admin");
    }

    #[test]
    fn api_check_names_required_permission() {
        let workspace = Workspace::load(&defaults()).unwrap();
        let out = workspace.check_api("/products/123", "DELETE", "staff").unwrap();
        assert_eq!(out["required_permission"], "product:delete");
        assert_eq!(out["allowed"], false);
    }

    #[test]
    fn explain_round_trips_through_json() {
        let workspace = Workspace::load(&defaults()).unwrap();
        let out = workspace.explain("admin", "settings:update").unwrap();
        assert_eq!(out["granted"], true);
    }

    #[test]
    fn file_sources_are_validated() {
        let config = temp_file(
            "rbac.json",
            r#"{ "roles": { "customer": { "permissions": ["product:view", "Checkout"] } } }"#,
        );
        let routes = temp_file(
            "routes.json",
            r#"[
                { "path": "/account", "access": "authenticated", "roles": ["customer"], "mode": "prefix" },
                { "path": "/account/orders", "access": "authenticated", "roles": ["customer"] }
            ]"#,
        );

        let workspace = Workspace::load(&SourceArgs {
            config: Some(config.clone()),
            routes: Some(routes.clone()),
            ..defaults()
        })
        .unwrap();
        let report = workspace.validate();

        assert_eq!(report.invalid_permissions, vec!["Checkout".to_string()]);
        assert_eq!(report.shadowed_routes.len(), 1);
        assert_eq!(report.shadowed_routes[0].shadowed_by, 0);
        assert_eq!(report.problem_count(), 2);

        let _ = std::fs::remove_file(config);
        let _ = std::fs::remove_file(routes);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = Workspace::load(&SourceArgs {
            config: Some(PathBuf::from("/definitely/not/here.json")),
            ..defaults()
        });
        assert!(result.is_err());
    }
}
