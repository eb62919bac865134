//! `storefront-auth` — the storefront's authorization core.
//!
//! A pure decision engine: no HTTP, no rendering, no authentication. It
//! consumes an already-resolved identity and answers "may this visitor do X".

pub mod access;
pub mod api;
pub mod config;
pub mod explain;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod resolver;
pub mod roles;
pub mod routes;

pub use access::AccessControl;
pub use api::{ApiAction, ApiPermissionMap, ApiRequirement, ApiRule, HttpVerb};
pub use config::{ConfigError, ConfigSource, InMemorySource, JsonFileSource, RbacConfig, StaticSource};
pub use explain::{AccessExplanation, RbacAudit, explain_permission};
pub use permissions::{Permission, is_valid_permission};
pub use policy::{AccessPolicy, UnmatchedPolicy};
pub use principal::{Identity, PrincipalId};
pub use registry::{PermissionRegistry, RegistrySnapshot, Subscription, can_access_admin_area};
pub use resolver::{IdentityProvider, IdentityState, ResolverOptions, RoleResolver, SessionStore, effective_role};
pub use roles::{Role, RoleDefinition};
pub use routes::{AccessLevel, MatchMode, RouteMatch, RouteRule, RouteTable, RouteTableError, check_route_permission};
