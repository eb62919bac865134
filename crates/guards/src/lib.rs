//! `storefront-guards` — route guards, conditional gates and permission-aware
//! controls built on [`storefront_auth::AccessControl`].
//!
//! Guards hold configuration only. Every `evaluate` call re-reads the session
//! and the current registry revision; [`RegistryWatch`] tells a host when a
//! reload makes cached outcomes stale.

pub mod action;
pub mod gate;
pub mod requirement;
pub mod route_guard;
pub mod watch;

pub use action::{ActionControl, ControlState, DenialMode};
pub use gate::{Gate, GateView};
pub use requirement::Requirement;
pub use route_guard::{DEFAULT_FALLBACK, GuardDecision, GuardError, RouteGuard};
pub use watch::RegistryWatch;
