//! Permission registry: the single source of truth for "which role holds
//! which permission".
//!
//! The active tables live in an immutable [`RegistrySnapshot`] behind an
//! `Arc`. A load or reload builds the next snapshot completely and then swaps
//! the pointer, so a reader always sees either the old tables or the new ones,
//! never a mix. Readers that need several answers from the same revision
//! should take a [`PermissionRegistry::snapshot`] once and query that.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};

use crate::config::{ConfigError, ConfigSource, RbacConfig, StaticSource};
use crate::{Permission, Role, RoleDefinition};

/// True iff `role` is one of the two back-office roles (`admin`, `staff`).
///
/// Hard-coded allow-list; deliberately independent of the permission tables.
pub fn can_access_admin_area(role: &str) -> bool {
    role == Role::ADMIN.as_str() || role == Role::STAFF.as_str()
}

/// One immutable revision of the role and description tables.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    roles: BTreeMap<Role, RoleDefinition>,
    descriptions: BTreeMap<Permission, String>,
    revision: u64,
    loaded_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Revision 0: no roles, no descriptions.
    pub fn empty() -> Self {
        Self {
            roles: BTreeMap::new(),
            descriptions: BTreeMap::new(),
            revision: 0,
            loaded_at: Utc::now(),
        }
    }

    fn from_config(config: &RbacConfig, revision: u64) -> Self {
        let roles = config
            .roles
            .iter()
            .map(|(key, role)| {
                let key = Role::new(key.clone());
                let definition = RoleDefinition {
                    key: key.clone(),
                    description: role.description.clone(),
                    permissions: role
                        .permissions
                        .iter()
                        .cloned()
                        .map(Permission::new)
                        .collect(),
                };
                (key, definition)
            })
            .collect();

        let descriptions = config
            .permission_descriptions
            .iter()
            .map(|(token, text)| (Permission::new(token.clone()), text.clone()))
            .collect();

        Self {
            roles,
            descriptions,
            revision,
            loaded_at: Utc::now(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.values()
    }

    pub fn get_role(&self, role: &str) -> Option<&RoleDefinition> {
        self.roles.get(role)
    }

    /// Empty for unknown roles; never an error.
    pub fn get_role_permissions(&self, role: &str) -> BTreeSet<Permission> {
        self.get_role(role)
            .map(|definition| definition.permissions.clone())
            .unwrap_or_default()
    }

    pub fn has_permission(&self, role: &str, permission: &str) -> bool {
        self.get_role(role)
            .is_some_and(|definition| definition.grants(permission))
    }

    /// Vacuously true for an empty list.
    pub fn has_all_permissions<I, P>(&self, role: &str, permissions: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        permissions
            .into_iter()
            .all(|permission| self.has_permission(role, permission.as_ref()))
    }

    /// False for an empty list.
    pub fn has_any_permission<I, P>(&self, role: &str, permissions: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        permissions
            .into_iter()
            .any(|permission| self.has_permission(role, permission.as_ref()))
    }

    /// Registered description, or the token itself.
    pub fn get_permission_description(&self, permission: &str) -> String {
        self.descriptions
            .get(permission)
            .cloned()
            .unwrap_or_else(|| permission.to_string())
    }

    /// Every permission mentioned by a role or by the description table.
    pub fn known_permissions(&self) -> BTreeSet<Permission> {
        self.roles
            .values()
            .flat_map(|definition| definition.permissions.iter())
            .chain(self.descriptions.keys())
            .cloned()
            .collect()
    }

    pub fn get_categories(&self) -> BTreeSet<String> {
        self.known_permissions()
            .iter()
            .map(|permission| permission.category().to_string())
            .collect()
    }

    /// Roles whose permission set contains `permission`.
    pub fn roles_granting(&self, permission: &str) -> Vec<Role> {
        self.roles
            .values()
            .filter(|definition| definition.grants(permission))
            .map(|definition| definition.key.clone())
            .collect()
    }

    /// Same tables, ignoring revision and load time.
    pub fn same_tables(&self, other: &RegistrySnapshot) -> bool {
        self.roles == other.roles && self.descriptions == other.descriptions
    }
}

type Callback = Arc<dyn Fn(&RegistrySnapshot) + Send + Sync>;

#[derive(Default)]
struct SubscriberList {
    entries: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

impl SubscriberList {
    fn push(&self, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    fn callbacks(&self) -> Vec<Callback> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Handle for one registered change callback.
///
/// Dropping the handle leaves the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    list: Weak<SubscriberList>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove exactly this registration. Returns false if it was already gone
    /// (registry disposed or dropped).
    pub fn unsubscribe(self) -> bool {
        match self.list.upgrade() {
            Some(list) => list.remove(self.id),
            None => false,
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Live registry: current snapshot, its backing source and its subscribers.
///
/// Lifecycle: construct, `load`/`reload` any number of times, `dispose`.
/// Share it by `Arc` with every consumer instead of a process-global.
pub struct PermissionRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    // Held from swap through notification so subscribers see revisions in order.
    swap: Mutex<()>,
    subscribers: Arc<SubscriberList>,
    source: Box<dyn ConfigSource>,
    disposed: AtomicBool,
}

impl PermissionRegistry {
    /// Empty registry (revision 0) backed by `source`. Nothing is read yet.
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::empty())),
            swap: Mutex::new(()),
            subscribers: Arc::new(SubscriberList::default()),
            source: Box::new(source),
            disposed: AtomicBool::new(false),
        }
    }

    /// Construct and perform the initial read of `source`.
    pub fn from_source(source: impl ConfigSource + 'static) -> Result<Self, ConfigError> {
        let registry = Self::new(source);
        registry.try_reload()?;
        Ok(registry)
    }

    /// Builder form of [`load`](Self::load): start from `config` without
    /// reading the source.
    pub fn with_config(self, config: &RbacConfig) -> Self {
        self.load(config);
        self
    }

    /// Registry over the embedded storefront document.
    pub fn storefront() -> Result<Self, ConfigError> {
        Self::from_source(StaticSource::storefront())
    }

    /// Current revision. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn revision(&self) -> u64 {
        self.snapshot().revision()
    }

    /// Replace both tables atomically and notify subscribers.
    ///
    /// Swaps are serialised: a concurrent `load` waits until every subscriber
    /// has seen this revision. Callbacks therefore must not load or reload
    /// this registry themselves.
    ///
    /// Returns the new revision.
    pub fn load(&self, config: &RbacConfig) -> u64 {
        let _serial = self.swap.lock().unwrap_or_else(PoisonError::into_inner);
        let next = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let next = Arc::new(RegistrySnapshot::from_config(config, current.revision() + 1));
            *current = Arc::clone(&next);
            next
        };

        tracing::info!(
            revision = next.revision(),
            roles = next.roles.len(),
            permissions = next.known_permissions().len(),
            "rbac registry swapped"
        );

        self.notify(&next);
        next.revision()
    }

    /// Re-read the backing source; on success swap and notify, returning the
    /// new revision.
    pub fn try_reload(&self) -> Result<u64, ConfigError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ConfigError::Disposed);
        }
        let config = self.source.read()?;
        Ok(self.load(&config))
    }

    /// Like [`try_reload`](Self::try_reload), but a failure is logged and
    /// swallowed: the previous snapshot stays active and nobody is notified.
    pub fn reload(&self) -> Option<u64> {
        match self.try_reload() {
            Ok(revision) => Some(revision),
            Err(err) => {
                tracing::warn!(
                    origin = %self.source.describe(),
                    revision = self.revision(),
                    error = ?err,
                    "rbac reload rejected; keeping current configuration"
                );
                None
            }
        }
    }

    /// Register a callback run after every successful swap.
    ///
    /// A disposed registry registers nothing; the returned handle is inert.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RegistrySnapshot) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            tracing::debug!("subscribe on disposed rbac registry ignored");
            return Subscription {
                id: 0,
                list: Weak::new(),
            };
        }
        let id = self.subscribers.push(Arc::new(callback));
        Subscription {
            id,
            list: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drop every subscriber and refuse further reloads and subscriptions.
    /// `load` stays available for callers holding a config in hand.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.subscribers.clear();
        tracing::debug!("rbac registry disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // Callbacks run outside the table and subscriber locks so they may query
    // or unsubscribe.
    fn notify(&self, snapshot: &RegistrySnapshot) {
        for callback in self.subscribers.callbacks() {
            callback(snapshot);
        }
    }

    pub fn get_role(&self, role: &str) -> Option<RoleDefinition> {
        self.snapshot().get_role(role).cloned()
    }

    pub fn get_role_permissions(&self, role: &str) -> BTreeSet<Permission> {
        self.snapshot().get_role_permissions(role)
    }

    pub fn has_permission(&self, role: &str, permission: &str) -> bool {
        self.snapshot().has_permission(role, permission)
    }

    pub fn has_all_permissions<I, P>(&self, role: &str, permissions: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.snapshot().has_all_permissions(role, permissions)
    }

    pub fn has_any_permission<I, P>(&self, role: &str, permissions: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.snapshot().has_any_permission(role, permissions)
    }

    pub fn get_permission_description(&self, permission: &str) -> String {
        self.snapshot().get_permission_description(permission)
    }

    pub fn get_categories(&self) -> BTreeSet<String> {
        self.snapshot().get_categories()
    }

    pub fn can_access_admin_area(&self, role: &str) -> bool {
        can_access_admin_area(role)
    }
}

impl core::fmt::Debug for PermissionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionRegistry")
            .field("revision", &self.revision())
            .field("source", &self.source.describe())
            .field("subscribers", &self.subscriber_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
