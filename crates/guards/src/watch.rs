//! Change signal for hosts that cache guard outcomes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use storefront_auth::{PermissionRegistry, Subscription};

/// Holds one registry subscription and flags every swap.
///
/// The host polls [`RegistryWatch::take_changed`] on its own schedule and
/// re-evaluates its guards when it returns true. Dropping the watch removes
/// the subscription.
pub struct RegistryWatch {
    changed: Arc<AtomicBool>,
    revision: Arc<AtomicU64>,
    subscription: Option<Subscription>,
}

impl RegistryWatch {
    pub fn new(registry: &PermissionRegistry) -> Self {
        let changed = Arc::new(AtomicBool::new(false));
        let revision = Arc::new(AtomicU64::new(registry.revision()));

        let subscription = {
            let changed = Arc::clone(&changed);
            let revision = Arc::clone(&revision);
            registry.subscribe(move |snapshot| {
                revision.fetch_max(snapshot.revision(), Ordering::AcqRel);
                changed.store(true, Ordering::Release);
            })
        };

        Self {
            changed,
            revision,
            subscription: Some(subscription),
        }
    }

    /// True once per batch of swaps since the previous call.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Highest revision delivered so far.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }
}

impl Drop for RegistryWatch {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl core::fmt::Debug for RegistryWatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistryWatch")
            .field("revision", &self.revision())
            .field("changed", &self.changed.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use storefront_auth::RbacConfig;

    use super::*;

    #[test]
    fn flags_each_swap_once() {
        let registry = PermissionRegistry::storefront().unwrap();
        let watch = RegistryWatch::new(&registry);
        assert!(!watch.take_changed());
        assert_eq!(watch.revision(), 1);

        registry.load(&RbacConfig::storefront().unwrap());
        registry.load(&RbacConfig::storefront().unwrap());
        assert!(watch.take_changed());
        assert!(!watch.take_changed());
        assert_eq!(watch.revision(), 3);
    }

    #[test]
    fn revision_tracks_concurrent_loads() {
        let registry = std::sync::Arc::new(PermissionRegistry::storefront().unwrap());
        let watch = RegistryWatch::new(&registry);
        let config = RbacConfig::storefront().unwrap();

        let loaders: Vec<_> = (0..4)
            .map(|_| {
                let registry = std::sync::Arc::clone(&registry);
                let config = config.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        registry.load(&config);
                    }
                })
            })
            .collect();
        for loader in loaders {
            loader.join().unwrap();
        }

        assert_eq!(registry.revision(), 101);
        assert_eq!(watch.revision(), 101);
        assert!(watch.take_changed());
    }

    #[test]
    fn drop_unsubscribes() {
        let registry = PermissionRegistry::storefront().unwrap();
        let watch = RegistryWatch::new(&registry);
        assert_eq!(registry.subscriber_count(), 1);
        drop(watch);
        assert_eq!(registry.subscriber_count(), 0);
    }
}
