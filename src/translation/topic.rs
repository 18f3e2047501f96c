//! Keyed publish/subscribe registry
//!
//! A [`Topic`] maps each key to an ordered set of callbacks. Publishing a
//! value for a key invokes every callback registered for that key and no
//! other. Callbacks run after the registry lock is released, so a callback
//! may subscribe, unsubscribe, or publish without deadlocking.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<V> = Arc<dyn Fn(&V) + Send + Sync>;

struct Registry<K, V> {
    next_id: u64,
    // BTreeMap keeps delivery in subscription order
    subscribers: HashMap<K, BTreeMap<u64, Callback<V>>>,
}

/// Typed publish/subscribe registry keyed by `K`, carrying values of type `V`
pub struct Topic<K, V> {
    registry: Arc<Mutex<Registry<K, V>>>,
}

impl<K, V> Topic<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<K, V>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for every value subsequently published under `key`
    ///
    /// The returned handle removes exactly this callback, either through
    /// [`Subscription::unsubscribe`] or when dropped.
    pub fn subscribe<F>(&self, key: K, callback: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .subscribers
                .entry(key.clone())
                .or_default()
                .insert(id, Arc::new(callback));
            id
        };

        let registry: Weak<Mutex<Registry<K, V>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(callbacks) = registry.subscribers.get_mut(&key) {
                callbacks.remove(&id);
                if callbacks.is_empty() {
                    registry.subscribers.remove(&key);
                }
            }
        })
    }

    /// Deliver `value` to every subscriber of `key`, returning how many were called
    pub fn publish(&self, key: &K, value: &V) -> usize {
        let callbacks: Vec<Callback<V>> = match self.lock().subscribers.get(key) {
            Some(callbacks) => callbacks.values().cloned().collect(),
            None => return 0,
        };

        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }

    /// Number of callbacks currently registered for `key`
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lock().subscribers.get(key).map_or(0, BTreeMap::len)
    }

    /// Number of keys with at least one subscriber
    pub fn active_keys(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl<K, V> Default for Topic<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered callback
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the callback; calling this more than once is a no-op
    pub fn unsubscribe(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
