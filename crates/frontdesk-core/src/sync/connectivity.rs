//! Connectivity state and subscriber notification
//!
//! The core consumes a binary online/offline signal and fans it out to
//! UI-facing subscribers. Subscriptions are RAII guards: dropping one
//! unregisters its callback, so listeners cannot leak past their owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

struct HubInner {
    online: bool,
    next_id: u64,
    subscribers: HashMap<u64, Callback>,
}

/// Shared connectivity state with synchronous transition notification
#[derive(Clone)]
pub struct ConnectivityHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ConnectivityHub {
    /// Create a hub with the given initial state
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                online: initially_online,
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Last known connectivity state, without side effects
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    /// Register a callback invoked synchronously on every transition.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(bool) + Send + Sync + 'static) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, Arc::new(callback));
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Record a new connectivity state, notifying subscribers when it
    /// actually transitioned. Returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let callbacks: Vec<Callback> = {
            let mut inner = self.lock();
            if inner.online == online {
                return false;
            }
            inner.online = online;
            inner.subscribers.values().cloned().collect()
        };

        tracing::info!(online, "connectivity changed");
        // Invoked outside the lock so a subscriber may call back into the hub
        for callback in callbacks {
            callback(online);
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII handle for a connectivity subscription; dropping it unsubscribes
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_online_notifies_on_transition_only() {
        let hub = ConnectivityHub::new(false);
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let _sub = hub.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hub.set_online(true));
        assert!(!hub.set_online(true)); // no transition, no notification
        assert!(hub.set_online(false));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscribers_see_the_new_state() {
        let hub = ConnectivityHub::new(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let _sub = hub.subscribe(move |online| {
            seen_clone.lock().unwrap().push(online);
        });

        hub.set_online(true);
        hub.set_online(false);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let hub = ConnectivityHub::new(false);
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let sub = hub.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        hub.set_online(true);
        drop(sub);
        hub.set_online(false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_online_reports_last_known_state() {
        let hub = ConnectivityHub::new(true);
        assert!(hub.is_online());
        hub.set_online(false);
        assert!(!hub.is_online());
    }
}
