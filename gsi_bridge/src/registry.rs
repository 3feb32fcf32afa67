//! # Subscriber Registry
//!
//! In-process fan-out of accepted updates. Subscribers get the raw parsed
//! document, not the typed snapshot, so they can observe fields the typed
//! model does not capture. Delivery is synchronous on the connection task;
//! each callback runs inside its own error boundary so one misbehaving
//! subscriber cannot affect the rest.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// A registered notification callback. Returning `Err` marks the delivery
/// failed for this subscriber only; it is logged and swallowed.
pub type SubscriberCallback = Box<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Opaque subscription identifier. Always `> 0`, never reused, so `0` can
/// mean "no subscription" for callers that need a sentinel.
pub type SubscriptionHandle = u64;

pub struct SubscriberRegistry {
    callbacks: Mutex<HashMap<SubscriptionHandle, Arc<SubscriberCallback>>>,
    next_handle: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(HashMap::new()),
            // start above zero so handles are always > 0
            next_handle: AtomicU64::new(1),
        }
    }

    /// Registers a callback and returns its handle.
    pub fn register(&self, callback: SubscriberCallback) -> SubscriptionHandle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let mut callbacks = self.callbacks.lock().expect("Registry lock poisoned");
        callbacks.insert(handle, Arc::new(callback));
        log::debug!("subscriber {} registered", handle);
        handle
    }

    /// Removes a subscription. Returns whether the handle was known.
    pub fn unregister(&self, handle: SubscriptionHandle) -> bool {
        let mut callbacks = self.callbacks.lock().expect("Registry lock poisoned");
        let removed = callbacks.remove(&handle).is_some();
        if removed {
            log::debug!("subscriber {} unregistered", handle);
        }
        removed
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.callbacks.lock().expect("Registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `payload` to every registered subscriber. An `Err` or panic
    /// inside one callback is logged and isolated; the remaining subscribers
    /// are still notified and nothing propagates to the caller.
    ///
    /// The registry lock is released before any callback runs, so callbacks
    /// may register or unregister on this same registry. The delivery set is
    /// the membership at the time of the call: a callback unregistered
    /// mid-delivery may still receive this one payload.
    pub fn notify_all(&self, payload: &Value) {
        let snapshot: Vec<(SubscriptionHandle, Arc<SubscriberCallback>)> = {
            let callbacks = self.callbacks.lock().expect("Registry lock poisoned");
            callbacks
                .iter()
                .map(|(handle, callback)| (*handle, Arc::clone(callback)))
                .collect()
        };
        for (handle, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("subscriber {} failed: {}", handle, e),
                Err(_) => log::error!("subscriber {} panicked", handle),
            }
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
