//! Per-key subscriber registry.
//!
//! Every device keeps one registry mapping cell names to an ordered list
//! of subscriptions. Delivery is cooperative and synchronous: the reader
//! task publishes a cell write, each subscription's filter chain decides
//! whether the callback fires, and a panicking callback is caught and
//! logged without stopping the rest.

use std::collections::{HashMap, HashSet};

use econet_proto::Value;
use tokio::time::Instant;

use crate::filters::FilterChain;

/// Callback invoked with delivered values.
pub type Callback = Box<dyn FnMut(&Value) + Send>;

/// Handle for cancelling a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) struct Subscription {
    id: u64,
    chain: FilterChain,
    callback: Callback,
    once: bool,
}

/// Ordered subscriber lists, one per cell name.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: HashMap<String, Vec<Subscription>>,
    /// Ids cancelled while their list was checked out for delivery.
    cancelled: HashSet<u64>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("keys", &self.subscribers.len()).finish()
    }
}

impl EventBus {
    /// Register a subscription at the end of `key`'s list.
    pub fn subscribe(&mut self, key: &str, chain: FilterChain, callback: Callback) -> SubscriptionId {
        self.register(key, chain, callback, false)
    }

    /// Register a subscription that is removed after its first delivery.
    pub fn subscribe_once(
        &mut self,
        key: &str,
        chain: FilterChain,
        callback: Callback,
    ) -> SubscriptionId {
        self.register(key, chain, callback, true)
    }

    fn register(
        &mut self,
        key: &str,
        chain: FilterChain,
        callback: Callback,
        once: bool,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = self.next_id;
        self.subscribers
            .entry(key.to_string())
            .or_default()
            .push(Subscription { id, chain, callback, once });
        SubscriptionId(id)
    }

    /// Cancel a subscription. Safe to call from inside a delivery.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        for list in self.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|sub| sub.id == id.0) {
                list.remove(pos);
                return;
            }
        }
        // Not in any list: it may be checked out for delivery right now.
        self.cancelled.insert(id.0);
    }

    /// Check out `key`'s subscriptions for delivery.
    pub(crate) fn take(&mut self, key: &str) -> Vec<Subscription> {
        self.subscribers.remove(key).unwrap_or_default()
    }

    /// Return checked-out subscriptions, keeping delivery order ahead of
    /// anything registered meanwhile and honoring late cancellations.
    pub(crate) fn restore(&mut self, key: &str, mut kept: Vec<Subscription>) {
        kept.retain(|sub| !self.cancelled.remove(&sub.id));
        if kept.is_empty() {
            return;
        }
        let added = self.subscribers.remove(key).unwrap_or_default();
        kept.extend(added);
        self.subscribers.insert(key.to_string(), kept);
    }

    /// True when nothing subscribes to `key`.
    #[must_use]
    pub fn is_empty(&self, key: &str) -> bool {
        self.subscribers.get(key).is_none_or(Vec::is_empty)
    }
}

/// Run one delivery over checked-out subscriptions.
///
/// Returns the subscriptions to restore; one-shot subscriptions that
/// fired are dropped. Callback panics are logged and contained.
pub(crate) fn deliver(
    device: &str,
    key: &str,
    value: &Value,
    now: Instant,
    subscriptions: Vec<Subscription>,
) -> Vec<Subscription> {
    let mut kept = Vec::with_capacity(subscriptions.len());
    for mut sub in subscriptions {
        let Some(forwarded) = sub.chain.feed(value, now) else {
            kept.push(sub);
            continue;
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (sub.callback)(&forwarded);
        }));
        if outcome.is_err() {
            tracing::error!(device, key, "subscriber panicked; delivery continues");
        }

        if !sub.once {
            kept.push(sub);
        }
    }
    kept
}
