//! Shared device core: data cells, waiters, subscriptions.
//!
//! Every device variant (ecoMAX root, mixers, thermostats) wraps one
//! [`DeviceData`]: a name-to-value cell map written by the reader task,
//! a notifier for async waiters, and the subscriber registry. Application
//! reads are snapshot-consistent per call; cell writes replace the value
//! and fan out through the event bus before waiters wake.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use econet_proto::Value;
use tokio::{sync::Notify, time::Instant};

use crate::{
    error::DeviceError,
    event::{Callback, EventBus, SubscriptionId, deliver},
    filters::FilterChain,
};

/// Lock a mutex, shrugging off poisoning: the protected state stays
/// usable because writers never leave it half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Cell storage and subscriber registry shared by every device variant.
pub struct DeviceData {
    name: String,
    cells: Mutex<HashMap<String, Value>>,
    bus: Mutex<EventBus>,
    notify: Notify,
    closed: AtomicBool,
    created_at: SystemTime,
    last_seen: Mutex<Option<SystemTime>>,
}

impl std::fmt::Debug for DeviceData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceData").field("name", &self.name).finish()
    }
}

impl DeviceData {
    /// Create an empty device core.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Mutex::new(HashMap::new()),
            bus: Mutex::new(EventBus::default()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            created_at: SystemTime::now(),
            last_seen: Mutex::new(None),
        }
    }

    /// When this device was first observed.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// When this device last received data, if it ever did.
    #[must_use]
    pub fn last_seen(&self) -> Option<SystemTime> {
        *lock(&self.last_seen)
    }

    /// Device name, e.g. `ecomax` or `mixer_2`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value of a cell, if it exists.
    #[must_use]
    pub fn get_nowait(&self, key: &str) -> Option<Value> {
        lock(&self.cells).get(key).cloned()
    }

    /// Current value of a cell, or `default` when it does not exist.
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get_nowait(key).unwrap_or(default)
    }

    /// Value of a cell, waiting up to `wait` for it to be assigned.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Timeout`] when the cell never appeared in time
    /// - [`DeviceError::ConnectionClosed`] when the connection closed
    ///   while waiting
    pub async fn get(&self, key: &str, wait: Duration) -> Result<Value, DeviceError> {
        let deadline = Instant::now() + wait;
        loop {
            // Arm the waiter before checking so a concurrent insert
            // cannot slip between the check and the sleep.
            let notified = self.notify.notified();
            if let Some(value) = self.get_nowait(key) {
                return Ok(value);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(DeviceError::ConnectionClosed);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(DeviceError::Timeout);
            }
        }
    }

    /// Wait until a cell exists, up to `wait`.
    pub async fn wait_for(&self, key: &str, wait: Duration) -> Result<Value, DeviceError> {
        self.get(key, wait).await
    }

    /// Snapshot of every cell.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        lock(&self.cells).clone()
    }

    /// Subscribe a callback to a cell, with a filter chain in front.
    pub fn subscribe(&self, key: &str, chain: FilterChain, callback: Callback) -> SubscriptionId {
        lock(&self.bus).subscribe(key, chain, callback)
    }

    /// Subscribe for exactly one delivery.
    pub fn subscribe_once(
        &self,
        key: &str,
        chain: FilterChain,
        callback: Callback,
    ) -> SubscriptionId {
        lock(&self.bus).subscribe_once(key, chain, callback)
    }

    /// Cancel a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.bus).unsubscribe(id);
    }

    /// Write a cell and fan the new value out to subscribers and waiters.
    ///
    /// Deliveries run on the caller's task in subscription order; the
    /// registry is released while callbacks run so a callback may
    /// subscribe or unsubscribe without deadlocking.
    pub fn insert(&self, key: &str, value: Value) {
        lock(&self.cells).insert(key.to_string(), value.clone());
        *lock(&self.last_seen) = Some(SystemTime::now());

        let checked_out = lock(&self.bus).take(key);
        if !checked_out.is_empty() {
            let kept = deliver(&self.name, key, &value, Instant::now(), checked_out);
            lock(&self.bus).restore(key, kept);
        }

        self.notify.notify_waiters();
    }

    /// Mark the device closed and wake every waiter.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// True once [`DeviceData::close`] ran.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Capability surface shared by every device variant.
pub trait Device {
    /// The shared device core.
    fn device_data(&self) -> &DeviceData;

    /// Device name.
    fn name(&self) -> &str {
        self.device_data().name()
    }

    /// Current value of a cell, if it exists.
    fn get_nowait(&self, key: &str) -> Option<Value> {
        self.device_data().get_nowait(key)
    }
}
