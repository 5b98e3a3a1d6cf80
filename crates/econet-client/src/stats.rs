//! Connection statistics.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

#[derive(Default)]
struct StatisticsInner {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    connection_losses: AtomicU64,
    connected_at: Mutex<Option<SystemTime>>,
    last_loss_at: Mutex<Option<SystemTime>>,
}

/// Shared counters for one connection.
///
/// Cheap to clone; all handles observe the same counters.
#[derive(Clone, Default)]
pub struct Statistics {
    inner: Arc<StatisticsInner>,
}

impl std::fmt::Debug for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statistics")
            .field("frames_received", &self.frames_received())
            .field("frames_sent", &self.frames_sent())
            .field("bytes_received", &self.bytes_received())
            .field("bytes_sent", &self.bytes_sent())
            .field("connection_losses", &self.connection_losses())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Statistics {
    /// Frames decoded successfully.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.inner.frames_received.load(Ordering::Relaxed)
    }

    /// Frames written to the transport.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_sent.load(Ordering::Relaxed)
    }

    /// Raw bytes consumed from the transport.
    #[must_use]
    pub fn bytes_received(&self) -> u64 {
        self.inner.bytes_received.load(Ordering::Relaxed)
    }

    /// Raw bytes written to the transport.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.inner.bytes_sent.load(Ordering::Relaxed)
    }

    /// Times the transport dropped after being up.
    #[must_use]
    pub fn connection_losses(&self) -> u64 {
        self.inner.connection_losses.load(Ordering::Relaxed)
    }

    /// When the current connection became ready, if it is.
    #[must_use]
    pub fn connected_at(&self) -> Option<SystemTime> {
        *lock(&self.inner.connected_at)
    }

    /// When the transport last dropped.
    #[must_use]
    pub fn last_loss_at(&self) -> Option<SystemTime> {
        *lock(&self.inner.last_loss_at)
    }

    pub(crate) fn record_frame_received(&self, bytes: u64) {
        self.inner.frames_received.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_sent(&self, bytes: u64) {
        self.inner.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_connected(&self) {
        *lock(&self.inner.connected_at) = Some(SystemTime::now());
    }

    pub(crate) fn record_loss(&self) {
        self.inner.connection_losses.fetch_add(1, Ordering::Relaxed);
        *lock(&self.inner.last_loss_at) = Some(SystemTime::now());
        *lock(&self.inner.connected_at) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Statistics::default();
        stats.record_frame_received(12);
        stats.record_frame_received(30);
        stats.record_frame_sent(10);

        assert_eq!(stats.frames_received(), 2);
        assert_eq!(stats.bytes_received(), 42);
        assert_eq!(stats.frames_sent(), 1);
        assert_eq!(stats.bytes_sent(), 10);
    }

    #[test]
    fn loss_clears_the_connected_timestamp() {
        let stats = Statistics::default();
        stats.record_connected();
        assert!(stats.connected_at().is_some());

        stats.record_loss();
        assert_eq!(stats.connection_losses(), 1);
        assert!(stats.connected_at().is_none());
        assert!(stats.last_loss_at().is_some());
    }
}
