//! [`LinkState`] – state an adapter shares with its background tasks and
//! with the manager.
//!
//! The adapter instance is the only writer of its transport, but three
//! parties need to *read* its state without borrowing the adapter: the
//! passive read loop (which may flip `connected` or merge telemetry), the
//! manager's status query (which must not wait for an in-flight motion),
//! and tests that count transport writes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use armbridge_types::{Position, PositionUpdate};

/// Cheaply cloneable handle; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct LinkState {
    inner: Arc<LinkInner>,
}

#[derive(Debug, Default)]
struct LinkInner {
    connected: AtomicBool,
    position: Mutex<Position>,
    sends: AtomicUsize,
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    pub fn position(&self) -> Position {
        *self.lock_position()
    }

    /// Partial-merge `update` into the tracked position.
    pub fn merge(&self, update: &PositionUpdate) {
        self.lock_position().merge(update);
    }

    /// Count one successful transport write.
    pub fn record_send(&self) {
        self.inner.sends.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of successful transport writes since the adapter was built.
    pub fn sends(&self) -> usize {
        self.inner.sends.load(Ordering::SeqCst)
    }

    fn lock_position(&self) -> MutexGuard<'_, Position> {
        // A poisoned lock still holds a valid Position.
        self.inner
            .position
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
