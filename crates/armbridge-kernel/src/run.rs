//! [`RunTracker`] – at most one program run at a time.
//!
//! A run is registered by [`RunTracker::begin`] and deregistered when its
//! [`RunGuard`] drops, whichever way the run ends.  An emergency stop calls
//! [`RunTracker::abort`], which deregisters the run immediately and fires
//! its cancellation token; the guard of an aborted run then finds a
//! different (or no) run registered and leaves it alone.

use std::sync::{Arc, Mutex, MutexGuard};

use armbridge_types::BridgeError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct RunTracker {
    current: Arc<Mutex<Option<ActiveRun>>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// [`BridgeError::AlreadyExecuting`] while another run is registered.
    pub fn begin(&self) -> Result<RunGuard, BridgeError> {
        let mut current = self.lock();
        if current.is_some() {
            return Err(BridgeError::AlreadyExecuting);
        }
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *current = Some(ActiveRun {
            id,
            cancel: cancel.clone(),
        });
        Ok(RunGuard {
            tracker: self.clone(),
            id,
            cancel,
        })
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    pub fn current_id(&self) -> Option<Uuid> {
        self.lock().as_ref().map(|run| run.id)
    }

    /// Deregister and cancel the current run.  Returns `false` when no run
    /// was registered.
    pub fn abort(&self) -> bool {
        match self.lock().take() {
            Some(run) => {
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registration of one run; dropping it ends the run.
pub struct RunGuard {
    tracker: RunTracker,
    id: Uuid,
    cancel: CancellationToken,
}

impl RunGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is aborted.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut current = self.tracker.lock();
        if current.as_ref().is_some_and(|run| run.id == self.id) {
            *current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_rejected_until_guard_drops() {
        let tracker = RunTracker::new();
        let guard = tracker.begin().unwrap();
        assert!(tracker.is_running());
        assert_eq!(tracker.begin().err(), Some(BridgeError::AlreadyExecuting));

        drop(guard);
        assert!(!tracker.is_running());
        assert!(tracker.begin().is_ok());
    }

    #[test]
    fn abort_clears_immediately_and_cancels() {
        let tracker = RunTracker::new();
        let guard = tracker.begin().unwrap();

        assert!(tracker.abort());
        assert!(!tracker.is_running());
        assert!(guard.is_cancelled());
        assert!(!tracker.abort());
    }

    #[test]
    fn stale_guard_does_not_clear_newer_run() {
        let tracker = RunTracker::new();
        let old = tracker.begin().unwrap();
        tracker.abort();

        let new = tracker.begin().unwrap();
        drop(old);
        assert_eq!(tracker.current_id(), Some(new.id()));
    }
}
