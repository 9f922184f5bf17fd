//! # Suspension barrier for queue events.
//!
//! A [`QueuedEvent`] is created fresh for every handler invocation of a
//! queue event (unless the merged parameter map already carries one
//! under the reserved [`QUEUE_KEY`](crate::events::params::QUEUE_KEY)).
//! A handler that needs the pipeline to pause calls [`QueuedEvent::wait`];
//! the queue-event dispatcher then suspends before the next handler
//! until some other code calls [`QueuedEvent::clear`] on that exact
//! barrier object.
//!
//! ## Rules
//! - `wait()` moves Idle → Held. Calling it while Held is a fatal
//!   programming defect and panics immediately.
//! - `clear()` moves Held → Released and wakes the suspended dispatch
//!   pass. Calling it while not Held panics immediately.
//! - A barrier may be re-held after release (Released → Held); the
//!   dispatcher re-checks before advancing to the next handler.
//! - No timeout semantics exist here; a caller needing a deadline must
//!   arrange an external timer that calls `clear()`.

use std::fmt;
use std::sync::Mutex;

use tokio::sync::Notify;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BarrierState {
    Idle,
    Held,
    Released,
}

/// Per-handler-invocation suspension barrier used in queue-event dispatch.
pub struct QueuedEvent {
    state: Mutex<BarrierState>,
    notify: Notify,
}

impl QueuedEvent {
    /// Creates a barrier in the Idle state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarrierState::Idle),
            notify: Notify::new(),
        }
    }

    /// Registers a hold on this barrier.
    ///
    /// # Panics
    /// Panics if the barrier is already held (double `wait()` without an
    /// intervening `clear()` is a programming defect in the handler).
    pub fn wait(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        assert!(
            *state != BarrierState::Held,
            "QueuedEvent: wait() called on a barrier that is already held"
        );
        *state = BarrierState::Held;
    }

    /// Releases a hold, waking any suspended dispatch pass.
    ///
    /// # Panics
    /// Panics if the barrier is not currently held.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        assert!(
            *state == BarrierState::Held,
            "QueuedEvent: clear() called on a barrier that is not held"
        );
        *state = BarrierState::Released;
        drop(state);
        self.notify.notify_waiters();
    }

    /// True while the barrier is not held.
    pub fn is_empty(&self) -> bool {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) != BarrierState::Held
    }

    /// Suspends until the barrier is not held.
    ///
    /// Returns immediately if the barrier was never held. The notified
    /// future is created before the state check so a `clear()` racing
    /// with the check cannot be lost.
    pub(crate) async fn released(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for QueuedEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueuedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedEvent")
            .field("held", &!self.is_empty())
            .finish()
    }
}
