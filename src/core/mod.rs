//! Dispatch core: the bus, the drain loop, and the dispatchers.
//!
//! This module contains the embedded implementation of the eventvisor
//! runtime. The public API from this module is [`EventBus`] (posting,
//! registration, the scheduler tick), [`EventBusBuilder`], and
//! [`EventWait`].
//!
//! Internal modules:
//! - [`bus`]: shared state, posting API, registration API, stop;
//! - [`dispatch`]: synchronous dispatcher and the reentrant drain loop;
//! - [`queue`]: queue-event dispatcher as cancellable resumable tasks;
//! - [`wait`]: one-shot completion handles over transient registrations;
//! - [`builder`]: assembles a bus with config, compiler and monitors.
//!
//! ## Event flow
//! ```text
//! post/post_boolean/post_relay/post_queue
//!        │  (fast path: no listeners, no callback, no monitor → drop)
//!        ▼
//!   Pending Queue ──► process_event_queue() ──► drain loop
//!                        │ plain/boolean/relay      │ queue
//!                        ▼                          ▼
//!                 sync dispatcher            spawned queue task
//!                        │                   (one handler at a time,
//!                        ▼                    barrier suspension)
//!               Pending Callback Stack ──► popped last-completed-first
//! ```

mod builder;
mod bus;
mod dispatch;
mod queue;
mod wait;

pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use wait::EventWait;

use std::sync::{Mutex, MutexGuard};

/// Locks a mutex, recovering from poisoning.
///
/// Handlers run with no core lock held, so a panicking handler can only
/// poison a guard around plain data; the data itself stays consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
