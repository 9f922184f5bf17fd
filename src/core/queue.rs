//! # Queue-event dispatcher: one spawned task per posted queue event.
//!
//! A queue event's handlers run strictly one at a time. Each invocation
//! gets a suspension barrier (a fresh [`QueuedEvent`] unless the merged
//! parameters already carry one under the reserved `queue` key); a
//! handler that holds the barrier suspends the pass until someone
//! releases that exact barrier. The completion callback fires only
//! after the final handler ran and its hold (if any) was released.
//!
//! ## Rules
//! - The handler list is snapshotted when the drain loop reaches the
//!   event, not when the task gets polled; registrations removed
//!   mid-flight still run.
//! - With no handlers registered, the callback settles on the pending
//!   stack without spawning anything.
//! - A handler error ends the task: the error is surfaced from the next
//!   scheduler tick and the completion callback never fires.
//! - [`EventBus::stop`](super::EventBus::stop) aborts in-flight tasks at
//!   their next await point; their callbacks never fire.

use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;

use tracing::debug;

use crate::error::DispatchError;
use crate::events::params::QUEUE_KEY;
use crate::events::{PostedEvent, QueuedEvent};
use crate::handlers::{EventArgs, EventResponse};
use crate::handlers::registry::RegisteredHandler;

use super::bus::{BusInner, EventBus};
use super::dispatch::blocked_by_floor;
use super::lock;

impl EventBus {
    pub(crate) fn spawn_queue_event(&self, posted: PostedEvent) {
        let snapshot = lock(&self.inner.registry).snapshot(&posted.event);
        let Some(handlers) = snapshot else {
            debug!(event = %posted.event, "queue event with no handlers: settling immediately");
            if let Some(callback) = posted.callback {
                lock(&self.inner.callbacks).push((callback, posted.params));
            }
            return;
        };

        let id = self.inner.next_task_id.fetch_add(1, AtomicOrdering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task_inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            run_queue_event(&task_inner, posted, handlers).await;
            lock(&task_inner.inflight).remove(&id);
            task_inner.wake.notify_one();
        });
        lock(&inner.inflight).insert(id, task.abort_handle());
        // The task may have settled before the insert above.
        if task.is_finished() {
            lock(&inner.inflight).remove(&id);
        }
    }
}

async fn run_queue_event(
    inner: &Arc<BusInner>,
    posted: PostedEvent,
    handlers: Vec<RegisteredHandler>,
) {
    debug!(event = %posted.event, "processing queue event");
    let PostedEvent {
        event,
        params,
        callback,
        ..
    } = posted;

    let mut floor = params.min_priority();
    for rh in &handlers {
        if blocked_by_floor(rh.blocking_facility.as_deref(), rh.priority, floor.as_ref()) {
            continue;
        }

        let mut merged = params.clone();
        merged.merge_from(&rh.bound);
        if let Some(condition) = &rh.condition {
            if !condition.evaluate(&merged) {
                continue;
            }
        }

        // Fresh barrier per invocation unless the caller supplied one.
        let barrier = match merged.barrier() {
            Some(barrier) => barrier,
            None => {
                let barrier = Arc::new(QueuedEvent::new());
                merged.insert(QUEUE_KEY, barrier.clone());
                barrier
            }
        };

        let args = EventArgs {
            event: &event[..],
            params: &merged,
        };
        match rh.handler.call(&args) {
            Ok(response) => {
                if let EventResponse::RaisePriorityFloor(map) = response {
                    floor = Some(map);
                }
            }
            Err(source) => {
                let err = DispatchError::Handler {
                    handler: Arc::from(rh.handler.name()),
                    event: event.clone(),
                    source,
                };
                lock(&inner.failed).push(err);
                inner.wake.notify_one();
                return;
            }
        }

        barrier.released().await;
    }

    debug!(event = %event, "queue event settled");
    if let Some(callback) = callback {
        callback(params);
    }
}
