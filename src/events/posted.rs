//! # Posted events: the unit of work consumed by the drain loop.
//!
//! A [`PostedEvent`] is created by the posting API and consumed exactly
//! once by the drain loop. [`EventKind`] selects the dispatch semantics:
//!
//! - **Plain**: every handler runs; results other than errors are ignored.
//! - **Boolean**: a handler returning [`EventResponse::Stop`] halts the
//!   pass and marks `ev_result = false` for the completion callback.
//! - **Relay**: a handler returning [`EventResponse::Merge`] folds its
//!   map into the parameters seen by the next handler and the callback.
//! - **Queue**: handlers run strictly one at a time and may suspend the
//!   pass through a [`QueuedEvent`](crate::QueuedEvent) barrier.
//!
//! [`EventResponse`]: crate::EventResponse

use std::fmt;
use std::sync::Arc;

use crate::events::params::EventParams;

/// Completion callback invoked when an event's dispatch pass settles.
pub type EventCallback = Arc<dyn Fn(EventParams) + Send + Sync + 'static>;

/// Dispatch semantics of a posted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Every handler runs; return values are ignored.
    Plain,
    /// Short-circuits when a handler returns `Stop`.
    Boolean,
    /// Accumulates `Merge` results from handler to handler.
    Relay,
    /// Handlers run one at a time behind a suspension barrier.
    Queue,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Plain => "plain",
            EventKind::Boolean => "boolean",
            EventKind::Relay => "relay",
            EventKind::Queue => "queue",
        }
    }
}

/// An event waiting in the pending queue.
#[derive(Clone)]
pub struct PostedEvent {
    /// Canonical (parsed, lowercased) event name.
    pub event: Arc<str>,
    /// Dispatch semantics.
    pub kind: EventKind,
    /// Parameters delivered to every handler and the callback.
    pub params: EventParams,
    /// Completion callback, if the poster supplied one.
    pub(crate) callback: Option<EventCallback>,
}

impl PostedEvent {
    pub(crate) fn new(
        event: Arc<str>,
        kind: EventKind,
        params: EventParams,
        callback: Option<EventCallback>,
    ) -> Self {
        Self {
            event,
            kind,
            params,
            callback,
        }
    }

    /// True if a completion callback was attached.
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl fmt::Debug for PostedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostedEvent")
            .field("event", &self.event)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
