//! # Awaitable posting: one-shot completion handles.
//!
//! [`EventWait`] is a future resolving to the final parameter map of a
//! dispatch pass. The `*_async` posting variants attach a channel-backed
//! completion callback and hand back the receiving end;
//! [`EventBus::wait_for_any_event`] builds the same handle out of
//! transient handler registrations that deregister themselves on first
//! fire.
//!
//! ## Rules
//! - Awaiting does not drive dispatch; something else must tick the bus
//!   (typically [`EventBus::run`](super::EventBus::run) on another task).
//! - The handle resolves to `None` when the pass can no longer settle
//!   (bus dropped, or a queue event aborted by stop).

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::ParseError;
use crate::events::params::EventParams;
use crate::events::{EventCallback, EventKind};
use crate::handlers::{EventArgs, EventResponse, HandlerFn, HandlerKey};

use super::bus::{BusInner, EventBus};
use super::lock;

/// Future resolving to the final parameters of one dispatch pass.
///
/// `None` means the pass will never settle.
pub struct EventWait {
    rx: oneshot::Receiver<EventParams>,
}

impl EventWait {
    /// One-shot completion callback plus the future it resolves.
    pub(crate) fn channel() -> (EventCallback, EventWait) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let callback: EventCallback = Arc::new(move |params| {
            if let Some(tx) = tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
                let _ = tx.send(params);
            }
        });
        (callback, EventWait { rx })
    }
}

impl Future for EventWait {
    type Output = Option<EventParams>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

impl EventBus {
    /// Posts a plain event and returns a handle settling with the final
    /// parameters.
    pub fn post_async(&self, event: &str, params: EventParams) -> Result<EventWait, ParseError> {
        self.enqueue_async(event, EventKind::Plain, params)
    }

    /// Posts a boolean event; the settled parameters carry
    /// `ev_result = false` when a handler stopped the pass.
    pub fn post_boolean_async(
        &self,
        event: &str,
        params: EventParams,
    ) -> Result<EventWait, ParseError> {
        self.enqueue_async(event, EventKind::Boolean, params)
    }

    /// Posts a relay event; the settled parameters include every merge
    /// accumulated down the handler chain.
    pub fn post_relay_async(
        &self,
        event: &str,
        params: EventParams,
    ) -> Result<EventWait, ParseError> {
        self.enqueue_async(event, EventKind::Relay, params)
    }

    /// Posts a queue event; the handle settles only after every handler
    /// ran and every barrier hold was released.
    pub fn post_queue_async(
        &self,
        event: &str,
        params: EventParams,
    ) -> Result<EventWait, ParseError> {
        self.enqueue_async(event, EventKind::Queue, params)
    }

    fn enqueue_async(
        &self,
        event: &str,
        kind: EventKind,
        params: EventParams,
    ) -> Result<EventWait, ParseError> {
        let (callback, wait) = EventWait::channel();
        self.enqueue(event, kind, Some(callback), params)?;
        Ok(wait)
    }

    /// Resolves when any of `events` is next dispatched, with that
    /// event's posted parameters.
    ///
    /// Registers one transient handler per name at priority 1; the
    /// first to fire removes the whole group. All names are validated
    /// before any registration happens.
    pub fn wait_for_any_event(&self, events: &[&str]) -> Result<EventWait, ParseError> {
        for raw in events {
            self.inner.parser.parse(raw)?;
        }

        let (resolve, wait) = EventWait::channel();
        let group: Arc<Mutex<Vec<HandlerKey>>> = Arc::new(Mutex::new(Vec::with_capacity(events.len())));
        let weak: Weak<BusInner> = Arc::downgrade(&self.inner);

        for raw in events {
            let group_in_handler = group.clone();
            let weak = weak.clone();
            let resolve = resolve.clone();
            let handler = HandlerFn::arc("wait_for_event", move |args: &EventArgs<'_>| {
                let drained: Vec<HandlerKey> = lock(&group_in_handler).drain(..).collect();
                if let Some(inner) = weak.upgrade() {
                    let bus = EventBus::from_inner(inner);
                    bus.remove_handlers_by_keys(&drained);
                }
                resolve(args.params.clone());
                Ok(EventResponse::Continue)
            });
            let key = self.add_handler(raw, handler, 1, None, EventParams::new())?;
            lock(&group).push(key);
        }

        Ok(wait)
    }

    /// Resolves when `event` is next dispatched.
    pub fn wait_for_event(&self, event: &str) -> Result<EventWait, ParseError> {
        self.wait_for_any_event(&[event])
    }
}
