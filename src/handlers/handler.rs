//! # Handler traits and responses.
//!
//! A [`Handler`] is the callable registered against an event name. It
//! receives the merged parameter map for one invocation and answers
//! with an explicit [`EventResponse`] — the dispatch core never sniffs
//! result shapes.
//!
//! [`HandlerFn`] wraps a closure `F: Fn(&EventArgs) -> Result<EventResponse, BoxError>`,
//! the way function-backed implementations are built throughout this
//! crate; prefer [`HandlerFn::arc`] when you immediately need a
//! [`HandlerRef`].
//!
//! [`AsyncHandler`] is the awaitable flavor: registered through
//! [`EventBus::add_async_handler`](crate::EventBus::add_async_handler),
//! it is wrapped through a queue-event barrier automatically so the
//! handler's own suspension is expressed as holding the barrier until
//! its internal work finishes.
//!
//! ## Example
//! ```rust
//! use eventvisor::{EventResponse, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc("score_tracker", |args| {
//!     let _ = args.params.get_int("points");
//!     Ok(EventResponse::Continue)
//! });
//! assert_eq!(h.name(), "score_tracker");
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::BoxError;
use crate::events::params::EventParams;
use crate::events::queued::QueuedEvent;

/// Shared handle to a registered handler callable.
pub type HandlerRef = Arc<dyn Handler>;

/// Shared handle to an awaitable handler callable.
pub type AsyncHandlerRef = Arc<dyn AsyncHandler>;

/// Explicit, tagged result of one handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResponse {
    /// Proceed to the next handler.
    Continue,
    /// Boolean events: halt the pass; the completion callback sees
    /// `ev_result = false`. Ignored for other kinds.
    Stop,
    /// Relay events: fold this map into the parameters passed to the
    /// next handler and eventually to the completion callback. Ignored
    /// for other kinds.
    Merge(EventParams),
    /// Install (or replace) the priority-gated blocking filter for the
    /// remainder of this pass: facility name → priority threshold.
    /// The filter persists in parameters forwarded through relay chains.
    RaisePriorityFloor(BTreeMap<String, i32>),
}

/// View of one handler invocation.
#[derive(Debug)]
pub struct EventArgs<'a> {
    /// Canonical name of the event being dispatched.
    pub event: &'a str,
    /// Merged parameters (post parameters overlaid with the handler's
    /// bound parameters; bound values win on key conflicts).
    pub params: &'a EventParams,
}

impl EventArgs<'_> {
    /// The suspension barrier for this invocation of a queue event.
    ///
    /// `None` for plain/boolean/relay events.
    pub fn barrier(&self) -> Option<Arc<QueuedEvent>> {
        self.params.barrier()
    }
}

/// Contract for event handlers.
///
/// Called synchronously on the dispatch thread; implementations must
/// not block. Any error returned aborts the remainder of the dispatch
/// pass and propagates to the host wrapped with the handler identity.
pub trait Handler: Send + Sync + 'static {
    /// Responds to one event invocation.
    fn call(&self, args: &EventArgs<'_>) -> Result<EventResponse, BoxError>;

    /// Human-readable name (for logs and error wrapping).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F>
where
    F: Fn(&EventArgs<'_>) -> Result<EventResponse, BoxError> + Send + Sync + 'static,
{
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&EventArgs<'_>) -> Result<EventResponse, BoxError> + Send + Sync + 'static,
{
    fn call(&self, args: &EventArgs<'_>) -> Result<EventResponse, BoxError> {
        (self.f)(args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Contract for awaitable handlers.
///
/// Each invocation produces a fresh future owning its own state; the
/// dispatch core spawns it and, for queue events, holds the
/// invocation's barrier until the future resolves.
pub trait AsyncHandler: Send + Sync + 'static {
    /// Builds the future for one invocation.
    fn call(&self, params: EventParams) -> BoxFuture<'static, Result<(), BoxError>>;

    /// Human-readable name (for logs and error wrapping).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed awaitable handler.
///
/// Wraps a closure that *creates* a new future per invocation.
#[derive(Debug)]
pub struct AsyncHandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> AsyncHandlerFn<F> {
    /// Creates a new function-backed awaitable handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> AsyncHandler for AsyncHandlerFn<F>
where
    F: Fn(EventParams) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn call(&self, params: EventParams) -> BoxFuture<'static, Result<(), BoxError>> {
        Box::pin((self.f)(params))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
