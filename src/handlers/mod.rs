//! Handler model: callables, responses, and the per-event registry.
//!
//! ## Contents
//! - [`Handler`], [`HandlerFn`], [`HandlerRef`] — synchronous handler
//!   callables with name labels
//! - [`AsyncHandler`], [`AsyncHandlerFn`], [`AsyncHandlerRef`] —
//!   awaitable handlers registered through the queue-event barrier wrap
//! - [`EventResponse`], [`EventArgs`] — the explicit invocation contract
//! - [`HandlerKey`] — opaque registration id; `registry` (crate-private)
//!   keeps the priority-sorted lists

mod handler;
pub(crate) mod registry;

pub use handler::{
    AsyncHandler, AsyncHandlerFn, AsyncHandlerRef, EventArgs, EventResponse, Handler, HandlerFn,
    HandlerRef,
};
pub use registry::HandlerKey;
