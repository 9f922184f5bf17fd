//! Event data model: posted events, parameter bags, suspension barriers.
//!
//! ## Contents
//! - [`EventKind`], [`PostedEvent`], [`EventCallback`] — what travels
//!   through the pending queue
//! - [`EventParams`], [`Value`] — the open parameter map attached to
//!   posts and registrations, with the reserved keys used by the core
//! - [`QueuedEvent`] — the per-handler-invocation suspension barrier
//!   for queue events
//!
//! See `core/mod.rs` for how these flow through the drain loop.

pub mod params;
mod posted;
pub mod queued;

pub use params::{EventParams, Value, EV_RESULT_KEY, MIN_PRIORITY_KEY, QUEUE_KEY};
pub use posted::{EventCallback, EventKind, PostedEvent};
pub use queued::QueuedEvent;
