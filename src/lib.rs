//! # eventvisor
//!
//! **Eventvisor** is a prioritized event dispatch core for Rust.
//!
//! It provides named events with open parameter maps, handlers ordered
//! by explicit priority, four dispatch semantics (plain, boolean,
//! relay, queue), and cooperative suspension of queue events through
//! barriers. The crate is designed as the coordination backbone for
//! machine-control style applications where many loosely coupled
//! components react to a shared stream of named events.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐
//!  │   component   │  │   component   │  │   component   │
//!  │ post("drain") │  │ add_handler() │  │ wait_for_*()  │
//!  └──────┬────────┘  └──────┬────────┘  └──────┬────────┘
//!         ▼                  ▼                  ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  EventBus (cheap-clone handle)                              │
//! │  - NameParser (memoized "name.N{expr}" splitting)           │
//! │  - HandlerRegistry (per-event lists, priority descending)   │
//! │  - Pending Queue (FIFO within a batch)                      │
//! │  - Pending Callback Stack (last-completed-first)            │
//! │  - MonitorSet (fan-out to post observers)                   │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            ▼
//!              process_event_queue() / run()
//!                            │
//!          ┌─────────────────┴──────────────────┐
//!          ▼                                    ▼
//!   sync dispatcher                      queue-event task
//!   (plain/boolean/relay:                (spawned; one handler
//!    snapshot, floor filter,              at a time; suspends on
//!    condition gate, responses)           a held QueuedEvent)
//!          │                                    │
//!          └──────────► completion callbacks ◄──┘
//! ```
//!
//! ### Dispatch semantics
//! ```text
//! post(event, params)
//!   ├─ parse name (memoized): "drain.2{balls > 1}" ─► name/offset/cond
//!   ├─ stopped? ─► drop (warn)
//!   ├─ no callback + no monitor + no handlers ─► drop (fast path)
//!   └─ append to Pending Queue
//!
//! process_event_queue() {
//!   loop {
//!     ├─► drain events depth-first (nested posts run before
//!     │   older siblings; each suspended batch resumes newest-first)
//!     │     ├─ Plain:   every handler runs
//!     │     ├─ Boolean: Stop ─► halt pass, ev_result = false
//!     │     ├─ Relay:   Merge ─► fold into params for the rest
//!     │     └─ Queue:   spawn task; handlers strictly sequential,
//!     │                 each behind its own suspension barrier
//!     └─► pop ONE completion callback (LIFO), invoke, repeat
//!   }
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                      |
//! |-------------------|-------------------------------------------------------------------|-----------------------------------------|
//! | **Posting**       | Fire-and-forget or awaitable posts of four event kinds.           | [`EventBus`], [`EventWait`]             |
//! | **Handlers**      | Priority-ordered callables with explicit tagged responses.        | [`Handler`], [`HandlerFn`], [`EventResponse`] |
//! | **Name syntax**   | Priority-offset and condition suffixes, parsed once and memoized. | [`NameParser`], [`ConditionCompiler`]   |
//! | **Queue events**  | Strictly sequential handlers with cooperative suspension.         | [`QueuedEvent`]                         |
//! | **Monitors**      | Pure observers of every post (tracing, debugging tools).          | [`Monitor`]                             |
//! | **Errors**        | Typed parse and dispatch errors with handler identity.            | [`ParseError`], [`DispatchError`]       |
//! | **Configuration** | Centralized bus settings.                                         | [`Config`]                              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogMonitor`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Config, EventBus, EventParams, EventResponse, HandlerFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::new(Config::default());
//!
//!     // React to every drain; higher priority runs first.
//!     bus.add_handler(
//!         "ball_drain",
//!         HandlerFn::arc("trough", |args| {
//!             let balls = args.params.get_int("balls").unwrap_or(0);
//!             println!("drained {balls} ball(s)");
//!             Ok(EventResponse::Continue)
//!         }),
//!         100,
//!         None,
//!         EventParams::new(),
//!     )?;
//!
//!     // Only when more than one ball is on the playfield.
//!     bus.add_handler(
//!         "ball_drain{balls > 1}",
//!         HandlerFn::arc("multiball", |_args| Ok(EventResponse::Continue)),
//!         50,
//!         None,
//!         EventParams::new(),
//!     )?;
//!
//!     bus.post("ball_drain", EventParams::new().with("balls", 2))?;
//!     bus.process_event_queue()?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod handlers;
mod monitors;
mod names;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{EventBus, EventBusBuilder, EventWait};
pub use error::{BoxError, DispatchError, ParseError};
pub use events::{
    EventCallback, EventKind, EventParams, PostedEvent, QueuedEvent, Value, EV_RESULT_KEY,
    MIN_PRIORITY_KEY, QUEUE_KEY,
};
pub use handlers::{
    AsyncHandler, AsyncHandlerFn, AsyncHandlerRef, EventArgs, EventResponse, Handler, HandlerFn,
    HandlerKey, HandlerRef,
};
pub use monitors::Monitor;
pub use names::{ComparisonCompiler, Condition, ConditionCompiler, NameParser, ParsedName};

// Optional: expose a simple built-in logging monitor (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use monitors::LogMonitor;
