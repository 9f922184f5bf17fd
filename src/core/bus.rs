//! # EventBus: posting and registration surface of the dispatch core.
//!
//! [`EventBus`] is a cheap-clone handle over shared state. Posting is
//! always asynchronous with respect to dispatch: a post only appends to
//! the pending queue, and nothing runs until the host drives
//! [`EventBus::process_event_queue`](crate::EventBus::process_event_queue)
//! (or [`EventBus::run`](crate::EventBus::run)).
//!
//! ## Rules
//! - Event names are parsed (and memoized) at the posting/registration
//!   call site; malformed names fail right there, never later.
//! - Posts after [`EventBus::stop`] are dropped with a warning.
//! - A post with no callback, no attached monitor and no registered
//!   handler is dropped without ever entering the queue.
//! - Handlers registered mid-pass only affect subsequent passes:
//!   dispatch works on a snapshot taken at pass start.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::config::Config;
use crate::error::{DispatchError, ParseError};
use crate::events::params::EventParams;
use crate::events::{EventCallback, EventKind, PostedEvent};
use crate::handlers::{AsyncHandlerRef, EventArgs, EventResponse, HandlerFn, HandlerRef};
use crate::handlers::registry::{HandlerKey, HandlerRegistry};
use crate::monitors::{Monitor, MonitorSet};
use crate::names::{ConditionCompiler, NameParser};

use super::lock;

/// Shared state behind every [`EventBus`] clone.
pub(crate) struct BusInner {
    pub(crate) cfg: Config,
    pub(crate) parser: NameParser,
    pub(crate) registry: Mutex<HandlerRegistry>,
    /// Pending events, dispatched FIFO within one batch.
    pub(crate) queue: Mutex<VecDeque<PostedEvent>>,
    /// Pending completion callbacks, popped last-completed-first.
    pub(crate) callbacks: Mutex<Vec<(EventCallback, EventParams)>>,
    pub(crate) monitors: MonitorSet,
    pub(crate) monitor_posts: AtomicBool,
    pub(crate) stopped: CancellationToken,
    /// In-flight queue-event tasks, aborted on stop.
    pub(crate) inflight: Mutex<HashMap<u64, AbortHandle>>,
    pub(crate) next_task_id: AtomicU64,
    /// Queue-event handler failures awaiting the next scheduler tick.
    pub(crate) failed: Mutex<Vec<DispatchError>>,
    /// Signalled when the pending queue goes non-empty or a queue task
    /// settles, so a host loop can sleep between ticks.
    pub(crate) wake: Notify,
}

/// Posting and registration handle for the event dispatch core.
///
/// Cloning is cheap; all clones share the same queue, registry and
/// callback stack.
///
/// ## Example
/// ```rust
/// use eventvisor::{EventBus, EventParams, EventResponse, HandlerFn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new(eventvisor::Config::default());
/// bus.add_handler(
///     "ball_drain",
///     HandlerFn::arc("drain_counter", |_args| Ok(EventResponse::Continue)),
///     1,
///     None,
///     EventParams::new(),
/// )
/// .unwrap();
///
/// bus.post("ball_drain", EventParams::new().with("balls", 1)).unwrap();
/// bus.process_event_queue().unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    pub(crate) inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a bus with the default condition compiler and no monitors.
    pub fn new(cfg: Config) -> Self {
        Self::builder().with_config(cfg).build()
    }

    /// Starts a builder for a customized bus.
    pub fn builder() -> super::EventBusBuilder {
        super::EventBusBuilder::new()
    }

    pub(crate) fn from_parts(cfg: Config, compiler: Arc<dyn ConditionCompiler>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                cfg,
                parser: NameParser::new(compiler),
                registry: Mutex::new(HandlerRegistry::new()),
                queue: Mutex::new(VecDeque::new()),
                callbacks: Mutex::new(Vec::new()),
                monitors: MonitorSet::new(),
                monitor_posts: AtomicBool::new(false),
                stopped: CancellationToken::new(),
                inflight: Mutex::new(HashMap::new()),
                next_task_id: AtomicU64::new(0),
                failed: Mutex::new(Vec::new()),
                wake: Notify::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<BusInner>) -> Self {
        Self { inner }
    }

    // ---- registration ------------------------------------------------

    /// Registers `handler` for `event`.
    ///
    /// `event` may carry a `.N` priority-offset suffix and/or an
    /// `{expr}` condition suffix; the offset is folded into `priority`
    /// at registration time. `blocking_facility` opts the registration
    /// into priority-gated blocking filters installed by
    /// [`EventResponse::RaisePriorityFloor`].
    ///
    /// Returns an opaque key for [`EventBus::remove_handler_by_key`].
    pub fn add_handler(
        &self,
        event: &str,
        handler: HandlerRef,
        priority: i32,
        blocking_facility: Option<&str>,
        bound: EventParams,
    ) -> Result<HandlerKey, ParseError> {
        let parsed = self.inner.parser.parse(event)?;
        let key = lock(&self.inner.registry).add(
            &parsed,
            handler,
            priority,
            blocking_facility.map(Arc::from),
            bound,
            self.inner.cfg.diagnostics_enabled(),
        );
        Ok(key)
    }

    /// Registers an awaitable handler for `event`.
    ///
    /// The handler is wrapped so that, on queue events, the invocation's
    /// suspension barrier is held for exactly as long as the produced
    /// future runs. On plain/boolean/relay events the future is spawned
    /// without coupling to the dispatch pass; failures are logged, not
    /// propagated.
    pub fn add_async_handler(
        &self,
        event: &str,
        handler: AsyncHandlerRef,
        priority: i32,
        blocking_facility: Option<&str>,
        bound: EventParams,
    ) -> Result<HandlerKey, ParseError> {
        let label: Arc<str> = Arc::from(handler.name());
        let wrapped_label = label.clone();
        let wrapped: HandlerRef = HandlerFn::arc(
            Cow::Owned(String::from(&*wrapped_label)),
            move |args: &EventArgs<'_>| {
                let fut = handler.call(args.params.clone());
                let barrier = args.barrier();
                if let Some(barrier) = &barrier {
                    barrier.wait();
                }
                let label = label.clone();
                tokio::spawn(async move {
                    if let Err(err) = fut.await {
                        error!(handler = %label, error = %err, "async handler failed");
                    }
                    if let Some(barrier) = barrier {
                        barrier.clear();
                    }
                });
                Ok(EventResponse::Continue)
            },
        );
        self.add_handler(event, wrapped, priority, blocking_facility, bound)
    }

    /// Removes any prior registration of `handler` for `event` (matching
    /// `bound` exactly when it is non-empty), then registers it anew.
    pub fn replace_handler(
        &self,
        event: &str,
        handler: HandlerRef,
        priority: i32,
        blocking_facility: Option<&str>,
        bound: EventParams,
    ) -> Result<HandlerKey, ParseError> {
        let parsed = self.inner.parser.parse(event)?;
        let key = {
            let mut registry = lock(&self.inner.registry);
            registry.remove_for_replace(&parsed.name, &handler, &bound);
            registry.add(
                &parsed,
                handler,
                priority,
                blocking_facility.map(Arc::from),
                bound,
                self.inner.cfg.diagnostics_enabled(),
            )
        };
        Ok(key)
    }

    /// Removes every registration of `handler` across all events.
    pub fn remove_handler(&self, handler: &HandlerRef) {
        lock(&self.inner.registry).remove_handler(handler);
    }

    /// Removes every registration of `handler` under `event`.
    pub fn remove_handler_by_event(
        &self,
        event: &str,
        handler: &HandlerRef,
    ) -> Result<(), ParseError> {
        let parsed = self.inner.parser.parse(event)?;
        lock(&self.inner.registry).remove_by_event_handler(&parsed.name, handler);
        Ok(())
    }

    /// Removes the single registration identified by `key`.
    pub fn remove_handler_by_key(&self, key: &HandlerKey) {
        lock(&self.inner.registry).remove_by_key(key);
    }

    /// Removes all registrations identified by `keys`.
    pub fn remove_handlers_by_keys(&self, keys: &[HandlerKey]) {
        let mut registry = lock(&self.inner.registry);
        for key in keys {
            registry.remove_by_key(key);
        }
    }

    /// Removes every handler registered for `event`.
    pub fn remove_all_handlers_for_event(&self, event: &str) -> Result<(), ParseError> {
        let parsed = self.inner.parser.parse(event)?;
        lock(&self.inner.registry).remove_all_for_event(&parsed.name);
        Ok(())
    }

    /// True if at least one handler is registered for `event`.
    ///
    /// Suffixes on `event` are parsed and ignored; lookup uses the
    /// canonical name.
    pub fn does_event_exist(&self, event: &str) -> bool {
        match self.inner.parser.parse(event) {
            Ok(parsed) => lock(&self.inner.registry).contains(&parsed.name),
            Err(_) => false,
        }
    }

    // ---- posting -----------------------------------------------------

    /// Posts a plain event: every handler runs, return values ignored.
    pub fn post(&self, event: &str, params: EventParams) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Plain, None, params)
    }

    /// Posts a plain event with a completion callback.
    pub fn post_with_callback(
        &self,
        event: &str,
        callback: EventCallback,
        params: EventParams,
    ) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Plain, Some(callback), params)
    }

    /// Posts a boolean event: a handler returning
    /// [`EventResponse::Stop`] halts the pass and the callback sees
    /// `ev_result = false`.
    pub fn post_boolean(&self, event: &str, params: EventParams) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Boolean, None, params)
    }

    /// Posts a boolean event with a completion callback.
    pub fn post_boolean_with_callback(
        &self,
        event: &str,
        callback: EventCallback,
        params: EventParams,
    ) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Boolean, Some(callback), params)
    }

    /// Posts a relay event: handlers returning
    /// [`EventResponse::Merge`] accumulate parameters down the chain.
    pub fn post_relay(&self, event: &str, params: EventParams) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Relay, None, params)
    }

    /// Posts a relay event with a completion callback.
    pub fn post_relay_with_callback(
        &self,
        event: &str,
        callback: EventCallback,
        params: EventParams,
    ) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Relay, Some(callback), params)
    }

    /// Posts a queue event: handlers run strictly one at a time and may
    /// suspend the pass through the invocation's barrier; `callback`
    /// fires only after every handler ran and every hold was released.
    pub fn post_queue(
        &self,
        event: &str,
        callback: EventCallback,
        params: EventParams,
    ) -> Result<(), ParseError> {
        self.enqueue(event, EventKind::Queue, Some(callback), params)
    }

    pub(crate) fn enqueue(
        &self,
        event: &str,
        kind: EventKind,
        callback: Option<EventCallback>,
        params: EventParams,
    ) -> Result<(), ParseError> {
        let parsed = self.inner.parser.parse(event)?;

        if self.inner.stopped.is_cancelled() {
            warn!(event = %parsed.name, "bus stopped: dropping post");
            return Ok(());
        }

        let monitoring = self.monitoring_enabled();
        if callback.is_none() && !monitoring && !lock(&self.inner.registry).contains(&parsed.name)
        {
            trace!(event = %parsed.name, "no listeners: dropping post");
            return Ok(());
        }

        let posted = PostedEvent::new(parsed.name.clone(), kind, params, callback);
        debug!(event = %posted.event, kind = posted.kind.as_label(), "event queued");
        if monitoring {
            self.inner.monitors.emit(&posted);
        }

        let was_empty = {
            let mut queue = lock(&self.inner.queue);
            let was_empty = queue.is_empty();
            queue.push_back(posted);
            was_empty
        };
        if was_empty {
            self.inner.wake.notify_one();
        }
        Ok(())
    }

    // ---- monitors / lifecycle ----------------------------------------

    /// Attaches a monitor and enables monitoring of every post.
    ///
    /// Must be called from within a tokio runtime (a worker task is
    /// spawned per monitor). While any monitor is attached, the
    /// no-listener fast path is disabled so monitors see every post.
    pub fn attach_monitor(&self, monitor: Arc<dyn Monitor>) {
        self.inner.monitors.attach(monitor);
        self.inner.monitor_posts.store(true, AtomicOrdering::Relaxed);
    }

    /// True while at least one monitor is attached.
    pub fn monitoring_enabled(&self) -> bool {
        self.inner.monitor_posts.load(AtomicOrdering::Relaxed)
    }

    /// Stops the bus: subsequent posts are dropped, the host loop exits,
    /// and every in-flight queue-event task is aborted (their completion
    /// callbacks never fire).
    pub fn stop(&self) {
        self.inner.stopped.cancel();
        let aborted: Vec<AbortHandle> = lock(&self.inner.inflight).drain().map(|(_, h)| h).collect();
        if !aborted.is_empty() {
            debug!(tasks = aborted.len(), "aborting in-flight queue events");
        }
        for handle in aborted {
            handle.abort();
        }
        self.inner.wake.notify_one();
    }

    /// True once [`EventBus::stop`] was called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_cancelled()
    }

    /// Number of events waiting in the pending queue.
    pub fn pending_events(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Number of completion callbacks waiting on the pending stack.
    pub fn pending_callbacks(&self) -> usize {
        lock(&self.inner.callbacks).len()
    }

    /// Number of queue-event tasks currently in flight.
    pub fn inflight_queue_events(&self) -> usize {
        lock(&self.inner.inflight).len()
    }

    /// The bus configuration.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }
}
