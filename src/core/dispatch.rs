//! # Drain loop and the synchronous dispatcher.
//!
//! One scheduler tick ([`EventBus::process_event_queue`]) settles
//! everything that can settle synchronously:
//!
//! 1. drain the pending event queue to empty, depth-first: events
//!    posted by a handler run immediately after the event that posted
//!    them, before older siblings;
//! 2. pop **one** completion callback off the pending stack and invoke
//!    it (last-completed-first);
//! 3. repeat until both are empty.
//!
//! Queue events are not dispatched here — they are handed to spawned
//! tasks (`queue.rs`) and settle asynchronously.
//!
//! ## Rules
//! - The handler list is snapshotted at pass start; registry mutation
//!   from inside a handler affects only later passes.
//! - A handler error aborts its pass, skips its completion callback,
//!   restores the still-unprocessed events to the front of the queue
//!   and propagates out of the tick.
//! - No core lock is held while a handler runs.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::DispatchError;
use crate::events::params::EV_RESULT_KEY;
use crate::events::{EventKind, PostedEvent};
use crate::handlers::{EventArgs, EventResponse};

use super::bus::EventBus;
use super::lock;

impl EventBus {
    /// Runs one scheduler tick: drains pending events and settles
    /// pending completion callbacks.
    ///
    /// Synchronous, but must be called from within a tokio runtime —
    /// queue events spawn tasks. Returns the first pending error: either
    /// a handler failure from this tick or one recorded by a queue-event
    /// task since the previous tick.
    pub fn process_event_queue(&self) -> Result<(), DispatchError> {
        {
            let mut failed = lock(&self.inner.failed);
            if !failed.is_empty() {
                return Err(failed.remove(0));
            }
        }

        loop {
            self.drain_events()?;
            let settled = lock(&self.inner.callbacks).pop();
            match settled {
                Some((callback, params)) => callback(params),
                None => break,
            }
        }
        Ok(())
    }

    /// Drives the bus until [`EventBus::stop`] or a dispatch error.
    ///
    /// Sleeps between ticks; a post (from any task) or a settling
    /// queue-event task wakes it.
    pub async fn run(&self) -> Result<(), DispatchError> {
        loop {
            tokio::select! {
                _ = self.inner.stopped.cancelled() => {
                    debug!("bus stopped: host loop exiting");
                    return Ok(());
                }
                _ = self.inner.wake.notified() => {
                    self.process_event_queue()?;
                }
            }
        }
    }

    /// Drains the pending queue to empty, depth-first.
    ///
    /// Events posted during a dispatch run before the remainder of the
    /// batch that was pending when their poster ran; each suspended
    /// batch resumes, newest first, once the nested posts settle.
    fn drain_events(&self) -> Result<(), DispatchError> {
        let mut suspended: Vec<VecDeque<PostedEvent>> = Vec::new();
        let mut batch = self.take_pending();

        loop {
            let Some(posted) = batch.pop_front() else {
                match suspended.pop() {
                    Some(resumed) => {
                        batch = resumed;
                        continue;
                    }
                    None => break,
                }
            };

            if let Err(err) = self.dispatch(posted) {
                self.restore_pending(batch, suspended);
                return Err(err);
            }

            let nested = self.take_pending();
            if !nested.is_empty() {
                suspended.push(batch);
                batch = nested;
            }
        }
        Ok(())
    }

    fn take_pending(&self) -> VecDeque<PostedEvent> {
        std::mem::take(&mut *lock(&self.inner.queue))
    }

    /// Puts unprocessed events back in dispatch order, ahead of anything
    /// posted since the failing handler ran.
    fn restore_pending(&self, batch: VecDeque<PostedEvent>, suspended: Vec<VecDeque<PostedEvent>>) {
        let mut restored = batch;
        for resumed in suspended.into_iter().rev() {
            restored.extend(resumed);
        }
        let mut queue = lock(&self.inner.queue);
        restored.extend(queue.drain(..));
        *queue = restored;
    }

    fn dispatch(&self, posted: PostedEvent) -> Result<(), DispatchError> {
        match posted.kind {
            EventKind::Queue => {
                self.spawn_queue_event(posted);
                Ok(())
            }
            _ => self.dispatch_sync(posted),
        }
    }

    /// Dispatches one plain/boolean/relay event to its handler snapshot,
    /// then pushes the completion callback (if any) onto the pending
    /// stack.
    fn dispatch_sync(&self, posted: PostedEvent) -> Result<(), DispatchError> {
        debug!(event = %posted.event, kind = posted.kind.as_label(), "processing event");
        let PostedEvent {
            event,
            kind,
            mut params,
            callback,
        } = posted;

        let snapshot = lock(&self.inner.registry).snapshot(&event);
        if let Some(handlers) = snapshot {
            let mut floor = params.min_priority();
            for rh in &handlers {
                if blocked_by_floor(rh.blocking_facility.as_deref(), rh.priority, floor.as_ref()) {
                    trace!(
                        event = %event,
                        handler = rh.handler.name(),
                        priority = rh.priority,
                        "skipped: below blocking filter threshold"
                    );
                    continue;
                }

                let mut merged = params.clone();
                merged.merge_from(&rh.bound);
                if let Some(condition) = &rh.condition {
                    if !condition.evaluate(&merged) {
                        continue;
                    }
                }

                trace!(
                    event = %event,
                    handler = rh.handler.name(),
                    priority = rh.priority,
                    "calling handler"
                );
                let args = EventArgs {
                    event: &event[..],
                    params: &merged,
                };
                match rh.handler.call(&args) {
                    Ok(EventResponse::Continue) => {}
                    Ok(EventResponse::Stop) => {
                        if kind == EventKind::Boolean {
                            debug!(event = %event, handler = rh.handler.name(), "boolean event stopped");
                            params.insert(EV_RESULT_KEY, false);
                            break;
                        }
                    }
                    Ok(EventResponse::Merge(extra)) => {
                        if kind == EventKind::Relay {
                            params.merge_from(&extra);
                        }
                    }
                    Ok(EventResponse::RaisePriorityFloor(map)) => {
                        // Persist the filter so relay chains carry it forward.
                        params.set_min_priority(&map);
                        floor = Some(map);
                    }
                    Err(source) => {
                        return Err(DispatchError::Handler {
                            handler: Arc::from(rh.handler.name()),
                            event: event.clone(),
                            source,
                        });
                    }
                }
            }
        }

        if let Some(callback) = callback {
            lock(&self.inner.callbacks).push((callback, params));
        }
        Ok(())
    }
}

/// True when a registration opted into a facility whose filter threshold
/// exceeds its priority.
pub(crate) fn blocked_by_floor(
    facility: Option<&str>,
    priority: i32,
    floor: Option<&std::collections::BTreeMap<String, i32>>,
) -> bool {
    let (Some(facility), Some(floor)) = (facility, floor) else {
        return false;
    };
    floor.get(facility).is_some_and(|threshold| *threshold > priority)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use crate::config::Config;
    use crate::error::{DispatchError, ParseError};
    use crate::events::params::{EventParams, EV_RESULT_KEY};
    use crate::handlers::{EventResponse, HandlerFn, HandlerRef};

    use super::super::bus::EventBus;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn bus() -> EventBus {
        EventBus::new(Config::default())
    }

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn taken(log: &Log) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    fn recording(log: &Log, label: &'static str) -> HandlerRef {
        let log = log.clone();
        HandlerFn::arc(label, move |_args| {
            log.lock().unwrap().push(label);
            Ok(EventResponse::Continue)
        })
    }

    fn capture_callback() -> (crate::events::EventCallback, Arc<Mutex<Option<EventParams>>>) {
        let slot: Arc<Mutex<Option<EventParams>>> = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        let callback: crate::events::EventCallback = Arc::new(move |params| {
            *sink.lock().unwrap() = Some(params);
        });
        (callback, slot)
    }

    #[test]
    fn handlers_run_priority_descending_ties_in_registration_order() {
        let bus = bus();
        let log = log();
        bus.add_handler("ev", recording(&log, "low"), 10, None, EventParams::new()).unwrap();
        bus.add_handler("ev", recording(&log, "high"), 100, None, EventParams::new()).unwrap();
        bus.add_handler("ev", recording(&log, "tie_a"), 50, None, EventParams::new()).unwrap();
        bus.add_handler("ev", recording(&log, "tie_b"), 50, None, EventParams::new()).unwrap();

        bus.post("ev", EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["high", "tie_a", "tie_b", "low"]);
    }

    #[test]
    fn priority_offset_suffix_reorders() {
        let bus = bus();
        let log = log();
        bus.add_handler("ev", recording(&log, "base"), 11, None, EventParams::new()).unwrap();
        // 10 + 2 = 12, ahead of 11.
        bus.add_handler("ev.2", recording(&log, "offset"), 10, None, EventParams::new()).unwrap();

        bus.post("ev", EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["offset", "base"]);
    }

    #[test]
    fn boolean_stop_short_circuits_and_marks_result() {
        let bus = bus();
        let log = log();
        bus.add_handler(
            "claim",
            HandlerFn::arc("stopper", |_args| Ok(EventResponse::Stop)),
            100,
            None,
            EventParams::new(),
        )
        .unwrap();
        bus.add_handler("claim", recording(&log, "unreached"), 10, None, EventParams::new()).unwrap();

        let (callback, seen) = capture_callback();
        bus.post_boolean_with_callback("claim", callback, EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();

        assert!(taken(&log).is_empty());
        let params = seen.lock().unwrap().take().unwrap();
        assert_eq!(params.get_bool(EV_RESULT_KEY), Some(false));
    }

    #[test]
    fn boolean_without_stop_has_no_result_marker() {
        let bus = bus();
        bus.add_handler(
            "claim",
            HandlerFn::arc("ok", |_args| Ok(EventResponse::Continue)),
            1,
            None,
            EventParams::new(),
        )
        .unwrap();

        let (callback, seen) = capture_callback();
        bus.post_boolean_with_callback("claim", callback, EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();

        let params = seen.lock().unwrap().take().unwrap();
        assert!(!params.contains(EV_RESULT_KEY));
    }

    #[test]
    fn plain_event_ignores_stop_and_merge() {
        let bus = bus();
        let log = log();
        bus.add_handler(
            "ev",
            HandlerFn::arc("stopper", |_args| Ok(EventResponse::Stop)),
            100,
            None,
            EventParams::new(),
        )
        .unwrap();
        bus.add_handler("ev", recording(&log, "after"), 10, None, EventParams::new()).unwrap();

        let (callback, seen) = capture_callback();
        bus.post_with_callback("ev", callback, EventParams::new().with("x", 1)).unwrap();
        bus.process_event_queue().unwrap();

        assert_eq!(taken(&log), vec!["after"]);
        let params = seen.lock().unwrap().take().unwrap();
        assert!(!params.contains(EV_RESULT_KEY));
    }

    #[test]
    fn relay_accumulates_merges_down_the_chain() {
        let bus = bus();
        bus.add_handler(
            "score",
            HandlerFn::arc("doubler", |_args| {
                Ok(EventResponse::Merge(EventParams::new().with("bonus", 50)))
            }),
            100,
            None,
            EventParams::new(),
        )
        .unwrap();

        let seen_by_low: Arc<Mutex<Option<i64>>> = Arc::new(Mutex::new(None));
        let sink = seen_by_low.clone();
        bus.add_handler(
            "score",
            HandlerFn::arc("reader", move |args| {
                *sink.lock().unwrap() = args.params.get_int("bonus");
                Ok(EventResponse::Continue)
            }),
            10,
            None,
            EventParams::new(),
        )
        .unwrap();

        let (callback, seen) = capture_callback();
        bus.post_relay_with_callback("score", callback, EventParams::new().with("base", 100)).unwrap();
        bus.process_event_queue().unwrap();

        assert_eq!(*seen_by_low.lock().unwrap(), Some(50));
        let params = seen.lock().unwrap().take().unwrap();
        assert_eq!(params.get_int("base"), Some(100));
        assert_eq!(params.get_int("bonus"), Some(50));
    }

    #[test]
    fn nested_posts_run_before_older_siblings() {
        let bus = bus();
        let log = log();
        let nested = bus.clone();
        let inner_log = log.clone();
        bus.add_handler(
            "a",
            HandlerFn::arc("a_handler", move |_args| {
                inner_log.lock().unwrap().push("a");
                nested.post("b", EventParams::new()).unwrap();
                Ok(EventResponse::Continue)
            }),
            1,
            None,
            EventParams::new(),
        )
        .unwrap();
        bus.add_handler("b", recording(&log, "b"), 1, None, EventParams::new()).unwrap();
        bus.add_handler("c", recording(&log, "c"), 1, None, EventParams::new()).unwrap();

        bus.post("a", EventParams::new()).unwrap();
        bus.post("c", EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["a", "b", "c"]);
    }

    #[test]
    fn bound_params_win_over_posted_params() {
        let bus = bus();
        let seen: Arc<Mutex<Option<(Option<String>, Option<i64>)>>> = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        bus.add_handler(
            "light_on",
            HandlerFn::arc("light", move |args| {
                *sink.lock().unwrap() = Some((
                    args.params.get_str("color").map(str::to_owned),
                    args.params.get_int("brightness"),
                ));
                Ok(EventResponse::Continue)
            }),
            1,
            None,
            EventParams::new().with("color", "red"),
        )
        .unwrap();

        bus.post("light_on", EventParams::new().with("color", "blue").with("brightness", 80)).unwrap();
        bus.process_event_queue().unwrap();

        let (color, brightness) = seen.lock().unwrap().take().unwrap();
        assert_eq!(color.as_deref(), Some("red"));
        assert_eq!(brightness, Some(80));
    }

    #[test]
    fn condition_suffix_gates_per_invocation() {
        let bus = bus();
        let log = log();
        bus.add_handler("drain{balls > 1}", recording(&log, "multiball"), 1, None, EventParams::new())
            .unwrap();

        bus.post("drain", EventParams::new().with("balls", 1)).unwrap();
        bus.process_event_queue().unwrap();
        assert!(taken(&log).is_empty());

        bus.post("drain", EventParams::new().with("balls", 3)).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["multiball"]);
    }

    #[test]
    fn priority_floor_skips_opted_in_handlers_below_threshold() {
        let bus = bus();
        let log = log();
        bus.add_handler(
            "flash",
            HandlerFn::arc("gate", |_args| {
                let mut floor = BTreeMap::new();
                floor.insert("lights".to_owned(), 50);
                Ok(EventResponse::RaisePriorityFloor(floor))
            }),
            100,
            None,
            EventParams::new(),
        )
        .unwrap();
        bus.add_handler("flash", recording(&log, "dim"), 40, Some("lights"), EventParams::new()).unwrap();
        bus.add_handler("flash", recording(&log, "bright"), 60, Some("lights"), EventParams::new())
            .unwrap();
        bus.add_handler("flash", recording(&log, "sound"), 40, None, EventParams::new()).unwrap();

        let (callback, seen) = capture_callback();
        bus.post_relay_with_callback("flash", callback, EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();

        // "bright" outranks the threshold, "sound" never opted in.
        assert_eq!(taken(&log), vec!["bright", "sound"]);
        let params = seen.lock().unwrap().take().unwrap();
        let floor = params.min_priority().unwrap();
        assert_eq!(floor.get("lights"), Some(&50));
    }

    #[test]
    fn handler_error_aborts_pass_and_keeps_later_events() {
        let bus = bus();
        let log = log();
        bus.add_handler(
            "boom",
            HandlerFn::arc("faulty", |_args| Err("coil stuck".into())),
            100,
            None,
            EventParams::new(),
        )
        .unwrap();
        bus.add_handler("boom", recording(&log, "unreached"), 10, None, EventParams::new()).unwrap();
        bus.add_handler("later", recording(&log, "later"), 1, None, EventParams::new()).unwrap();

        let (callback, seen) = capture_callback();
        bus.post_with_callback("boom", callback, EventParams::new()).unwrap();
        bus.post("later", EventParams::new()).unwrap();

        let err = bus.process_event_queue().unwrap_err();
        match err {
            DispatchError::Handler { handler, event, .. } => {
                assert_eq!(&*handler, "faulty");
                assert_eq!(&*event, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(taken(&log).is_empty());
        assert!(seen.lock().unwrap().is_none());

        // The failing event is consumed; the sibling survives the abort.
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["later"]);
    }

    #[test]
    fn callbacks_settle_last_completed_first() {
        let bus = bus();
        let order = log();
        let make = |label: &'static str| {
            let order = order.clone();
            let callback: crate::events::EventCallback = Arc::new(move |_params| {
                order.lock().unwrap().push(label);
            });
            callback
        };

        bus.post_with_callback("e1", make("c1"), EventParams::new()).unwrap();
        bus.post_with_callback("e2", make("c2"), EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&order), vec!["c2", "c1"]);
    }

    #[test]
    fn unheard_posts_never_enter_the_queue() {
        let bus = bus();
        bus.post("nobody_listens", EventParams::new()).unwrap();
        assert_eq!(bus.pending_events(), 0);
        bus.process_event_queue().unwrap();
    }

    #[test]
    fn posts_after_stop_are_dropped() {
        let bus = bus();
        let log = log();
        bus.add_handler("ev", recording(&log, "h"), 1, None, EventParams::new()).unwrap();
        bus.stop();
        bus.post("ev", EventParams::new()).unwrap();
        assert_eq!(bus.pending_events(), 0);
        assert!(taken(&log).is_empty());
    }

    #[test]
    fn registration_during_pass_affects_next_pass_only() {
        let bus = bus();
        let log = log();
        let outer = bus.clone();
        let outer_log = log.clone();
        bus.add_handler(
            "ev",
            HandlerFn::arc("registrar", move |_args| {
                outer_log.lock().unwrap().push("registrar");
                let late_log = outer_log.clone();
                outer
                    .add_handler(
                        "ev",
                        HandlerFn::arc("late", move |_args| {
                            late_log.lock().unwrap().push("late");
                            Ok(EventResponse::Continue)
                        }),
                        1000,
                        None,
                        EventParams::new(),
                    )
                    .unwrap();
                Ok(EventResponse::Continue)
            }),
            1,
            None,
            EventParams::new(),
        )
        .unwrap();

        bus.post("ev", EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["registrar"]);

        log.lock().unwrap().clear();
        bus.post("ev", EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["late", "registrar"]);
    }

    #[test]
    fn malformed_names_fail_at_the_call_site() {
        let bus = bus();
        assert!(matches!(
            bus.post("ball drain", EventParams::new()),
            Err(ParseError::Whitespace { .. })
        ));
        assert!(matches!(
            bus.add_handler(
                "",
                HandlerFn::arc("h", |_args| Ok(EventResponse::Continue)),
                1,
                None,
                EventParams::new(),
            ),
            Err(ParseError::EmptyName)
        ));
    }

    #[test]
    fn event_names_are_case_insensitive() {
        let bus = bus();
        let log = log();
        bus.add_handler("Ball_Drain", recording(&log, "h"), 1, None, EventParams::new()).unwrap();
        assert!(bus.does_event_exist("BALL_DRAIN"));

        bus.post("ball_drain", EventParams::new()).unwrap();
        bus.process_event_queue().unwrap();
        assert_eq!(taken(&log), vec!["h"]);
    }
}
