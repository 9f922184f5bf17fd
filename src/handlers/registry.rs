//! # Handler registry: per-event ordered handler lists.
//!
//! Maps each canonical event name to its registered handlers, kept
//! pre-sorted by priority (descending, stable on ties) so dispatch
//! never sorts. The entry for an event is deleted the moment its list
//! becomes empty — `does_event_exist` and the posting fast path rely on
//! key presence, not list length.
//!
//! ## Rules
//! - Mutation is allowed at any time, including from inside a handler
//!   currently being iterated: dispatch passes work on a snapshot taken
//!   at pass start, so registry mutation only affects subsequent passes.
//! - Handler identity for removal/replacement is the `Arc` pointer of
//!   the registered callable; the opaque [`HandlerKey`] identifies one
//!   registration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::events::params::EventParams;
use crate::names::{Condition, ParsedName};

use super::handler::HandlerRef;

/// Global counter backing opaque handler keys.
static HANDLER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque reference to one handler registration.
///
/// Returned by `add_handler`; pass it back to `remove_handler_by_key`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    id: u64,
    event: Arc<str>,
}

impl HandlerKey {
    fn next(event: Arc<str>) -> Self {
        Self {
            id: HANDLER_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            event,
        }
    }

    /// Canonical event name this key registers under.
    pub fn event(&self) -> &str {
        &self.event
    }
}

/// One registration: callable plus dispatch metadata.
///
/// Immutable once created; identity is the opaque key.
#[derive(Clone)]
pub(crate) struct RegisteredHandler {
    pub handler: HandlerRef,
    pub priority: i32,
    pub bound: EventParams,
    pub key: HandlerKey,
    pub condition: Option<Condition>,
    pub blocking_facility: Option<Arc<str>>,
}

/// Per-event-name ordered collection of registered handlers.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: HashMap<Arc<str>, Vec<RegisteredHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; returns its opaque key.
    ///
    /// Effective priority is `base_priority` plus the offset parsed
    /// from the event string. The event's list is re-sorted priority
    /// descending; `Vec::sort_by` is stable, so ties preserve
    /// registration order.
    pub fn add(
        &mut self,
        parsed: &ParsedName,
        handler: HandlerRef,
        base_priority: i32,
        blocking_facility: Option<Arc<str>>,
        bound: EventParams,
        diagnostics: bool,
    ) -> HandlerKey {
        let priority = base_priority + parsed.priority_offset;
        let key = HandlerKey::next(parsed.name.clone());

        let list = self.handlers.entry(parsed.name.clone()).or_default();
        list.push(RegisteredHandler {
            handler,
            priority,
            bound,
            key: key.clone(),
            condition: parsed.condition.clone(),
            blocking_facility,
        });
        list.sort_by(|a, b| b.priority.cmp(&a.priority));

        if diagnostics {
            debug!(
                event = %parsed.name,
                handler = %list_name(list, &key),
                priority,
                "registered handler"
            );
            Self::verify_handlers(&parsed.name, list);
        }

        key
    }

    /// Warns when two registrations for one event share the same
    /// handler label, priority and condition — their relative order is
    /// undefined across restarts and may produce race-prone behavior.
    fn verify_handlers(event: &str, sorted: &[RegisteredHandler]) {
        let mut run_priority = None;
        let mut seen: Vec<(&str, Option<&str>)> = Vec::new();
        for rh in sorted {
            if run_priority != Some(rh.priority) {
                run_priority = Some(rh.priority);
                seen.clear();
            }
            let fingerprint = (rh.handler.name(), rh.condition.as_ref().map(Condition::source));
            if seen.contains(&fingerprint) {
                warn!(
                    event,
                    handler = fingerprint.0,
                    priority = rh.priority,
                    "duplicate handler at equal priority; relative order is undefined"
                );
            }
            seen.push(fingerprint);
        }
    }

    /// Snapshot of an event's handler list for one dispatch pass.
    pub fn snapshot(&self, event: &str) -> Option<Vec<RegisteredHandler>> {
        self.handlers.get(event).cloned()
    }

    /// True if any handler is registered under the canonical name.
    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Removes the registration identified by `key`.
    pub fn remove_by_key(&mut self, key: &HandlerKey) {
        self.retain(key.event(), |rh| rh.key != *key);
    }

    /// Removes every registration of `handler` under `event`.
    pub fn remove_by_event_handler(&mut self, event: &str, handler: &HandlerRef) {
        self.retain(event, |rh| !same_callable(&rh.handler, handler));
    }

    /// Removes every registration of `handler` across all events.
    pub fn remove_handler(&mut self, handler: &HandlerRef) {
        let events: Vec<Arc<str>> = self.handlers.keys().cloned().collect();
        for event in events {
            self.retain(&event, |rh| !same_callable(&rh.handler, handler));
        }
    }

    /// Removes every registration for `event` and its registry entry.
    pub fn remove_all_for_event(&mut self, event: &str) {
        if self.handlers.remove(event).is_some() {
            debug!(event, "removed all handlers for event");
        }
    }

    /// Removes a prior registration matching `handler` (and `bound`
    /// exactly, when non-empty) ahead of a replacement add.
    pub fn remove_for_replace(&mut self, event: &str, handler: &HandlerRef, bound: &EventParams) {
        self.retain(event, |rh| {
            let callable_match = same_callable(&rh.handler, handler);
            let params_match = bound.is_empty() || rh.bound == *bound;
            !(callable_match && params_match)
        });
    }

    fn retain(&mut self, event: &str, keep: impl Fn(&RegisteredHandler) -> bool) {
        let Some(list) = self.handlers.get_mut(event) else {
            return;
        };
        let before = list.len();
        list.retain(&keep);
        if list.len() != before {
            debug!(event, removed = before - list.len(), "removed handler(s)");
        }
        if list.is_empty() {
            self.handlers.remove(event);
            debug!(event, "removing event entry: no more handlers registered");
        }
    }
}

fn same_callable(a: &HandlerRef, b: &HandlerRef) -> bool {
    Arc::ptr_eq(a, b)
}

fn list_name<'a>(list: &'a [RegisteredHandler], key: &HandlerKey) -> &'a str {
    list.iter()
        .find(|rh| rh.key == *key)
        .map_or("<unknown>", |rh| rh.handler.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::handler::{EventResponse, HandlerFn};
    use crate::names::{ComparisonCompiler, NameParser};

    fn parse(raw: &str) -> Arc<ParsedName> {
        NameParser::new(Arc::new(ComparisonCompiler)).parse(raw).unwrap()
    }

    fn noop(name: &'static str) -> HandlerRef {
        HandlerFn::arc(name, |_args| Ok(EventResponse::Continue))
    }

    #[test]
    fn sorted_by_priority_descending_stable() {
        let mut registry = HandlerRegistry::new();
        let parsed = parse("ev");
        registry.add(&parsed, noop("low"), 1, None, EventParams::new(), false);
        registry.add(&parsed, noop("high"), 10, None, EventParams::new(), false);
        registry.add(&parsed, noop("tie_a"), 5, None, EventParams::new(), false);
        registry.add(&parsed, noop("tie_b"), 5, None, EventParams::new(), false);

        let snapshot = registry.snapshot("ev").unwrap();
        let names: Vec<&str> = snapshot.iter().map(|rh| rh.handler.name()).collect();
        assert_eq!(names, vec!["high", "tie_a", "tie_b", "low"]);
    }

    #[test]
    fn priority_offset_applies_at_registration() {
        let mut registry = HandlerRegistry::new();
        registry.add(&parse("ev.3"), noop("offset"), 1, None, EventParams::new(), false);
        let snapshot = registry.snapshot("ev").unwrap();
        assert_eq!(snapshot[0].priority, 4);
    }

    #[test]
    fn empty_entry_is_deleted() {
        let mut registry = HandlerRegistry::new();
        let key = registry.add(&parse("ev"), noop("h"), 1, None, EventParams::new(), false);
        assert!(registry.contains("ev"));
        registry.remove_by_key(&key);
        assert!(!registry.contains("ev"));
        assert!(registry.snapshot("ev").is_none());
    }

    #[test]
    fn remove_handler_across_events() {
        let mut registry = HandlerRegistry::new();
        let shared = noop("shared");
        registry.add(&parse("a"), shared.clone(), 1, None, EventParams::new(), false);
        registry.add(&parse("b"), shared.clone(), 1, None, EventParams::new(), false);
        registry.add(&parse("b"), noop("other"), 1, None, EventParams::new(), false);

        registry.remove_handler(&shared);
        assert!(!registry.contains("a"));
        assert!(registry.contains("b"));
        assert_eq!(registry.snapshot("b").unwrap().len(), 1);
    }

    #[test]
    fn replace_matches_bound_params_exactly() {
        let mut registry = HandlerRegistry::new();
        let handler = noop("h");
        let parsed = parse("ev");
        let bound = EventParams::new().with("light", "red");
        registry.add(&parsed, handler.clone(), 1, None, bound.clone(), false);
        registry.add(&parsed, handler.clone(), 1, None, EventParams::new().with("light", "blue"), false);

        registry.remove_for_replace("ev", &handler, &bound);
        let snapshot = registry.snapshot("ev").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].bound.get_str("light"), Some("blue"));
    }

    #[test]
    fn snapshot_isolated_from_later_mutation() {
        let mut registry = HandlerRegistry::new();
        let parsed = parse("ev");
        let key = registry.add(&parsed, noop("h"), 1, None, EventParams::new(), false);
        let snapshot = registry.snapshot("ev").unwrap();
        registry.remove_by_key(&key);
        assert_eq!(snapshot.len(), 1);
        assert!(!registry.contains("ev"));
    }
}
