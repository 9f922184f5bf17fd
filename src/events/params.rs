//! # Event parameter bag.
//!
//! Every posted event carries an open, extensible map of named
//! parameters ([`EventParams`]); handlers may also register with bound
//! parameters that are merged into the posted ones per invocation.
//!
//! Three keys are reserved by the dispatch core:
//! - [`QUEUE_KEY`] — the suspension barrier handed to queue-event
//!   handlers (and the one place a caller may supply their own).
//! - [`EV_RESULT_KEY`] — set to `false` when a boolean event was
//!   short-circuited, so the completion callback can observe it.
//! - [`MIN_PRIORITY_KEY`] — the priority-gated blocking filter
//!   (facility name → priority threshold) that persists in parameters
//!   forwarded through relay chains.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::events::queued::QueuedEvent;

/// Reserved key carrying the queue-event suspension barrier.
pub const QUEUE_KEY: &str = "queue";

/// Reserved key marking a short-circuited boolean event.
pub const EV_RESULT_KEY: &str = "ev_result";

/// Reserved key carrying the priority-gated blocking filter.
pub const MIN_PRIORITY_KEY: &str = "min_priority";

/// A single parameter value.
///
/// `Barrier` exists so that a caller-supplied suspension barrier can
/// travel through the merged-parameter lookup under [`QUEUE_KEY`].
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent/none marker.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested map of values.
    Map(BTreeMap<String, Value>),
    /// Queue-event suspension barrier (reserved `queue` key).
    Barrier(Arc<QueuedEvent>),
}

impl Value {
    /// Truthiness used when a condition references a bare parameter name.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Barrier(_) => true,
        }
    }

    /// Returns the barrier if this value holds one.
    pub fn as_barrier(&self) -> Option<&Arc<QueuedEvent>> {
        match self {
            Value::Barrier(b) => Some(b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            // Barrier identity is the Arc pointer.
            (Value::Barrier(a), Value::Barrier(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<Arc<QueuedEvent>> for Value {
    fn from(v: Arc<QueuedEvent>) -> Self {
        Value::Barrier(v)
    }
}

/// Open parameter map attached to posts and handler registrations.
///
/// ## Example
/// ```rust
/// use eventvisor::{EventParams, Value};
///
/// let params = EventParams::new().with("balls", 3).with("tilted", false);
/// assert_eq!(params.get("balls"), Some(&Value::Int(3)));
/// assert!(!params.contains("player"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventParams(BTreeMap<String, Value>);

impl EventParams {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts a value, replacing any previous one under the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes a key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Typed accessor: boolean value under `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Typed accessor: integer value under `key`.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Typed accessor: string value under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Copies every entry of `other` into `self`; `other` wins conflicts.
    pub fn merge_from(&mut self, other: &EventParams) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Barrier stored under the reserved [`QUEUE_KEY`], if any.
    pub fn barrier(&self) -> Option<Arc<QueuedEvent>> {
        self.0.get(QUEUE_KEY).and_then(Value::as_barrier).cloned()
    }

    /// Priority-gated blocking filter stored under [`MIN_PRIORITY_KEY`].
    ///
    /// Only integer entries of the nested map are meaningful; anything
    /// else is ignored.
    pub fn min_priority(&self) -> Option<BTreeMap<String, i32>> {
        let Some(Value::Map(map)) = self.0.get(MIN_PRIORITY_KEY) else {
            return None;
        };
        let mut floor = BTreeMap::new();
        for (facility, value) in map {
            if let Value::Int(threshold) = value {
                floor.insert(facility.clone(), *threshold as i32);
            }
        }
        Some(floor)
    }

    /// Installs (or replaces) the blocking filter under [`MIN_PRIORITY_KEY`].
    pub fn set_min_priority(&mut self, floor: &BTreeMap<String, i32>) {
        let map: BTreeMap<String, Value> = floor
            .iter()
            .map(|(facility, threshold)| (facility.clone(), Value::Int(i64::from(*threshold))))
            .collect();
        self.0.insert(MIN_PRIORITY_KEY.to_owned(), Value::Map(map));
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for EventParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_from_other_wins() {
        let mut base = EventParams::new().with("a", 1).with("b", 2);
        let over = EventParams::new().with("b", 20).with("c", 30);
        base.merge_from(&over);
        assert_eq!(base.get_int("a"), Some(1));
        assert_eq!(base.get_int("b"), Some(20));
        assert_eq!(base.get_int("c"), Some(30));
    }

    #[test]
    fn min_priority_round_trip() {
        let mut floor = BTreeMap::new();
        floor.insert("light".to_owned(), 8);
        let mut params = EventParams::new();
        params.set_min_priority(&floor);
        assert_eq!(params.min_priority(), Some(floor));
    }

    #[test]
    fn barrier_travels_by_identity() {
        let barrier = Arc::new(QueuedEvent::new());
        let params = EventParams::new().with(QUEUE_KEY, barrier.clone());
        let found = params.barrier().unwrap();
        assert!(Arc::ptr_eq(&found, &barrier));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("x".into()).truthy());
    }
}
