//! Error types used by the eventvisor dispatch core.
//!
//! This module defines two main error enums:
//!
//! - [`ParseError`] — registration-time failures: malformed event-name
//!   syntax or an uncompilable condition expression.
//! - [`DispatchError`] — failures surfacing out of a scheduler tick,
//!   primarily a handler error wrapped with the handler identity and
//!   the event it was responding to.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics.

use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced while parsing an event-name string.
///
/// Raised synchronously from registration or from the first post of a
/// name, since parse results are compiled once and memoized.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Event name was empty.
    #[error("event name is empty")]
    EmptyName,

    /// Event name contains whitespace (outside a condition expression).
    #[error("whitespace in event name {name:?}")]
    Whitespace {
        /// The offending raw event string.
        name: String,
    },

    /// A `{` without a closing `}`, a `}` without an opening `{`, or a
    /// brace in a position where no condition suffix is possible.
    #[error("unmatched or misplaced brace in event name {name:?}")]
    UnmatchedBrace {
        /// The offending raw event string.
        name: String,
    },

    /// A `.suffix` that does not parse as an integer priority offset.
    #[error("non-integer priority suffix {suffix:?} in event name {name:?}")]
    BadPrioritySuffix {
        /// The offending raw event string.
        name: String,
        /// The suffix that failed to parse.
        suffix: String,
    },

    /// The condition expression between braces failed to compile.
    #[error("invalid condition {expr:?}: {reason}")]
    BadCondition {
        /// The expression text between the braces.
        expr: String,
        /// Compiler diagnostic.
        reason: String,
    },
}

impl ParseError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ParseError::EmptyName => "parse_empty_name",
            ParseError::Whitespace { .. } => "parse_whitespace",
            ParseError::UnmatchedBrace { .. } => "parse_unmatched_brace",
            ParseError::BadPrioritySuffix { .. } => "parse_bad_priority_suffix",
            ParseError::BadCondition { .. } => "parse_bad_condition",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by event dispatch.
///
/// A handler failure aborts the remainder of its dispatch pass and
/// propagates out of [`process_event_queue`](crate::EventBus::process_event_queue)
/// to whatever owns the host loop; there is no per-handler retry or
/// isolation inside the core.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A handler returned an error while responding to an event.
    #[error("handler {handler:?} failed for event {event:?}: {source}")]
    Handler {
        /// Name label of the failing handler.
        handler: Arc<str>,
        /// Canonical name of the event being dispatched.
        event: Arc<str>,
        /// The handler's own error.
        #[source]
        source: BoxError,
    },

    /// An event name failed to parse at post time.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Handler { .. } => "dispatch_handler_failed",
            DispatchError::Parse(err) => err.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::Handler { handler, event, source } => {
                format!("handler={handler} event={event} error={source}")
            }
            DispatchError::Parse(err) => err.as_message(),
        }
    }
}
