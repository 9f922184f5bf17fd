//! # Global dispatch configuration.
//!
//! Provides [`Config`], the centralized settings for an [`EventBus`](crate::EventBus).
//!
//! ## Field semantics
//! - `production = true` trades registration-time diagnostics for speed
//!   (no registration tracing, no duplicate-order warnings). Dispatch
//!   semantics are identical in both modes.

/// Global configuration for the event dispatch core.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Suppresses registration-time validation and diagnostics.
    ///
    /// When set:
    /// - handler registrations are not traced
    /// - duplicate-order warnings (same event, same priority, same
    ///   condition, same handler label) are not emitted
    ///
    /// Event-name parsing is never skipped; the canonical name is
    /// required for registry keying and the fast path.
    pub production: bool,
}

impl Config {
    /// Returns whether registration diagnostics should run.
    #[inline]
    pub fn diagnostics_enabled(&self) -> bool {
        !self.production
    }
}
