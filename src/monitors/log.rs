//! # Simple logging monitor for debugging and demos.
//!
//! [`LogMonitor`] traces every posted event in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! Not intended for production use — implement a custom
//! [`Monitor`](super::Monitor) for structured tracing or metrics
//! collection.

use async_trait::async_trait;
use tracing::info;

use crate::events::PostedEvent;

use super::Monitor;

/// Traces every post at info level.
///
/// Enabled via the `logging` feature.
pub struct LogMonitor;

#[async_trait]
impl Monitor for LogMonitor {
    async fn on_post(&self, post: &PostedEvent) {
        info!(
            event = %post.event,
            kind = post.kind.as_label(),
            callback = post.has_callback(),
            params = ?post.params,
            "event posted"
        );
    }

    fn name(&self) -> &'static str {
        "log_monitor"
    }
}
