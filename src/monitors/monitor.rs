//! # Monitor trait: pure observers of every posted event.
//!
//! `Monitor` is the extension point for tracing/debugging tools that
//! want to see every [`PostedEvent`] flowing into the bus. Monitors are
//! pure observers — they have no effect on dispatch order. Each monitor
//! is driven by a dedicated worker loop fed by a bounded queue owned by
//! the [`MonitorSet`](super::MonitorSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) — they do **not**
//!   block the posting path nor other monitors.
//! - Each monitor **declares** its preferred queue capacity via
//!   [`Monitor::queue_capacity`]. If a queue overflows, posts for that
//!   monitor are **dropped** (warn).

use async_trait::async_trait;

use crate::events::PostedEvent;

/// Contract for post observers.
///
/// Called from a monitor-dedicated worker task. Implementations should
/// avoid blocking the async runtime (prefer async I/O and cooperative
/// waits).
#[async_trait]
pub trait Monitor: Send + Sync + 'static {
    /// Observes a single posted event.
    async fn on_post(&self, post: &PostedEvent);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this monitor's queue.
    ///
    /// On overflow, posts for this monitor are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
