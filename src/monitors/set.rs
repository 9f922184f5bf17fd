//! # MonitorSet: non-blocking fan-out over attached monitors.
//!
//! [`MonitorSet`] distributes each [`PostedEvent`] to every attached
//! [`Monitor`] **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&PostedEvent)` returns immediately.
//! - Per-monitor FIFO (queue order).
//! - Panics inside monitors are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different monitors.
//! - No retries on per-monitor queue overflow (posts are dropped for
//!   that monitor).
//!
//! ## Diagram
//! ```text
//!    emit(&PostedEvent)
//!        │                        (Arc-clone per monitor)
//!        ├────────────────► [queue M1] ─► worker M1 ─► on_post()
//!        ├────────────────► [queue M2] ─► worker M2 ─► on_post()
//!        └────────────────► [queue MN] ─► worker MN ─► on_post()
//! ```

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::events::PostedEvent;

use super::Monitor;

/// Per-monitor channel with metadata.
struct MonitorChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<PostedEvent>>,
}

/// Composite fan-out with per-monitor bounded queues and worker tasks.
#[derive(Default)]
pub(crate) struct MonitorSet {
    channels: Mutex<Vec<MonitorChannel>>,
}

impl MonitorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a monitor and spawns its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, monitor: Arc<dyn Monitor>) {
        let cap = monitor.queue_capacity().max(1);
        let name = monitor.name();
        let (tx, mut rx) = mpsc::channel::<Arc<PostedEvent>>(cap);

        tokio::spawn(async move {
            while let Some(post) = rx.recv().await {
                let fut = monitor.on_post(post.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    error!(monitor = monitor.name(), ?panic_err, "monitor panicked");
                }
            }
        });

        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MonitorChannel { name, sender: tx });
    }

    /// Fan-out one posted event to all monitors (non-blocking).
    ///
    /// If a monitor's queue is **full** or **closed**, the post is
    /// dropped for it and a warning is logged with the monitor's name.
    pub fn emit(&self, post: &PostedEvent) {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if channels.is_empty() {
            return;
        }
        let post = Arc::new(post.clone());
        for channel in channels.iter() {
            match channel.sender.try_send(Arc::clone(&post)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(monitor = channel.name, "monitor dropped post: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(monitor = channel.name, "monitor dropped post: worker closed");
                }
            }
        }
    }
}
