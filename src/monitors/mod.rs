//! Post observers: the monitor trait and its fan-out set.
//!
//! When the monitor-all-posts flag is enabled (by attaching a monitor),
//! every [`PostedEvent`](crate::PostedEvent) — including ones that
//! would otherwise take the no-listener fast path — is handed to the
//! [`MonitorSet`] before it is enqueued.

mod monitor;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use monitor::Monitor;
pub(crate) use set::MonitorSet;

#[cfg(feature = "logging")]
pub use log::LogMonitor;
