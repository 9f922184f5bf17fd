//! # EventBusBuilder: assembles a configured bus.
//!
//! The builder is the one place where the condition-compiler seam and
//! monitors are wired in. A bus built without monitors spawns nothing
//! and may be created outside a tokio runtime; attaching a monitor
//! (here or later through [`EventBus::attach_monitor`]) requires
//! runtime context.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Config, EventBus};
//!
//! let bus = EventBus::builder()
//!     .with_config(Config { production: true })
//!     .build();
//! assert!(!bus.monitoring_enabled());
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::monitors::Monitor;
use crate::names::{ComparisonCompiler, ConditionCompiler};

use super::EventBus;

/// Builder for [`EventBus`].
pub struct EventBusBuilder {
    cfg: Config,
    compiler: Arc<dyn ConditionCompiler>,
    monitors: Vec<Arc<dyn Monitor>>,
}

impl EventBusBuilder {
    pub(crate) fn new() -> Self {
        Self {
            cfg: Config::default(),
            compiler: Arc::new(ComparisonCompiler),
            monitors: Vec::new(),
        }
    }

    /// Sets the bus configuration.
    #[must_use]
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Replaces the condition compiler used for `{expr}` suffixes.
    #[must_use]
    pub fn with_condition_compiler(mut self, compiler: Arc<dyn ConditionCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Attaches a monitor at build time.
    ///
    /// With at least one monitor, [`EventBusBuilder::build`] must run
    /// inside a tokio runtime.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    /// Builds the bus and attaches any configured monitors.
    pub fn build(self) -> EventBus {
        let bus = EventBus::from_parts(self.cfg, self.compiler);
        for monitor in self.monitors {
            bus.attach_monitor(monitor);
        }
        bus
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::events::{EventParams, PostedEvent};
    use crate::monitors::Monitor;

    use super::*;

    struct CountingMonitor(AtomicUsize);

    #[async_trait]
    impl Monitor for CountingMonitor {
        async fn on_post(&self, _post: &PostedEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counting_monitor"
        }
    }

    #[test]
    fn builds_without_monitors_outside_a_runtime() {
        let bus = EventBusBuilder::new().build();
        assert!(!bus.monitoring_enabled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn monitors_see_posts_with_no_listeners() {
        let monitor = Arc::new(CountingMonitor(AtomicUsize::new(0)));
        let bus = EventBus::builder()
            .with_config(Config { production: true })
            .with_monitor(monitor.clone())
            .build();
        assert!(bus.monitoring_enabled());

        // Monitoring disables the no-listener fast path.
        bus.post("unheard", EventParams::new()).unwrap();
        assert_eq!(bus.pending_events(), 1);
        bus.process_event_queue().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(monitor.0.load(Ordering::SeqCst), 1);
    }
}
