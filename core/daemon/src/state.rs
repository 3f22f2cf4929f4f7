//! Runtime state owned by the daemon.
//!
//! Connection threads share one `DaemonState`. Event forwarding goes through
//! a cloned sender so a slow health or reload request never delays an event.

use chrono::{DateTime, Utc};
use rewind_core::{AutomationRuntime, BufferEvent, EventSender, RuntimeHealth};
use std::sync::{Mutex, PoisonError};

pub struct DaemonState {
    runtime: Mutex<AutomationRuntime>,
    events: EventSender,
    started_at: DateTime<Utc>,
}

impl DaemonState {
    pub fn new(runtime: AutomationRuntime) -> Self {
        let events = runtime.events();
        Self {
            runtime: Mutex::new(runtime),
            events,
            started_at: Utc::now(),
        }
    }

    /// Returns false once the runtime has shut down.
    pub fn forward_event(&self, event: BufferEvent) -> bool {
        self.events.send(event)
    }

    pub fn reload(&self) -> rewind_core::Result<()> {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reload()
    }

    pub fn health(&self) -> RuntimeHealth {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .health()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn shutdown(&self) {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown();
    }
}
