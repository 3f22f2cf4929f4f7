//! Last observed transition-begin timestamp.
//!
//! Written by event delivery, read by the engine on every tick. Last writer
//! wins.

use crate::clock::Clock;
use std::sync::{Arc, Mutex, PoisonError};

pub struct TransitionRecorder {
    clock: Arc<dyn Clock>,
    last_observed: Mutex<Option<u64>>,
}

impl TransitionRecorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_observed: Mutex::new(None),
        }
    }

    /// Records "now" as the latest transition begin.
    pub fn on_transition_begin(&self) {
        self.record_at(self.clock.now_micros());
    }

    /// Records a timestamp taken when the event entered the process.
    pub fn record_at(&self, observed_at: u64) {
        *self
            .last_observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(observed_at);
        tracing::debug!(observed_at, "Buffer transition observed");
    }

    pub fn last_observed(&self) -> Option<u64> {
        *self
            .last_observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
