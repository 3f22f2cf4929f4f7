//! Periodic driver for the reconciliation engine.
//!
//! One worker thread ticks the engine every `interval_secs`. Between ticks it
//! sleeps on a condvar, so reload and cancel wake it immediately instead of
//! waiting out a stale interval. Paths and interval are re-read at the top of
//! each loop body; the automation flag is re-read on every tick.

use crate::config::ConfigSource;
use crate::engine::{EngineSnapshot, ReconciliationEngine};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SignalState {
    reload: bool,
    cancel: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Wake {
    Elapsed,
    Reload,
    Cancel,
}

#[derive(Debug, Default)]
struct Signals {
    state: Mutex<SignalState>,
    wake: Condvar,
}

impl Signals {
    fn raise(&self, apply: impl FnOnce(&mut SignalState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state);
        self.wake.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel
    }

    fn clear_reload(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reload = false;
    }

    /// Sleeps up to `interval`; returns early on cancel or reload. Flags are
    /// checked before sleeping so a signal raised mid-tick is not lost.
    fn wait(&self, interval: Duration) -> Wake {
        let deadline = Instant::now() + interval;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.cancel {
                return Wake::Cancel;
            }
            if state.reload {
                state.reload = false;
                return Wake::Reload;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Elapsed;
            }
            state = self
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

pub struct PollScheduler {
    config: Arc<dyn ConfigSource>,
    engine: ReconciliationEngine,
    signals: Arc<Signals>,
    status: Arc<Mutex<EngineSnapshot>>,
}

impl PollScheduler {
    /// Starts the tick loop on a background thread.
    pub fn spawn(config: Arc<dyn ConfigSource>, engine: ReconciliationEngine) -> SchedulerHandle {
        let signals = Arc::new(Signals::default());
        let status = Arc::new(Mutex::new(engine.snapshot()));
        let scheduler = PollScheduler {
            config,
            engine,
            signals: Arc::clone(&signals),
            status: Arc::clone(&status),
        };
        let worker = thread::spawn(move || scheduler.run());
        SchedulerHandle {
            signals,
            status,
            worker: Some(worker),
        }
    }

    fn run(mut self) {
        'reload: loop {
            if self.signals.is_cancelled() {
                break;
            }
            self.signals.clear_reload();

            let settings = self.config.poll_settings();
            let interval = Duration::from_secs(settings.interval_secs);
            tracing::info!(
                paths = ?settings.paths.entries(),
                interval_secs = settings.interval_secs,
                "Using monitored application paths and check interval"
            );

            loop {
                let automation_enabled = self.config.automation_enabled();
                let outcome = self.engine.evaluate(&settings.paths, automation_enabled);
                tracing::trace!(outcome = ?outcome, "Reconciliation tick finished");
                self.publish();

                match self.signals.wait(interval) {
                    Wake::Elapsed => {}
                    Wake::Reload => continue 'reload,
                    Wake::Cancel => break 'reload,
                }
            }
        }
        tracing::info!("Poll scheduler stopped");
    }

    fn publish(&self) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = self.engine.snapshot();
    }
}

/// Control handle for a running scheduler. Dropping it shuts the worker down.
pub struct SchedulerHandle {
    signals: Arc<Signals>,
    status: Arc<Mutex<EngineSnapshot>>,
    worker: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Re-reads configuration before the next sleep.
    pub fn reload(&self) {
        self.signals.raise(|state| state.reload = true);
    }

    /// Cancels the loop and waits for the in-flight tick, if any, to finish.
    /// Returns only once no further ticks can happen.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.signals.raise(|state| state.cancel = true);
        if worker.join().is_err() {
            tracing::error!("Poll scheduler worker panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Engine state as of the last completed tick.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
