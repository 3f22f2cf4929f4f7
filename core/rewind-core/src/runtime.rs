//! Explicit automation context.
//!
//! Created when the host loads the integration and shut down when it
//! unloads. Owns the tick worker and the event dispatcher; collaborators are
//! injected through [`RuntimeDeps`].

use crate::clock::{Clock, MonotonicClock};
use crate::config::{ConfigSource, SharedConfig};
use crate::engine::{EngineSnapshot, ReconciliationEngine};
use crate::error::Result;
use crate::feedback::{CommandFeedback, FeedbackSink};
use crate::gateway::{BufferGateway, CommandBufferGateway};
use crate::inbox::{EventInbox, EventSender};
use crate::presence::PresenceOracle;
use crate::recorder::TransitionRecorder;
use crate::scheduler::{PollScheduler, SchedulerHandle};
use serde::Serialize;
use std::sync::Arc;

pub struct RuntimeDeps {
    pub oracle: PresenceOracle,
    pub gateway: Arc<dyn BufferGateway>,
    pub feedback: Arc<dyn FeedbackSink>,
    pub clock: Arc<dyn Clock>,
}

impl RuntimeDeps {
    /// Production collaborators: sysinfo enumeration, command-driven gateway
    /// and audio player, monotonic clock.
    pub fn system(config: &Arc<SharedConfig>) -> Self {
        let gateway = CommandBufferGateway::new(Arc::clone(config));
        if !gateway.is_configured() {
            tracing::warn!("Replay buffer gateway commands are incomplete; ticks will be skipped");
        }
        Self {
            oracle: PresenceOracle::system(),
            gateway: Arc::new(gateway),
            feedback: Arc::new(CommandFeedback::new(Arc::clone(config))),
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeHealth {
    pub running: bool,
    pub now_micros: u64,
    pub interval_secs: u64,
    pub automation_enabled: bool,
    pub application_paths: Vec<String>,
    pub engine: EngineSnapshot,
}

pub struct AutomationRuntime {
    config: Arc<SharedConfig>,
    clock: Arc<dyn Clock>,
    recorder: Arc<TransitionRecorder>,
    scheduler: SchedulerHandle,
    inbox: EventInbox,
}

impl AutomationRuntime {
    pub fn start(config: Arc<SharedConfig>, deps: RuntimeDeps) -> Self {
        let RuntimeDeps {
            oracle,
            gateway,
            feedback,
            clock,
        } = deps;

        let recorder = Arc::new(TransitionRecorder::new(Arc::clone(&clock)));
        let inbox = EventInbox::spawn(Arc::clone(&recorder), feedback, Arc::clone(&clock));
        let engine = ReconciliationEngine::new(
            oracle,
            gateway,
            Arc::clone(&recorder),
            Arc::clone(&clock),
        );
        let config_source: Arc<dyn ConfigSource> = config.clone();
        let scheduler = PollScheduler::spawn(config_source, engine);

        tracing::info!(config = ?config.path(), "Automation runtime started");
        Self {
            config,
            clock,
            recorder,
            scheduler,
            inbox,
        }
    }

    /// Producer for host buffer events.
    pub fn events(&self) -> EventSender {
        self.inbox.sender()
    }

    /// Re-reads the config file and wakes the scheduler. A bad file leaves
    /// the previous config running.
    pub fn reload(&self) -> Result<()> {
        self.config.reload()?;
        self.scheduler.reload();
        Ok(())
    }

    pub fn health(&self) -> RuntimeHealth {
        let settings = self.config.poll_settings();
        let mut engine = self.scheduler.snapshot();
        // events arrive between ticks; report the live value
        engine.last_observed_event_micros = self.recorder.last_observed();
        RuntimeHealth {
            running: self.scheduler.is_running(),
            now_micros: self.clock.now_micros(),
            interval_secs: settings.interval_secs,
            automation_enabled: settings.automation_enabled,
            application_paths: settings.paths.entries().to_vec(),
            engine,
        }
    }

    /// Stops ticking first so no evaluation is in flight, then drains and
    /// stops event delivery.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.inbox.shutdown();
    }
}

impl Drop for AutomationRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
