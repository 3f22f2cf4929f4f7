//! Reconciliation engine: one tick decides whether to start or stop the
//! replay buffer.
//!
//! The buffer should run while any monitored application runs. The hard part
//! is not fighting the operator: when someone toggles the buffer by hand the
//! engine must not immediately undo it.
//!
//! ## Inferring a manual toggle
//!
//! Every start/stop, whether issued by this engine or by a human, produces a
//! "starting"/"stopping" host event. The engine remembers when it last acted
//! itself; the recorder remembers when the last transition event arrived. An
//! event later than the engine's own action by more than
//! [`SELF_EVENT_TOLERANCE_MICROS`] (or any event when the engine never acted)
//! came from someone else.
//!
//! ## How long an override sticks
//!
//! A manual toggle holds until the monitored applications' running state
//! changes. Launching or quitting a game re-arms automation no matter what the
//! operator did before.

use crate::clock::Clock;
use crate::gateway::BufferGateway;
use crate::paths::MonitoredPaths;
use crate::presence::PresenceOracle;
use crate::recorder::TransitionRecorder;
use serde::Serialize;
use std::sync::Arc;

/// Window after an automatic action within which a transition event is
/// attributed to that action.
pub const SELF_EVENT_TOLERANCE_MICROS: u64 = 2_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutomaticAction {
    pub kind: ActionKind,
    pub at_micros: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresenceSample {
    pub running: bool,
    pub changed_at_micros: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// Automation is switched off; only presence tracking ran.
    Disabled,
    /// Buffer already matches presence.
    Idle,
    Started,
    Stopped,
    /// A manual toggle is being honored.
    OverrideHeld,
    /// Buffer state could not be queried; nothing was issued.
    GatewayUnavailable,
    /// Start or stop was attempted and failed.
    GatewayFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub ticks: u64,
    pub last_outcome: Option<TickOutcome>,
    pub last_automatic_action: Option<AutomaticAction>,
    pub last_observed_event_micros: Option<u64>,
    pub presence: Option<PresenceSample>,
}

pub struct ReconciliationEngine {
    oracle: PresenceOracle,
    gateway: Arc<dyn BufferGateway>,
    recorder: Arc<TransitionRecorder>,
    clock: Arc<dyn Clock>,
    last_action: Option<AutomaticAction>,
    presence: Option<PresenceSample>,
    last_outcome: Option<TickOutcome>,
    ticks: u64,
}

impl ReconciliationEngine {
    pub fn new(
        oracle: PresenceOracle,
        gateway: Arc<dyn BufferGateway>,
        recorder: Arc<TransitionRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            oracle,
            gateway,
            recorder,
            clock,
            last_action: None,
            presence: None,
            last_outcome: None,
            ticks: 0,
        }
    }

    /// Runs one reconciliation tick. The outcome is informational; all
    /// effects go through the gateway.
    pub fn evaluate(&mut self, paths: &MonitoredPaths, automation_enabled: bool) -> TickOutcome {
        self.ticks = self.ticks.saturating_add(1);
        let outcome = self.reconcile(paths, automation_enabled);
        self.last_outcome = Some(outcome);
        outcome
    }

    fn reconcile(&mut self, paths: &MonitoredPaths, automation_enabled: bool) -> TickOutcome {
        let running = self.oracle.is_any_running(paths);

        if !automation_enabled {
            self.track_presence(running);
            return TickOutcome::Disabled;
        }

        let is_on = match self.gateway.is_active() {
            Ok(is_on) => is_on,
            Err(err) => {
                self.track_presence(running);
                tracing::warn!(error = %err, "Failed to query replay buffer state; skipping tick");
                return TickOutcome::GatewayUnavailable;
            }
        };

        let should_enable = running && !is_on;
        let should_disable = !running && is_on;

        let observed = self.recorder.last_observed();
        let user_acted = self.user_action_inferred(observed);
        let presence = self.track_presence(running);

        let would_undo_user = (!is_on && should_enable) || (is_on && should_disable);
        let override_active = user_acted
            && observed.is_some_and(|observed| observed > presence.changed_at_micros);
        if override_active && would_undo_user {
            tracing::debug!(
                running,
                is_on,
                observed = ?observed,
                presence_changed_at = presence.changed_at_micros,
                "Manual buffer toggle detected; holding automation"
            );
            return TickOutcome::OverrideHeld;
        }

        if should_enable {
            return self.issue(ActionKind::Start, paths);
        }
        if should_disable {
            return self.issue(ActionKind::Stop, paths);
        }
        TickOutcome::Idle
    }

    fn issue(&mut self, kind: ActionKind, paths: &MonitoredPaths) -> TickOutcome {
        let result = match kind {
            ActionKind::Start => self.gateway.start(),
            ActionKind::Stop => self.gateway.stop(),
        };

        if let Err(err) = result {
            tracing::warn!(action = ?kind, error = %err, "Replay buffer action failed");
            return TickOutcome::GatewayFailed;
        }

        let at_micros = self.clock.now_micros();
        self.last_action = Some(AutomaticAction { kind, at_micros });
        tracing::info!(
            action = ?kind,
            at_micros,
            monitored = paths.len(),
            "Replay buffer action issued"
        );
        match kind {
            ActionKind::Start => TickOutcome::Started,
            ActionKind::Stop => TickOutcome::Stopped,
        }
    }

    fn user_action_inferred(&self, observed: Option<u64>) -> bool {
        match (observed, self.last_action) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(observed), Some(action)) => {
                observed > action.at_micros.saturating_add(SELF_EVENT_TOLERANCE_MICROS)
            }
        }
    }

    /// Updates the presence sample; `changed_at` only moves when the running
    /// flag flips.
    fn track_presence(&mut self, running: bool) -> PresenceSample {
        let sample = match self.presence {
            Some(previous) if previous.running == running => previous,
            previous => {
                let changed_at_micros = self
                    .clock
                    .now_micros()
                    .max(previous.map_or(0, |sample| sample.changed_at_micros));
                if previous.is_some() {
                    tracing::info!(running, "Monitored application presence changed");
                }
                PresenceSample {
                    running,
                    changed_at_micros,
                }
            }
        };
        self.presence = Some(sample);
        sample
    }

    pub fn last_automatic_action(&self) -> Option<AutomaticAction> {
        self.last_action
    }

    pub fn presence(&self) -> Option<PresenceSample> {
        self.presence
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            ticks: self.ticks,
            last_outcome: self.last_outcome,
            last_automatic_action: self.last_action,
            last_observed_event_micros: self.recorder.last_observed(),
            presence: self.presence,
        }
    }
}
