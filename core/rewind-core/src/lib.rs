//! # rewind-core
//!
//! Keeps a replay buffer running while any monitored application is running,
//! and stops it otherwise, without fighting an operator who toggles the
//! buffer by hand.
//!
//! ## Design Principles
//!
//! - **Synchronous**: plain threads and condvars, no async runtime.
//! - **Injected collaborators**: process enumeration, buffer control and audio
//!   feedback sit behind traits and are handed in at construction.
//! - **Graceful degradation**: a process that cannot be inspected is skipped,
//!   a missing config file yields defaults, a failing gateway skips a tick.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rewind_core::{AutomationRuntime, RuntimeDeps, SharedConfig};
//!
//! let config = Arc::new(SharedConfig::load(None)?);
//! let deps = RuntimeDeps::system(&config);
//! let mut runtime = AutomationRuntime::start(config, deps);
//! runtime.events().send(BufferEvent::Stopping);
//! runtime.shutdown();
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod inbox;
pub mod paths;
pub mod presence;
pub mod recorder;
pub mod runtime;
pub mod scheduler;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    ConfigSource, FeedbackConfig, GatewayConfig, PollSettings, RewindConfig, SharedConfig,
};
pub use engine::{
    ActionKind, AutomaticAction, EngineSnapshot, PresenceSample, ReconciliationEngine,
    TickOutcome, SELF_EVENT_TOLERANCE_MICROS,
};
pub use error::{Result, RewindError};
pub use feedback::{CommandFeedback, FeedbackSink, SilentFeedback};
pub use gateway::{BufferGateway, CommandBufferGateway};
pub use inbox::{EventInbox, EventSender};
pub use paths::MonitoredPaths;
pub use presence::{PresenceOracle, ProcessEntry, ProcessSource, SysinfoProcessSource};
pub use recorder::TransitionRecorder;
pub use rewind_daemon_protocol::BufferEvent;
pub use runtime::{AutomationRuntime, RuntimeDeps, RuntimeHealth};
pub use scheduler::{PollScheduler, SchedulerHandle};
