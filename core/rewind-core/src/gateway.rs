//! Replay buffer control surface.
//!
//! Start and stop are fire-and-forget: a successful call only means the
//! request was issued. The transition itself shows up later as a host event.

use crate::config::{GatewayConfig, SharedConfig};
use crate::error::{Result, RewindError};
use std::process::{Command, Stdio};
use std::sync::Arc;

pub trait BufferGateway: Send + Sync {
    fn is_active(&self) -> Result<bool>;
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
}

/// Drives an external control tool through configured argv commands. The
/// commands are read from the live config on every call, so a reload takes
/// effect without rebuilding the gateway.
#[derive(Debug, Clone)]
pub struct CommandBufferGateway {
    config: Arc<SharedConfig>,
}

impl CommandBufferGateway {
    pub fn new(config: Arc<SharedConfig>) -> Self {
        Self { config }
    }

    pub fn is_configured(&self) -> bool {
        let GatewayConfig {
            status,
            start,
            stop,
        } = self.commands();
        !status.is_empty() && !start.is_empty() && !stop.is_empty()
    }

    fn commands(&self) -> GatewayConfig {
        self.config.current().gateway
    }
}

impl BufferGateway for CommandBufferGateway {
    fn is_active(&self) -> Result<bool> {
        let status = run_command(&self.commands().status, "status")?;
        Ok(status.success())
    }

    fn start(&self) -> Result<()> {
        require_success(&self.commands().start, "start")
    }

    fn stop(&self) -> Result<()> {
        require_success(&self.commands().stop, "stop")
    }
}

fn run_command(argv: &[String], label: &'static str) -> Result<std::process::ExitStatus> {
    let (program, args) = argv
        .split_first()
        .ok_or(RewindError::GatewayNotConfigured(label))?;
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|err| RewindError::CommandFailed {
            command: argv.join(" "),
            details: err.to_string(),
        })
}

fn require_success(argv: &[String], label: &'static str) -> Result<()> {
    let status = run_command(argv, label)?;
    if status.success() {
        Ok(())
    } else {
        Err(RewindError::CommandFailed {
            command: argv.join(" "),
            details: format!("exited with {}", status),
        })
    }
}
