//! rewind-ctl: command-line client for the rewind daemon.
//!
//! The host integration calls `rewind-ctl event <kind>` from its replay
//! buffer callbacks. Operators use the rest to edit the monitored list,
//! reload config and inspect the daemon.
//!
//! ## Subcommands
//!
//! - `event`: Forward a replay buffer event to the daemon
//! - `reload` / `health` / `shutdown`: Daemon control
//! - `paths`: List or edit monitored application paths
//! - `check`: One-shot presence query, no daemon needed

mod daemon_client;
mod logging;
mod paths;

use clap::{Parser, Subcommand};
use daemon_client::DaemonClient;
use rewind_core::config::{daemon_socket_path, default_config_path, load_config};
use rewind_core::{BufferEvent, MonitoredPaths, PresenceOracle};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rewind-ctl")]
#[command(about = "Replay buffer automation control")]
#[command(version)]
struct Cli {
    /// Daemon socket (defaults to $REWIND_DAEMON_SOCKET or ~/.rewind/daemon.sock)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Config file (defaults to $REWIND_CONFIG or ~/.rewind/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward a replay buffer event (starting, stopping, started, stopped, saved)
    Event {
        #[arg(value_name = "KIND")]
        kind: BufferEvent,
    },

    /// Ask the daemon to re-read its config file
    Reload,

    /// Print daemon health as JSON
    Health,

    /// Stop the daemon
    Shutdown,

    /// Manage monitored application paths
    Paths {
        #[command(subcommand)]
        action: PathsAction,
    },

    /// Report whether any monitored application is running
    Check {
        /// Paths to check instead of the configured list
        #[arg(value_name = "PATH")]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PathsAction {
    /// Print one entry per line
    List,
    /// Add an executable path
    Add {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Remove an entry exactly as listed
    Remove {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Remove every entry
    Clear,
}

fn main() -> ExitCode {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            tracing::error!(error = %message, "rewind-ctl failed");
            eprintln!("rewind-ctl: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let Cli {
        socket,
        config,
        command,
    } = cli;

    let client = || -> Result<DaemonClient, String> {
        let socket = match socket.clone() {
            Some(path) => path,
            None => daemon_socket_path()?,
        };
        Ok(DaemonClient::new(socket))
    };
    let config_path = || -> Result<PathBuf, String> {
        match config.clone() {
            Some(path) => Ok(path),
            None => Ok(default_config_path()?),
        }
    };

    match command {
        Commands::Event { kind } => {
            client()?
                .send_event(kind)
                .map_err(|err| err.to_string())?;
            tracing::debug!(event = %kind, "Event forwarded");
        }
        Commands::Reload => {
            client()?.reload().map_err(|err| err.to_string())?;
            println!("reloaded");
        }
        Commands::Health => {
            let data = client()?.health().map_err(|err| err.to_string())?;
            let rendered = serde_json::to_string_pretty(&data).map_err(|err| err.to_string())?;
            println!("{}", rendered);
        }
        Commands::Shutdown => {
            client()?.shutdown().map_err(|err| err.to_string())?;
            println!("stopping");
        }
        Commands::Paths { action } => {
            let path = config_path()?;
            let changed = match action {
                PathsAction::List => {
                    for entry in paths::list(&path)?.entries() {
                        println!("{}", entry);
                    }
                    false
                }
                PathsAction::Add { path: raw } => {
                    let cwd = std::env::current_dir().ok();
                    match paths::add(&path, &raw, cwd.as_deref())? {
                        Some(entry) => {
                            println!("added {}", entry);
                            true
                        }
                        None => return Err("path must not be empty".to_string()),
                    }
                }
                PathsAction::Remove { path: entry } => {
                    if !paths::remove(&path, &entry)? {
                        return Err(format!("{} is not monitored", entry.trim()));
                    }
                    println!("removed {}", entry.trim());
                    true
                }
                PathsAction::Clear => {
                    let dropped = paths::clear(&path)?;
                    println!("cleared {} path(s)", dropped);
                    dropped > 0
                }
            };
            if changed {
                notify_daemon(&client()?);
            }
        }
        Commands::Check { paths: requested } => {
            let monitored = if requested.is_empty() {
                load_config(&config_path()?)?.monitor.paths()
            } else {
                requested.into_iter().collect::<MonitoredPaths>()
            };
            if monitored.is_empty() {
                println!("no monitored paths");
                return Ok(ExitCode::from(1));
            }
            let matches = PresenceOracle::system().running_matches(&monitored);
            if matches.is_empty() {
                println!("not running");
                return Ok(ExitCode::from(1));
            }
            for (pid, path) in matches {
                println!("{}\t{}", pid, path.display());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Config edits apply on the next daemon reload; a stopped daemon picks them
/// up at startup, so failure here is only reported.
fn notify_daemon(client: &DaemonClient) {
    if let Err(err) = client.reload() {
        tracing::warn!(error = %err, socket = %client.socket().display(), "Daemon reload after edit failed");
        eprintln!("note: daemon not reloaded ({})", err);
    }
}
