//! Rewind daemon entrypoint.
//!
//! Owns the automation runtime for its whole lifetime and exposes it over a
//! Unix socket: the host integration forwards replay buffer events, operators
//! reload config or ask for health. One request per connection, newline
//! delimited JSON both ways.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rewind_core::config::{daemon_socket_path, default_config_path};
use rewind_core::{AutomationRuntime, RuntimeDeps, SharedConfig};
use rewind_daemon_protocol::{
    parse_event, ErrorInfo, Method, Request, Response, ERROR_INVALID_PARAMS,
    ERROR_PROTOCOL_MISMATCH, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

mod state;

use state::DaemonState;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let socket_path = match daemon_socket_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon socket path");
            std::process::exit(1);
        }
    };

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    let config_path = match default_config_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve config path");
            std::process::exit(1);
        }
    };
    let config = Arc::new(SharedConfig::load_or_default(config_path));
    let settings = config.current().poll_settings();
    info!(
        config = ?config.path(),
        interval_secs = settings.interval_secs,
        automation_enabled = settings.automation_enabled,
        paths = settings.paths.len(),
        "Config loaded"
    );

    let deps = RuntimeDeps::system(&config);
    let state = Arc::new(DaemonState::new(AutomationRuntime::start(config, deps)));

    info!(path = %socket_path.display(), "Rewind daemon started");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&state);
                let socket_path = socket_path.clone();
                thread::spawn(move || handle_connection(stream, state, socket_path));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("REWIND_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<DaemonState>, socket_path: PathBuf) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let method = request.method;
    let response = handle_request(request, &state);
    let stopping = method == Method::Shutdown && response.ok;
    let _ = write_response(&mut stream, response);

    if stopping {
        drop(stream);
        shutdown(&state, &socket_path);
    }
}

/// Stops ticking and event delivery, removes the socket, exits.
fn shutdown(state: &DaemonState, socket_path: &Path) -> ! {
    info!("Shutdown requested");
    state.shutdown();
    if let Err(err) = remove_existing_socket(socket_path) {
        warn!(error = %err, "Failed to remove daemon socket on shutdown");
    }
    info!("Rewind daemon stopped");
    std::process::exit(0);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &DaemonState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            ERROR_PROTOCOL_MISMATCH,
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => {
            let mut data = serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
                "started_at": state.started_at().to_rfc3339(),
            });
            match serde_json::to_value(state.health()) {
                Ok(value) => data["runtime"] = value,
                Err(err) => warn!(error = %err, "Failed to serialize runtime health"),
            }
            Response::ok(request.id, data)
        }
        Method::Event => handle_event(request, state),
        Method::Reload => match state.reload() {
            Ok(()) => {
                info!("Config reloaded");
                Response::ok(request.id, serde_json::json!({ "reloaded": true }))
            }
            Err(err) => {
                warn!(error = %err, "Config reload failed; keeping previous config");
                Response::error(request.id, "reload_failed", err.to_string())
            }
        },
        Method::Shutdown => Response::ok(request.id, serde_json::json!({ "stopping": true })),
    }
}

fn handle_event(request: Request, state: &DaemonState) -> Response {
    let params = match request.params {
        Some(params) => params,
        None => {
            return Response::error(
                request.id,
                ERROR_INVALID_PARAMS,
                "event payload is required",
            )
        }
    };

    let params = match parse_event(params) {
        Ok(params) => params,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    info!(
        event = %params.event,
        recorded_at = ?params.recorded_at,
        "Received buffer event"
    );

    if !state.forward_event(params.event) {
        return Response::error(
            request.id,
            "runtime_stopped",
            "automation runtime is shutting down",
        );
    }

    Response::ok(request.id, serde_json::json!({ "accepted": true }))
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
