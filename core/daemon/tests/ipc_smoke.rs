use rewind_daemon_protocol::{Method, Request, Response, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const CONFIG: &str = r#"
[poll]
interval_secs = 30

[gateway]
status = ["false"]
start = ["true"]
stop = ["true"]
"#;

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn temp_home() -> TempDir {
    tempfile::Builder::new()
        .prefix("rewind-daemon-smoke")
        .tempdir_in("/tmp")
        .expect("Failed to create temp HOME")
}

fn write_config(home: &Path, content: &str) {
    let dir = home.join(".rewind");
    std::fs::create_dir_all(&dir).expect("create config dir");
    std::fs::write(dir.join("config.toml"), content).expect("write config");
}

fn spawn_daemon(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_rewind-daemon"))
        .env("HOME", home)
        .env_remove("REWIND_CONFIG")
        .env_remove("REWIND_DAEMON_SOCKET")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn rewind-daemon")
}

fn socket_path(home: &Path) -> PathBuf {
    home.join(".rewind").join("daemon.sock")
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() && UnixStream::connect(path).is_ok() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon socket at {}", path.display());
}

fn send_request(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    serde_json::to_writer(&mut stream, &request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

fn health(socket: &Path) -> Value {
    let response = send_request(
        socket,
        Request::new(Method::GetHealth, Some("health-check".to_string()), None),
    );
    assert!(response.ok, "health response was not ok");
    response.data.expect("health payload")
}

fn wait_for_health(socket: &Path, check: impl Fn(&Value) -> bool) -> Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let data = health(socket);
        if check(&data) {
            return data;
        }
        assert!(Instant::now() < deadline, "health never matched: {}", data);
        sleep(Duration::from_millis(25));
    }
}

#[test]
fn daemon_ipc_health_event_and_reload_smoke() {
    let home = temp_home();
    write_config(home.path(), CONFIG);
    let socket = socket_path(home.path());
    let _guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };
    wait_for_socket(&socket, Duration::from_secs(5));

    let data = wait_for_health(&socket, |data| data["runtime"]["engine"]["ticks"].as_u64() >= Some(1));
    assert_eq!(data["status"], "ok");
    assert_eq!(data["protocol_version"], PROTOCOL_VERSION);
    assert_eq!(data["runtime"]["running"], true);
    assert_eq!(data["runtime"]["interval_secs"], 30);
    assert_eq!(data["runtime"]["engine"]["last_outcome"], "idle");
    assert!(data["runtime"]["engine"]["last_observed_event_micros"].is_null());

    let event = send_request(
        &socket,
        Request::new(
            Method::Event,
            Some("evt-1".to_string()),
            Some(json!({ "event": "stopping", "recorded_at": "2026-10-18T12:00:00Z" })),
        ),
    );
    assert!(event.ok, "event response was not ok");
    assert_eq!(event.id.as_deref(), Some("evt-1"));
    wait_for_health(&socket, |data| {
        data["runtime"]["engine"]["last_observed_event_micros"].is_u64()
    });

    write_config(
        home.path(),
        &format!("{}\n[monitor]\napplication_paths = \"/opt/a;/opt/b\"\n", CONFIG)
            .replace("interval_secs = 30", "interval_secs = 7"),
    );
    let reload = send_request(&socket, Request::new(Method::Reload, None, None));
    assert!(reload.ok, "reload response was not ok");

    let data = health(&socket);
    assert_eq!(data["runtime"]["interval_secs"], 7);
    assert_eq!(data["runtime"]["application_paths"], json!(["/opt/a", "/opt/b"]));
}

#[test]
fn daemon_rejects_protocol_mismatch() {
    let home = temp_home();
    let socket = socket_path(home.path());
    let _guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };
    wait_for_socket(&socket, Duration::from_secs(5));

    let mut request = Request::new(Method::GetHealth, Some("old-client".to_string()), None);
    request.protocol_version = PROTOCOL_VERSION + 1;
    let response = send_request(&socket, request);
    assert!(!response.ok);
    assert_eq!(response.id.as_deref(), Some("old-client"));
    assert_eq!(
        response.error.map(|err| err.code),
        Some("protocol_mismatch".to_string())
    );
}

#[test]
fn daemon_shutdown_request_exits_and_removes_socket() {
    let home = temp_home();
    write_config(home.path(), CONFIG);
    let socket = socket_path(home.path());
    let mut guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };
    wait_for_socket(&socket, Duration::from_secs(5));

    let response = send_request(&socket, Request::new(Method::Shutdown, None, None));
    assert!(response.ok, "shutdown response was not ok");

    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = guard.child.try_wait().expect("poll daemon") {
            break status;
        }
        assert!(Instant::now() < deadline, "daemon did not exit after shutdown");
        sleep(Duration::from_millis(25));
    };
    assert!(status.success());
    assert!(!socket.exists());
}
