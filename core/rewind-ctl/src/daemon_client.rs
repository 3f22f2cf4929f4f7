//! Client for the rewind daemon socket.
//!
//! One request per connection. Event forwarding retries once when the
//! daemon could not be reached, since the host fires events right as the
//! daemon may be restarting. Once a request has been written it is never
//! re-sent: a duplicate transition event would be stamped late and read as a
//! manual toggle.

use rewind_daemon_protocol::{
    BufferEvent, EventParams, Method, Request, Response, MAX_REQUEST_BYTES,
};
use serde_json::Value;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

const READ_TIMEOUT_MS: u64 = 2_000;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Daemon I/O failed: {0}")]
    Io(String),

    #[error("Daemon rejected request: {0}")]
    Rejected(String),
}

pub struct DaemonClient {
    socket: PathBuf,
    retry_delay: Duration,
}

impl DaemonClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn health(&self) -> Result<Value, ClientError> {
        self.call(Method::GetHealth, None)
    }

    pub fn reload(&self) -> Result<Value, ClientError> {
        self.call(Method::Reload, None)
    }

    pub fn shutdown(&self) -> Result<Value, ClientError> {
        self.call(Method::Shutdown, None)
    }

    pub fn send_event(&self, event: BufferEvent) -> Result<Value, ClientError> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let params = EventParams {
            event,
            recorded_at: Some(recorded_at),
        };
        let params =
            serde_json::to_value(params).map_err(|err| ClientError::Io(err.to_string()))?;

        match self.call(Method::Event, Some(params.clone())) {
            Err(err @ ClientError::Connect { .. }) => {
                tracing::warn!(error = %err, event = %event, "Failed to reach daemon; retrying");
                std::thread::sleep(self.retry_delay);
                self.call(Method::Event, Some(params)).map_err(|retry_err| {
                    tracing::warn!(error = %retry_err, event = %event, "Retry failed sending event");
                    retry_err
                })
            }
            other => other,
        }
    }

    fn call(&self, method: Method, params: Option<Value>) -> Result<Value, ClientError> {
        let request = Request::new(method, Some(format!("ctl-{}", std::process::id())), params);
        let response = self.send_request(&request)?;
        if response.ok {
            return Ok(response.data.unwrap_or(Value::Null));
        }
        let message = response
            .error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "Unknown daemon error".to_string());
        Err(ClientError::Rejected(message))
    }

    fn send_request(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket).map_err(|source| ClientError::Connect {
                path: self.socket.clone(),
                source,
            })?;
        let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

        serde_json::to_writer(&mut stream, request)
            .map_err(|err| ClientError::Io(format!("Failed to write request: {}", err)))?;
        stream
            .write_all(b"\n")
            .map_err(|err| ClientError::Io(format!("Failed to flush request: {}", err)))?;
        stream.flush().ok();

        read_response(&mut stream)
    }
}

fn read_response(stream: &mut UnixStream) -> Result<Response, ClientError> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ClientError::Io("Response exceeded maximum size".to_string()));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(ClientError::Io(
                    "Timed out waiting for daemon response".to_string(),
                ));
            }
            Err(err) => return Err(ClientError::Io(format!("Failed to read response: {}", err))),
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err(ClientError::Io("Daemon response was empty".to_string()));
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| ClientError::Io(format!("Failed to parse response JSON: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_daemon_protocol::{parse_event, ErrorInfo};
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn read_request(stream: &mut UnixStream) -> Option<Request> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    if buffer.contains(&b'\n') {
                        break;
                    }
                }
                Err(_) => return None,
            }
        }
        let end = buffer.iter().position(|b| *b == b'\n').unwrap_or(buffer.len());
        serde_json::from_slice(&buffer[..end]).ok()
    }

    fn reply(stream: &mut UnixStream, response: &Response) {
        serde_json::to_writer(&mut *stream, response).unwrap();
        stream.write_all(b"\n").unwrap();
    }

    fn test_socket_dir() -> tempfile::TempDir {
        tempfile::Builder::new()
            .prefix("rewind-ctl-test")
            .tempdir_in("/tmp")
            .unwrap()
    }

    /// Answers a single connection with `respond`.
    fn serve_once(
        respond: impl FnOnce(Request) -> Response + Send + 'static,
    ) -> (tempfile::TempDir, PathBuf, thread::JoinHandle<()>) {
        let dir = test_socket_dir();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream).expect("request");
            reply(&mut stream, &respond(request));
        });
        (dir, socket, server)
    }

    #[test]
    fn send_event_carries_kind_and_timestamp() {
        let (_dir, socket, server) = serve_once(|request| {
            assert_eq!(request.method, Method::Event);
            let params = parse_event(request.params.expect("params")).expect("valid event");
            assert_eq!(params.event, BufferEvent::Stopping);
            assert!(params.recorded_at.is_some());
            Response::ok(request.id, serde_json::json!({ "accepted": true }))
        });

        let data = DaemonClient::new(&socket)
            .send_event(BufferEvent::Stopping)
            .expect("send");
        assert_eq!(data["accepted"], true);
        server.join().unwrap();
    }

    #[test]
    fn send_event_retries_when_daemon_refuses_connection() {
        let dir = test_socket_dir();
        let socket = dir.path().join("daemon.sock");
        // a socket file with no listener behind it refuses connections
        drop(UnixListener::bind(&socket).unwrap());

        let delivered = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&delivered);
        let server_socket = socket.clone();
        let server = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            std::fs::remove_file(&server_socket).unwrap();
            let listener = UnixListener::bind(&server_socket).unwrap();
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream).expect("request");
            seen.fetch_add(1, Ordering::SeqCst);
            reply(
                &mut stream,
                &Response::ok(request.id, serde_json::json!({ "accepted": true })),
            );
        });

        let result = DaemonClient::new(&socket)
            .with_retry_delay(Duration::from_secs(1))
            .send_event(BufferEvent::Starting);
        assert!(result.is_ok(), "retry after refused connection failed: {:?}", result);
        server.join().unwrap();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_with_lost_reply_is_not_resent() {
        let dir = test_socket_dir();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let delivered = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&delivered);
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            if read_request(&mut stream).is_some() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            drop(stream);

            listener.set_nonblocking(true).unwrap();
            let deadline = Instant::now() + Duration::from_millis(400);
            while Instant::now() < deadline {
                if let Ok((mut stream, _)) = listener.accept() {
                    let _ = stream.set_nonblocking(false);
                    if read_request(&mut stream).is_some() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
                thread::sleep(Duration::from_millis(10));
            }
        });

        let result = DaemonClient::new(&socket)
            .with_retry_delay(Duration::from_millis(10))
            .send_event(BufferEvent::Starting);
        assert!(matches!(result, Err(ClientError::Io(_))));
        server.join().unwrap();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_request_is_not_retried() {
        let (_dir, socket, server) = serve_once(|request| {
            Response::error_with_info(
                request.id,
                ErrorInfo::new("runtime_stopped", "automation runtime is shutting down"),
            )
        });

        let err = DaemonClient::new(&socket)
            .send_event(BufferEvent::Starting)
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref message) if message.contains("runtime_stopped")));
        server.join().unwrap();
    }

    #[test]
    fn missing_socket_reports_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::new(dir.path().join("absent.sock"));
        assert!(matches!(client.health(), Err(ClientError::Connect { .. })));
    }
}
