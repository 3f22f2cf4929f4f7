//! IPC protocol types and validation for rewind-daemon.
//!
//! This crate is shared by the daemon, the core library and `rewind-ctl` so
//! the wire schema cannot drift between them. The daemon stays the authority
//! on validation; clients reuse the same types to build valid requests.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

pub const ERROR_INVALID_PARAMS: &str = "invalid_params";
pub const ERROR_UNKNOWN_EVENT: &str = "unknown_event";
pub const ERROR_PROTOCOL_MISMATCH: &str = "protocol_mismatch";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Event,
    Reload,
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, id: Option<String>, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// Replay buffer notifications forwarded by the host.
///
/// `Starting` and `Stopping` mark the beginning of a transition and feed the
/// user-override heuristic. The remaining kinds only drive audio feedback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BufferEvent {
    Starting,
    Stopping,
    Started,
    Stopped,
    Saved,
}

impl BufferEvent {
    pub const ALL: [BufferEvent; 5] = [
        BufferEvent::Starting,
        BufferEvent::Stopping,
        BufferEvent::Started,
        BufferEvent::Stopped,
        BufferEvent::Saved,
    ];

    pub fn is_transition_begin(self) -> bool {
        matches!(self, BufferEvent::Starting | BufferEvent::Stopping)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BufferEvent::Starting => "starting",
            BufferEvent::Stopping => "stopping",
            BufferEvent::Started => "started",
            BufferEvent::Stopped => "stopped",
            BufferEvent::Saved => "saved",
        }
    }
}

impl fmt::Display for BufferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BufferEvent {
    type Err = ErrorInfo;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        BufferEvent::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                ErrorInfo::new(
                    ERROR_UNKNOWN_EVENT,
                    format!("unknown buffer event: {}", value.trim()),
                )
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EventParams {
    pub event: BufferEvent,
    /// Wall-clock time the host observed the event, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

impl EventParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if let Some(recorded_at) = &self.recorded_at {
            if DateTime::parse_from_rfc3339(recorded_at).is_err() {
                return Err(ErrorInfo::new(
                    "invalid_timestamp",
                    "recorded_at must be RFC3339",
                ));
            }
        }
        Ok(())
    }
}

pub fn parse_event(params: Value) -> Result<EventParams, ErrorInfo> {
    let parsed: EventParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("event payload is invalid: {}", err),
        )
    })?;
    parsed.validate()?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_event_payload() {
        let parsed = parse_event(json!({ "event": "stopping" })).expect("parse");
        assert_eq!(parsed.event, BufferEvent::Stopping);
        assert!(parsed.recorded_at.is_none());
    }

    #[test]
    fn rejects_unknown_event_kind() {
        let err = parse_event(json!({ "event": "paused" })).unwrap_err();
        assert_eq!(err.code, ERROR_INVALID_PARAMS);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse_event(json!({ "event": "saved", "extra": 1 })).is_err());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let err = parse_event(json!({ "event": "started", "recorded_at": "yesterday" }))
            .unwrap_err();
        assert_eq!(err.code, "invalid_timestamp");
    }

    #[test]
    fn accepts_rfc3339_timestamp() {
        let parsed = parse_event(json!({
            "event": "started",
            "recorded_at": "2026-02-14T10:00:00Z"
        }))
        .expect("parse");
        assert_eq!(parsed.event, BufferEvent::Started);
    }

    #[test]
    fn event_kind_parses_case_insensitively() {
        assert_eq!("Starting".parse::<BufferEvent>(), Ok(BufferEvent::Starting));
        assert_eq!(" saved ".parse::<BufferEvent>(), Ok(BufferEvent::Saved));
        assert_eq!(
            "bogus".parse::<BufferEvent>().unwrap_err().code,
            ERROR_UNKNOWN_EVENT
        );
    }

    #[test]
    fn only_starting_and_stopping_begin_transitions() {
        let begins: Vec<_> = BufferEvent::ALL
            .into_iter()
            .filter(|kind| kind.is_transition_begin())
            .collect();
        assert_eq!(begins, vec![BufferEvent::Starting, BufferEvent::Stopping]);
    }

    #[test]
    fn request_round_trips_with_snake_case_method() {
        let request = Request::new(Method::GetHealth, Some("h".to_string()), None);
        let encoded = serde_json::to_string(&request).expect("encode");
        assert!(encoded.contains("\"get_health\""));
        let decoded: Request = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded.method, Method::GetHealth);
        assert_eq!(decoded.protocol_version, PROTOCOL_VERSION);
    }
}
