use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};

/// JSON newline-delimited request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    /// Reload path, for `touch` and `history`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Capability names, for `capabilities`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    /// Failure description, for `fail`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DaemonRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::default()
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(socket: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning {
            socket: socket.to_path_buf(),
        });
    }

    let mut stream = UnixStream::connect(socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.to_path_buf(),
            }
        } else {
            io_err(socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// `status`, retried briefly so it works right after `watch` starts.
pub fn request_status(socket: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new("status");

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(socket, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(socket: &Path) -> Result<(), DaemonError> {
    call(socket, DaemonRequest::new("stop")).map(|_| ())
}

pub fn request_touch(socket: &Path, path: &str) -> Result<Value, DaemonError> {
    call(
        socket,
        DaemonRequest {
            path: Some(path.to_string()),
            ..DaemonRequest::new("touch")
        },
    )
}

pub fn request_history(socket: &Path, path: &str) -> Result<Value, DaemonError> {
    call(
        socket,
        DaemonRequest {
            path: Some(path.to_string()),
            ..DaemonRequest::new("history")
        },
    )
}

pub fn request_drain(socket: &Path) -> Result<Value, DaemonError> {
    call(socket, DaemonRequest::new("drain"))
}

pub fn request_complete(socket: &Path) -> Result<Value, DaemonError> {
    call(socket, DaemonRequest::new("complete"))
}

pub fn request_fail(socket: &Path, message: &str) -> Result<Value, DaemonError> {
    call(
        socket,
        DaemonRequest {
            message: Some(message.to_string()),
            ..DaemonRequest::new("fail")
        },
    )
}

pub fn request_capabilities(socket: &Path, names: Vec<String>) -> Result<Value, DaemonError> {
    call(
        socket,
        DaemonRequest {
            names: Some(names),
            ..DaemonRequest::new("capabilities")
        },
    )
}

fn call(socket: &Path, request: DaemonRequest) -> Result<Value, DaemonError> {
    response_into_data(send_request(socket, &request)?)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_fields() {
        let encoded = serde_json::to_value(DaemonRequest::new("drain")).unwrap();
        assert_eq!(encoded, json!({ "cmd": "drain" }));

        let touch = DaemonRequest {
            path: Some("app/main.rb".to_string()),
            ..DaemonRequest::new("touch")
        };
        assert_eq!(
            serde_json::to_value(touch).unwrap(),
            json!({ "cmd": "touch", "path": "app/main.rb" })
        );
    }

    #[test]
    fn bare_command_decodes() {
        let request: DaemonRequest = serde_json::from_str(r#"{"cmd":"status"}"#).unwrap();
        assert_eq!(request.cmd, "status");
        assert!(request.path.is_none() && request.names.is_none());
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = response_into_data(DaemonResponse::error("boom")).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(ref m) if m == "boom"));
    }

    #[test]
    fn missing_socket_is_not_running() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = request_drain(&dir.path().join("daemon.sock")).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
