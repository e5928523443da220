use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// Delay between status attempts while the socket server is still binding.
const BIND_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One line of JSON per request; `bearer` and `avatar_url` ride along only
/// for the commands that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl DaemonRequest {
    pub fn bare(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            bearer: None,
            avatar_url: None,
        }
    }
}

/// One line of JSON per response.
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

/// Send one request to the daemon socket and wait for its one-line reply.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = connect(&socket)?;
    let mut payload = serde_json::to_string(request)?;
    payload.push('\n');
    stream
        .write_all(payload.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed the connection before replying".to_string(),
        ));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// A socket file whose listener is gone (crashed daemon, stale file) only
/// shows up at connect time; fold those cases into `DaemonNotRunning`.
fn connect(socket: &Path) -> Result<UnixStream, DaemonError> {
    UnixStream::connect(socket).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset => DaemonError::DaemonNotRunning {
            socket: socket.to_path_buf(),
        },
        _ => io_err(socket, err),
    })
}

/// `status`, with a short retry window so a caller right after a service
/// start does not race the socket bind.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::bare("status");
    for _ in 0..4 {
        match send_request(home, &request) {
            Err(DaemonError::DaemonNotRunning { .. }) => sleep(BIND_RETRY_DELAY),
            other => return into_payload(other?),
        }
    }
    into_payload(send_request(home, &request)?)
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    into_payload(send_request(home, &DaemonRequest::bare("stop"))?).map(|_| ())
}

pub fn request_sync_roster(home: &Path) -> Result<Value, DaemonError> {
    into_payload(send_request(home, &DaemonRequest::bare("sync-roster"))?)
}

pub fn request_sync_avatars(home: &Path) -> Result<Value, DaemonError> {
    into_payload(send_request(home, &DaemonRequest::bare("sync-avatars"))?)
}

pub fn request_resolve(home: &Path, bearer: &str) -> Result<Value, DaemonError> {
    let request = DaemonRequest {
        cmd: "resolve".to_string(),
        bearer: Some(bearer.to_string()),
        avatar_url: None,
    };
    into_payload(send_request(home, &request)?)
}

pub fn request_set_avatar(
    home: &Path,
    bearer: &str,
    avatar_url: &str,
) -> Result<Value, DaemonError> {
    let request = DaemonRequest {
        cmd: "set-avatar".to_string(),
        bearer: Some(bearer.to_string()),
        avatar_url: Some(avatar_url.to_string()),
    };
    into_payload(send_request(home, &request)?)
}

fn into_payload(response: DaemonResponse) -> Result<Value, DaemonError> {
    match response {
        DaemonResponse { ok: true, data, .. } => Ok(data.unwrap_or(Value::Null)),
        DaemonResponse { error, .. } => Err(DaemonError::Protocol(
            error.unwrap_or_else(|| "daemon reported an unlabeled failure".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_request_serializes_without_optional_fields() {
        let json = serde_json::to_string(&DaemonRequest::bare("status")).expect("serialize");
        assert_eq!(json, r#"{"cmd":"status"}"#);
    }

    #[test]
    fn request_with_credentials_carries_both_fields() {
        let request = DaemonRequest {
            cmd: "set-avatar".to_string(),
            bearer: Some("tok-ada".to_string()),
            avatar_url: Some("https://img/a.png".to_string()),
        };
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains(r#""bearer":"tok-ada""#));
        assert!(json.contains(r#""avatar_url":"https://img/a.png""#));

        let parsed: DaemonRequest = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.bearer.as_deref(), Some("tok-ada"));
    }

    #[test]
    fn error_responses_fail_data_extraction_with_their_message() {
        let err = into_payload(DaemonResponse::error("no such member")).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg == "no such member"));
    }

    #[test]
    fn missing_socket_reports_daemon_not_running() {
        let home = tempfile::tempdir().expect("home");
        let err = send_request(home.path(), &DaemonRequest::bare("status")).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
