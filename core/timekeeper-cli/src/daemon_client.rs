//! Client helper for sending race events to the timekeeper daemon.
//!
//! The daemon is the only writer. Failures are surfaced to the caller; an
//! event is retried only when the daemon could not be reached at all, since a
//! repeated `toggle` that did arrive would flip the race back.

use chrono::Utc;
use rand::RngCore;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;
use timekeeper_protocol::{
    EventEnvelope, EventSource, EventType, Method, Racer, Request, Response, Snapshot,
    MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

const SOCKET_ENV: &str = "TIMEKEEPER_SOCKET";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 3_000;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to daemon socket {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Daemon I/O failed: {0}")]
    Io(String),

    #[error("Daemon rejected request: {code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Unexpected daemon response: {0}")]
    Malformed(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

pub fn send_event(
    event_type: EventType,
    source: EventSource,
    racer: Option<Racer>,
) -> Result<Snapshot, ClientError> {
    let envelope = EventEnvelope {
        event_id: make_event_id(),
        recorded_at: Utc::now().to_rfc3339(),
        event_type,
        source: Some(source),
        racer_id: racer.as_ref().map(|racer| racer.id.clone()),
        racer_name: racer.map(|racer| racer.display_name),
    };
    let params = serde_json::to_value(&envelope)
        .map_err(|err| ClientError::Malformed(format!("Failed to serialize event: {}", err)))?;
    let request = || Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::Dispatch,
        id: Some(envelope.event_id.clone()),
        params: Some(params.clone()),
    };

    let response = match send_request(request()) {
        Err(ClientError::Connect { path, source }) => {
            tracing::warn!(
                error = %source,
                path = %path.display(),
                "Daemon unreachable; retrying event once"
            );
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            send_request(request())?
        }
        other => other?,
    };

    snapshot_from(response)
}

pub fn get_snapshot() -> Result<Snapshot, ClientError> {
    let response = send_request(Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::GetSnapshot,
        id: Some("snapshot".to_string()),
        params: None,
    })?;
    snapshot_from(response)
}

pub fn get_health() -> Result<serde_json::Value, ClientError> {
    let response = send_request(Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::GetHealth,
        id: Some("health-check".to_string()),
        params: None,
    })?;
    data_from(response)
}

fn snapshot_from(response: Response) -> Result<Snapshot, ClientError> {
    let data = data_from(response)?;
    serde_json::from_value(data)
        .map_err(|err| ClientError::Malformed(format!("Failed to parse snapshot: {}", err)))
}

fn data_from(response: Response) -> Result<serde_json::Value, ClientError> {
    if !response.ok {
        return Err(match response.error {
            Some(err) => ClientError::Rejected {
                code: err.code,
                message: err.message,
            },
            None => ClientError::Malformed("error response without details".to_string()),
        });
    }
    response
        .data
        .ok_or_else(|| ClientError::Malformed("response had no data".to_string()))
}

fn socket_path() -> Result<PathBuf, ClientError> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    timekeeper_core::get_timekeeper_dir()
        .map(|dir| dir.join(SOCKET_NAME))
        .map_err(|_| ClientError::HomeNotFound)
}

fn send_request(request: Request) -> Result<Response, ClientError> {
    let socket = socket_path()?;
    let mut stream = UnixStream::connect(&socket).map_err(|source| ClientError::Connect {
        path: socket.clone(),
        source,
    })?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| ClientError::Io(format!("Failed to write request: {}", err)))?;
    stream
        .write_all(b"\n")
        .map_err(|err| ClientError::Io(format!("Failed to flush request: {}", err)))?;
    stream.flush().ok();

    read_response(&mut stream)
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
                    return Err(ClientError::Malformed(
                        "Response exceeded maximum size".to_string(),
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
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
        return Err(ClientError::Malformed("Daemon response was empty".to_string()));
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| ClientError::Malformed(format!("Failed to parse response JSON: {}", err)))
}

fn make_event_id() -> String {
    let mut random = rand::thread_rng();
    let rand = random.next_u64();
    format!(
        "evt-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        rand
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use timekeeper_protocol::{parse_event, RaceStatus};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    struct EnvGuard {
        key: &'static str,
        prior: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prior = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, prior }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.prior {
                std::env::set_var(self.key, value);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_request(stream: &mut UnixStream) -> Request {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).expect("read request");
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
            if buffer.contains(&b'\n') {
                break;
            }
        }
        let end = buffer.iter().position(|b| *b == b'\n').unwrap_or(buffer.len());
        serde_json::from_slice(&buffer[..end]).expect("request json")
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            state: "RaceActive.Running".to_string(),
            race_status: RaceStatus::RaceInProgress,
            racer: None,
            remaining_time_ms: 299_000,
            current_lap_time_ms: 1_000,
            race_time_is_expired: false,
            did_not_finish_pending: false,
            off_track_resets: 0,
            laps: Vec::new(),
        }
    }

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(make_event_id(), make_event_id());
        assert!(make_event_id().starts_with("evt-"));
    }

    #[test]
    fn send_event_posts_valid_envelope_and_parses_snapshot() {
        let _lock = env_lock();
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let socket = temp_dir.path().join("daemon.sock");
        let _env = EnvGuard::set(SOCKET_ENV, socket.to_str().expect("utf8 path"));
        let listener = UnixListener::bind(&socket).expect("bind");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            let envelope = parse_event(request.params.expect("params")).expect("valid envelope");
            let response = Response::ok(
                request.id,
                serde_json::to_value(snapshot()).expect("snapshot json"),
            );
            serde_json::to_writer(&mut stream, &response).expect("write");
            stream.write_all(b"\n").expect("newline");
            envelope
        });

        let result = send_event(EventType::AutoCapture, EventSource::Sensor, None)
            .expect("send event");
        let envelope = server.join().expect("server thread");

        assert_eq!(envelope.event_type, EventType::AutoCapture);
        assert_eq!(envelope.source, Some(EventSource::Sensor));
        assert_eq!(result, snapshot());
    }

    #[test]
    fn rejected_request_surfaces_daemon_error() {
        let _lock = env_lock();
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let socket = temp_dir.path().join("daemon.sock");
        let _env = EnvGuard::set(SOCKET_ENV, socket.to_str().expect("utf8 path"));
        let listener = UnixListener::bind(&socket).expect("bind");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            let response = Response::error(request.id, "protocol_mismatch", "nope");
            serde_json::to_writer(&mut stream, &response).expect("write");
            stream.write_all(b"\n").expect("newline");
        });

        let err = get_snapshot().unwrap_err();
        server.join().expect("server thread");
        assert!(matches!(err, ClientError::Rejected { ref code, .. } if code == "protocol_mismatch"));
    }

    #[test]
    fn missing_daemon_is_a_connect_error() {
        let _lock = env_lock();
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let socket = temp_dir.path().join("absent.sock");
        let _env = EnvGuard::set(SOCKET_ENV, socket.to_str().expect("utf8 path"));

        let err = send_event(EventType::Toggle, EventSource::Operator, None).unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }
}
