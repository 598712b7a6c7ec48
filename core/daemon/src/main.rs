//! Timekeeper daemon entrypoint.
//!
//! A small, single-writer service for one track: a socket listener with strict
//! request validation in front of the one timekeeper event loop, plus the
//! file-backed overlay publisher and results log it notifies.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use timekeeper_core::{load_config, Event, Timekeeper, TimekeeperConfig};
use timekeeper_protocol::{
    parse_event, ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

mod overlay;
mod results;
mod worker;

use overlay::OverlayFile;
use results::ResultsLog;
use worker::TimekeeperHandle;

const SOCKET_ENV: &str = "TIMEKEEPER_SOCKET";
const CONFIG_ENV: &str = "TIMEKEEPER_CONFIG";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let config = load_daemon_config();

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

    let handle = match start_timekeeper(&config) {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "Failed to start timekeeper");
            std::process::exit(1);
        }
    };

    info!(
        path = %socket_path.display(),
        race_duration_secs = config.race.duration_secs,
        tick_interval_ms = config.daemon.tick_interval_ms,
        "Timekeeper daemon started"
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let handle = handle.clone();
                let tick_interval_ms = config.daemon.tick_interval_ms;
                thread::spawn(move || handle_connection(stream, handle, tick_interval_ms));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("TIMEKEEPER_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_daemon_config() -> TimekeeperConfig {
    let path = match env::var(CONFIG_ENV) {
        Ok(path) => PathBuf::from(path),
        Err(_) => match timekeeper_core::get_config_path() {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "Failed to resolve config path; using defaults");
                return TimekeeperConfig::default();
            }
        },
    };

    match load_config(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "Failed to load config; using defaults");
            TimekeeperConfig::default()
        }
    }
}

fn start_timekeeper(config: &TimekeeperConfig) -> Result<TimekeeperHandle, String> {
    let overlay_path = config.overlay_path()?;
    let results_path = config.results_path()?;

    let (results_log, _results_writer) = ResultsLog::spawn(results_path.clone())
        .map_err(|err| format!("Failed to spawn results writer: {}", err))?;

    let timekeeper = Timekeeper::new(
        &config.race,
        Box::new(OverlayFile::new(overlay_path.clone())),
        Box::new(results_log),
    );
    info!(
        overlay = %overlay_path.display(),
        results = %results_path.display(),
        "Collaborators ready"
    );

    let (handle, _loop) = worker::spawn_timekeeper(timekeeper, config.daemon.tick_interval())
        .map_err(|err| format!("Failed to spawn timekeeper loop: {}", err))?;
    Ok(handle)
}

fn daemon_socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dir = timekeeper_core::get_timekeeper_dir()?;
    Ok(dir.join(SOCKET_NAME))
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

fn handle_connection(mut stream: UnixStream, handle: TimekeeperHandle, tick_interval_ms: u64) {
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
    let response = handle_request(request, &handle, tick_interval_ms);
    let _ = write_response(&mut stream, response);
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
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
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

fn handle_request(request: Request, handle: &TimekeeperHandle, tick_interval_ms: u64) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
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
                "tick_interval_ms": tick_interval_ms,
            });
            if let Ok(snapshot) = handle.snapshot() {
                data["state"] = serde_json::Value::String(snapshot.state);
            }
            Response::ok(request.id, data)
        }
        Method::GetSnapshot => match handle.snapshot() {
            Ok(snapshot) => snapshot_response(request.id, &snapshot),
            Err(err) => Response::error_with_info(request.id, err),
        },
        Method::Dispatch => handle_dispatch(request, handle),
    }
}

fn handle_dispatch(request: Request, handle: &TimekeeperHandle) -> Response {
    let params = match request.params {
        Some(params) => params,
        None => return Response::error(request.id, "invalid_params", "event payload is required"),
    };

    let envelope = match parse_event(params) {
        Ok(envelope) => envelope,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    let event = match Event::try_from(&envelope) {
        Ok(event) => event,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    info!(
        event_type = ?envelope.event_type,
        event_id = %envelope.event_id,
        source = ?envelope.source,
        recorded_at = %envelope.recorded_at,
        "Received event"
    );

    match handle.dispatch(event, envelope.event_id, envelope.source.unwrap_or_default()) {
        Ok(snapshot) => snapshot_response(request.id, &snapshot),
        Err(err) => Response::error_with_info(request.id, err),
    }
}

fn snapshot_response(id: Option<String>, snapshot: &timekeeper_protocol::Snapshot) -> Response {
    match serde_json::to_value(snapshot) {
        Ok(value) => Response::ok(id, value),
        Err(err) => Response::error(
            id,
            "serialization_error",
            format!("Failed to serialize snapshot: {}", err),
        ),
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
