//! IPC protocol types and validation for timekeeper-daemon.
//!
//! This crate is shared by the daemon, the core, and clients so the race
//! records published to overlays and results stores have one schema. The
//! daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

const MAX_EVENT_ID_LEN: usize = 128;
const MAX_RACER_FIELD_LEN: usize = 256;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Dispatch,
    GetSnapshot,
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

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Toggle,
    End,
    Capture,
    AutoCapture,
    DidNotFinish,
    Expire,
    Resume,
    OffTrack,
    SelectRacer,
}

/// Where an event entered the system. Informational only; the timekeeper
/// gives no source priority over another.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    #[default]
    Operator,
    Sensor,
    Timer,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    pub event_id: String,
    pub recorded_at: String,
    pub event_type: EventType,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub racer_id: Option<String>,
    #[serde(default)]
    pub racer_name: Option<String>,
}

impl EventEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.event_id.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_event_id", "event_id is required"));
        }
        if self.event_id.len() > MAX_EVENT_ID_LEN {
            return Err(ErrorInfo::new(
                "invalid_event_id",
                "event_id must be 128 characters or fewer",
            ));
        }

        if DateTime::parse_from_rfc3339(&self.recorded_at).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "recorded_at must be RFC3339",
            ));
        }

        match self.event_type {
            EventType::SelectRacer => {
                require_string(&self.racer_id, "racer_id")?;
                require_string(&self.racer_name, "racer_name")?;
                require_max_len(&self.racer_id, "racer_id")?;
                require_max_len(&self.racer_name, "racer_name")?;
            }
            EventType::Toggle
            | EventType::End
            | EventType::Capture
            | EventType::AutoCapture
            | EventType::DidNotFinish
            | EventType::Expire
            | EventType::Resume
            | EventType::OffTrack => {
                forbid(&self.racer_id, "racer_id")?;
                forbid(&self.racer_name, "racer_name")?;
            }
        }

        Ok(())
    }

    /// Racer carried by a `select_racer` envelope. Only meaningful after
    /// [`EventEnvelope::validate`] succeeded.
    pub fn racer(&self) -> Option<Racer> {
        match (&self.racer_id, &self.racer_name) {
            (Some(id), Some(name)) => Some(Racer {
                id: id.trim().to_string(),
                display_name: name.trim().to_string(),
            }),
            _ => None,
        }
    }
}

pub fn parse_event(params: Value) -> Result<EventEnvelope, ErrorInfo> {
    let envelope: EventEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

fn require_string(value: &Option<String>, field: &str) -> Result<(), ErrorInfo> {
    if let Some(candidate) = value {
        if !candidate.trim().is_empty() {
            return Ok(());
        }
    }
    Err(ErrorInfo::new(
        "missing_field",
        format!("{} is required", field),
    ))
}

fn require_max_len(value: &Option<String>, field: &str) -> Result<(), ErrorInfo> {
    match value {
        Some(candidate) if candidate.len() > MAX_RACER_FIELD_LEN => Err(ErrorInfo::new(
            "invalid_params",
            format!("{} must be {} characters or fewer", field, MAX_RACER_FIELD_LEN),
        )),
        _ => Ok(()),
    }
}

fn forbid(value: &Option<String>, field: &str) -> Result<(), ErrorInfo> {
    match value {
        Some(_) => Err(ErrorInfo::new(
            "unexpected_field",
            format!("{} is only accepted with select_racer", field),
        )),
        None => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Race records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Racer {
    pub id: String,
    pub display_name: String,
}

/// One captured lap. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lap {
    pub lap_number: u32,
    pub elapsed_ms: u64,
    pub is_valid: bool,
    pub off_track_resets: u32,
    pub captured_at: DateTime<Utc>,
}

/// Status values understood by overlay and leaderboard displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    NoRacerSelected,
    ReadyToStart,
    RaceInProgress,
    RacePaused,
    RaceFinished,
}

impl RaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceStatus::NoRacerSelected => "NO_RACER_SELECTED",
            RaceStatus::ReadyToStart => "READY_TO_START",
            RaceStatus::RaceInProgress => "RACE_IN_PROGRESS",
            RaceStatus::RacePaused => "RACE_PAUSED",
            RaceStatus::RaceFinished => "RACE_FINISHED",
        }
    }
}

/// Read-only view of the timekeeper state and its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: String,
    pub race_status: RaceStatus,
    pub racer: Option<Racer>,
    pub remaining_time_ms: u64,
    pub current_lap_time_ms: u64,
    pub race_time_is_expired: bool,
    pub did_not_finish_pending: bool,
    pub off_track_resets: u32,
    pub laps: Vec<Lap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event(event_type: EventType) -> EventEnvelope {
        EventEnvelope {
            event_id: "evt-1".to_string(),
            recorded_at: "2026-01-30T12:00:00Z".to_string(),
            event_type,
            source: None,
            racer_id: None,
            racer_name: None,
        }
    }

    #[test]
    fn validates_plain_event() {
        let event = base_event(EventType::Toggle);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn select_racer_requires_racer_fields() {
        let mut event = base_event(EventType::SelectRacer);
        assert_eq!(
            event.validate().unwrap_err().code,
            "missing_field".to_string()
        );

        event.racer_id = Some("racer-7".to_string());
        event.racer_name = Some("   ".to_string());
        assert!(event.validate().is_err());

        event.racer_name = Some(" Speedy ".to_string());
        assert!(event.validate().is_ok());
        assert_eq!(
            event.racer(),
            Some(Racer {
                id: "racer-7".to_string(),
                display_name: "Speedy".to_string(),
            })
        );
    }

    #[test]
    fn rejects_racer_fields_on_other_events() {
        let mut event = base_event(EventType::Capture);
        event.racer_id = Some("racer-7".to_string());
        assert_eq!(event.validate().unwrap_err().code, "unexpected_field");
    }

    #[test]
    fn rejects_bad_timestamp() {
        let mut event = base_event(EventType::End);
        event.recorded_at = "not-a-time".to_string();
        assert_eq!(event.validate().unwrap_err().code, "invalid_timestamp");
    }

    #[test]
    fn rejects_long_event_id() {
        let mut event = base_event(EventType::End);
        event.event_id = "a".repeat(256);
        assert!(event.validate().is_err());
    }

    #[test]
    fn parse_event_rejects_unknown_event_type() {
        let params = serde_json::json!({
            "event_id": "evt-1",
            "recorded_at": "2026-01-30T12:00:00Z",
            "event_type": "teleport",
        });
        assert_eq!(parse_event(params).unwrap_err().code, "invalid_params");
    }

    #[test]
    fn parse_event_accepts_sensor_capture() {
        let params = serde_json::json!({
            "event_id": "evt-2",
            "recorded_at": "2026-01-30T12:00:00Z",
            "event_type": "auto_capture",
            "source": "sensor",
        });
        let event = parse_event(params).expect("valid event");
        assert_eq!(event.event_type, EventType::AutoCapture);
        assert_eq!(event.source, Some(EventSource::Sensor));
    }

    #[test]
    fn race_status_serializes_as_display_constants() {
        let value = serde_json::to_value(RaceStatus::RaceInProgress).unwrap();
        assert_eq!(value, serde_json::json!("RACE_IN_PROGRESS"));
        assert_eq!(RaceStatus::NoRacerSelected.as_str(), "NO_RACER_SELECTED");
    }
}
