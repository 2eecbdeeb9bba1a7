//! Wire message parsing and encoding
//!
//! The hangar unit speaks newline-delimited text frames. Two shapes exist in
//! the field: flat `key: value` pairs and JSON objects. Inbound parsing
//! accepts both; outbound commands are always a single-key JSON object.
//!
//! State tokens are matched case-insensitively and uppercased on ingestion.
//! An unknown token for a recognized key drops that field only; a frame that
//! is neither a JSON object nor `key: value` text is malformed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::{Command, ConnectionState, ProtocolError};

/// Flight state reported by the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneState {
    /// Parked in the hangar
    Rest,
    /// Leaving the hangar
    TakingOff,
    /// In flight
    Operating,
    /// Returning to the hangar
    Landing,
}

impl DroneState {
    /// Wire token for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "REST",
            Self::TakingOff => "TAKING_OFF",
            Self::Operating => "OPERATING",
            Self::Landing => "LANDING",
        }
    }
}

impl fmt::Display for DroneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DroneState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REST" => Ok(Self::Rest),
            "TAKING_OFF" => Ok(Self::TakingOff),
            "OPERATING" => Ok(Self::Operating),
            "LANDING" => Ok(Self::Landing),
            _ => Err(()),
        }
    }
}

/// Alarm state reported by the hangar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HangarState {
    /// Nominal conditions
    Normal,
    /// Alarm raised
    Alarm,
    /// Conditions approaching the alarm threshold
    PreAlarm,
}

impl HangarState {
    /// Wire token for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Alarm => "ALARM",
            Self::PreAlarm => "PRE_ALARM",
        }
    }
}

impl fmt::Display for HangarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HangarState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "ALARM" => Ok(Self::Alarm),
            "PRE_ALARM" => Ok(Self::PreAlarm),
            _ => Err(()),
        }
    }
}

/// One typed field update decoded from an inbound frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireField {
    /// Drone flight state
    Drone(DroneState),
    /// Hangar alarm state
    Hangar(HangarState),
    /// Measured drone distance
    Distance(f64),
    /// Liveness flag, only meaningful during the handshake
    Alive(bool),
    /// Connection token sent by the peer; parsed but not applied locally
    Connection(ConnectionState),
}

/// Parse one frame into zero or more typed field updates.
///
/// Recognized keys (after lowercasing and stripping underscores):
/// `drone`/`dronestate`, `hangar`/`hangarstate`, `distance`, `alive`,
/// `connection`. Unrecognized keys and invalid tokens are skipped with a
/// warning so one bad field never poisons the rest of the frame.
pub fn parse_frame(frame: &str) -> Result<Vec<WireField>, ProtocolError> {
    let trimmed = frame.trim();
    if trimmed.starts_with('{') {
        let json: Value = serde_json::from_str(trimmed)
            .map_err(|_| ProtocolError::MalformedMessage(trimmed.to_string()))?;
        let obj = json
            .as_object()
            .ok_or_else(|| ProtocolError::MalformedMessage(trimmed.to_string()))?;

        let mut fields = Vec::new();
        for (key, value) in obj {
            if let Some(field) = decode_field(key, value) {
                fields.push(field);
            }
        }
        Ok(fields)
    } else if let Some((key, value)) = trimmed.split_once(':') {
        let raw = value.trim();
        // Flat values arrive unquoted; re-type them so booleans and numbers
        // take the same path as their JSON counterparts.
        let typed = if raw.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else if let Ok(n) = raw.parse::<f64>() {
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string()))
        } else {
            Value::String(raw.to_string())
        };
        Ok(decode_field(key.trim(), &typed).into_iter().collect())
    } else {
        Err(ProtocolError::MalformedMessage(trimmed.to_string()))
    }
}

fn decode_field(key: &str, value: &Value) -> Option<WireField> {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_lowercase();

    match normalized.as_str() {
        "drone" | "dronestate" => match value.as_str().and_then(|s| s.parse().ok()) {
            Some(state) => Some(WireField::Drone(state)),
            None => {
                tracing::warn!("Invalid drone state token: {}", value);
                None
            }
        },
        "hangar" | "hangarstate" => {
            // Boolean shorthand used by older firmware: true means alarm.
            if let Some(alarm) = value.as_bool() {
                return Some(WireField::Hangar(if alarm {
                    HangarState::Alarm
                } else {
                    HangarState::Normal
                }));
            }
            match value.as_str().and_then(|s| s.parse().ok()) {
                Some(state) => Some(WireField::Hangar(state)),
                None => {
                    tracing::warn!("Invalid hangar state token: {}", value);
                    None
                }
            }
        }
        "distance" => match value.as_f64() {
            Some(d) => Some(WireField::Distance(d)),
            None => {
                tracing::warn!("Invalid distance value: {}", value);
                None
            }
        },
        "alive" => match value.as_bool() {
            Some(alive) => Some(WireField::Alive(alive)),
            None => {
                tracing::warn!("Invalid alive flag: {}", value);
                None
            }
        },
        "connection" => match value.as_str().and_then(|s| s.parse().ok()) {
            Some(state) => Some(WireField::Connection(state)),
            None => {
                tracing::warn!("Invalid connection token: {}", value);
                None
            }
        },
        _ => {
            tracing::debug!("Ignoring unrecognized wire key: {}", key);
            None
        }
    }
}

/// Encode an outbound command frame (without the line delimiter).
pub fn encode_command(command: &Command) -> String {
    serde_json::json!({ "cmd": command.name().to_uppercase() }).to_string()
}

/// Render a distance with fixed precision; integral values drop the
/// fractional part (`12.0` renders as `"12"`).
pub fn format_distance(distance: f64) -> String {
    if distance.fract() == 0.0 && distance.abs() < i64::MAX as f64 {
        format!("{}", distance as i64)
    } else {
        format!("{:.1}", distance)
    }
}
