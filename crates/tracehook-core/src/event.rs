//! Trace events as they appear in a session's `events.jsonl`.
//!
//! The log is written by the recorder and may be read back after other
//! tools (or older versions) have appended to it, so decoding is lenient:
//! any JSON object decodes. Unknown or missing `event` tags become
//! [`EventKind::Unknown`] and missing spawn fields fall back to fixed defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::time;

/// Tag written for agent spawn events.
pub const AGENT_SPAWNED: &str = "agent_spawned";

/// Agent type recorded when the payload does not name one.
pub const UNKNOWN_AGENT: &str = "unknown";

/// Model recorded when the payload does not name one.
pub const DEFAULT_MODEL: &str = "default";

/// Details of a spawned sub-agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpawn {
    pub agent_type: String,
    pub description: String,
    pub model: String,
    pub run_in_background: bool,
}

impl AgentSpawn {
    /// Build from a loosely shaped JSON object.
    ///
    /// Accepts both the hook payload (`subagent_type`) and the log shape
    /// (`agent_type`). Missing, null, empty or mistyped fields take the
    /// defaults.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            agent_type: text("agent_type")
                .or_else(|| text("subagent_type"))
                .unwrap_or_else(|| UNKNOWN_AGENT.to_string()),
            description: text("description").unwrap_or_default(),
            model: text("model").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            run_in_background: value
                .get("run_in_background")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "agent_type": self.agent_type,
            "description": self.description,
            "model": self.model,
            "run_in_background": self.run_in_background,
        })
    }
}

impl Default for AgentSpawn {
    fn default() -> Self {
        Self::from_value(&Value::Null)
    }
}

/// Kind of a trace event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    AgentSpawned(AgentSpawn),
    /// A tag this version does not know; kept so it still counts as an event.
    Unknown { kind: String, data: Option<Value> },
}

impl EventKind {
    /// Wire tag of this kind.
    pub fn tag(&self) -> &str {
        match self {
            EventKind::AgentSpawned(_) => AGENT_SPAWNED,
            EventKind::Unknown { kind, .. } => kind.as_str(),
        }
    }
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EventRecord", into = "EventRecord")]
pub struct Event {
    pub kind: EventKind,
    /// `None` only for lines read back without a usable timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    pub session_id: String,
}

impl Event {
    /// Create an `agent_spawned` event stamped with the current time.
    pub fn agent_spawned(session_id: impl Into<String>, spawn: AgentSpawn) -> Self {
        Self {
            kind: EventKind::AgentSpawned(spawn),
            timestamp: Some(time::now()),
            session_id: session_id.into(),
        }
    }

    /// The spawn details if this is an `agent_spawned` event.
    pub fn agent_spawn(&self) -> Option<&AgentSpawn> {
        match &self.kind {
            EventKind::AgentSpawned(spawn) => Some(spawn),
            EventKind::Unknown { .. } => None,
        }
    }

    /// Decode one log line. Anything but a JSON object is malformed.
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(line.trim())?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("event line is not a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Encode as a single log line without the trailing newline.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Wire shape of an event line.
#[derive(Serialize, Deserialize)]
struct EventRecord {
    #[serde(default)]
    event: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Value>,
    #[serde(default)]
    session_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        let timestamp = record
            .timestamp
            .as_ref()
            .and_then(Value::as_str)
            .and_then(time::parse);
        let session_id = record
            .session_id
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let tag = record
            .event
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default();

        let kind = if tag == AGENT_SPAWNED {
            EventKind::AgentSpawned(AgentSpawn::from_value(
                record.data.as_ref().unwrap_or(&Value::Null),
            ))
        } else {
            EventKind::Unknown {
                kind: tag.to_string(),
                data: record.data,
            }
        };

        Event {
            kind,
            timestamp,
            session_id,
        }
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        let (tag, data) = match event.kind {
            EventKind::AgentSpawned(spawn) => (AGENT_SPAWNED.to_string(), Some(spawn.to_value())),
            EventKind::Unknown { kind, data } => (kind, data),
        };

        EventRecord {
            event: Some(Value::String(tag)),
            timestamp: event.timestamp.map(|ts| Value::String(time::format(&ts))),
            session_id: Some(Value::String(event.session_id)),
            data,
        }
    }
}
