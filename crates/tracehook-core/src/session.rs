//! Session identity and the records persisted next to a session's log.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::time;

/// Identifier of a trace session, safe to use as a single directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Longest accepted identifier, in bytes.
    pub const MAX_LEN: usize = 128;
    /// Prefix of generated identifiers when none (or an unusable one) is configured.
    pub const DEFAULT_PREFIX: &'static str = "sess_";

    /// Validate an externally supplied identifier.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let id = raw.as_ref().trim();
        let invalid = |reason: &'static str| Error::InvalidSessionId {
            id: id.to_string(),
            reason,
        };

        if id.is_empty() {
            return Err(invalid("empty"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(invalid("too long"));
        }
        if id.starts_with('.') {
            return Err(invalid("starts with '.'"));
        }
        if id.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
            return Err(invalid("contains a path separator or control character"));
        }

        Ok(Self(id.to_string()))
    }

    /// Time-derived identifier: `prefix` followed by epoch milliseconds.
    ///
    /// A prefix that would not yield a valid id is replaced by
    /// [`DEFAULT_PREFIX`](Self::DEFAULT_PREFIX).
    pub fn generate(prefix: &str, now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis();
        if Self::is_valid_prefix(prefix) {
            if let Ok(id) = Self::parse(format!("{}{}", prefix, millis)) {
                return id;
            }
        }
        tracing::warn!(prefix, "Unusable session prefix, using the default");
        Self(format!("{}{}", Self::DEFAULT_PREFIX, millis))
    }

    /// Whether `prefix` can start a generated identifier.
    pub fn is_valid_prefix(prefix: &str) -> bool {
        !prefix.trim().is_empty()
            && prefix.trim() == prefix
            && Self::parse(format!("{}0", prefix)).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Running counters kept in `metadata.json`.
///
/// Counters are recomputed from the event log on every write, never
/// incremented in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(with = "time::iso_millis")]
    pub created: DateTime<Utc>,
    /// Number of `agent_spawned` events in the log
    pub agent_count: u64,
    /// Number of events in the log
    pub events_count: u64,
    #[serde(with = "time::iso_millis")]
    pub last_updated: DateTime<Utc>,
    /// Agent type of the most recently recorded spawn
    pub last_agent: String,
}

impl SessionMetadata {
    /// Build the record for a log that now holds `events`.
    ///
    /// `created` survives from `previous`; without one it is the first
    /// event's timestamp, or `now` when that is unavailable.
    pub fn derive(
        previous: Option<&SessionMetadata>,
        events: &[Event],
        last_agent: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let created = previous
            .map(|m| m.created)
            .or_else(|| events.first().and_then(|e| e.timestamp))
            .unwrap_or(now);

        Self {
            created,
            agent_count: events.iter().filter(|e| e.agent_spawn().is_some()).count() as u64,
            events_count: events.len() as u64,
            last_updated: now,
            last_agent: last_agent.into(),
        }
    }
}

/// Aggregated view of a session's log, stored in `metrics.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub session_id: String,
    #[serde(with = "time::iso_millis")]
    pub aggregated_at: DateTime<Utc>,
    pub total_events: u64,
    pub total_agents_spawned: u64,
    pub agents_by_type: BTreeMap<String, u64>,
    pub models_used: BTreeMap<String, u64>,
    #[serde(with = "time::iso_millis_option", default)]
    pub first_event: Option<DateTime<Utc>>,
    #[serde(with = "time::iso_millis_option", default)]
    pub last_event: Option<DateTime<Utc>>,
}
