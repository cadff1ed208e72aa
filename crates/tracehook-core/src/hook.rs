//! Hook payloads delivered by the host on stdin.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::event::AgentSpawn;

/// Payload of a tool-use hook invocation.
///
/// Only the fields the tracer needs are decoded; anything else the host sends
/// is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    /// Name of the tool that was invoked
    #[serde(default)]
    pub tool_name: String,
    /// Tool arguments as sent by the host
    #[serde(default)]
    pub tool_input: Value,
    /// Session identifier, when the host includes one in the payload
    #[serde(default)]
    pub session_id: Option<String>,
}

/// What a hook payload means to the tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    /// The agent-spawning tool was called.
    SpawnAgent(AgentSpawn),
    /// Any other tool; ignored by the recorder.
    Other { tool_name: String },
}

impl HookInput {
    /// Parse a raw stdin payload.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPayload("empty hook payload".to_string()));
        }
        serde_json::from_str(trimmed).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// Classify this payload given the name of the agent-spawning tool.
    pub fn invocation(&self, spawn_tool: &str) -> ToolInvocation {
        if self.tool_name == spawn_tool {
            ToolInvocation::SpawnAgent(AgentSpawn::from_value(&self.tool_input))
        } else {
            ToolInvocation::Other {
                tool_name: self.tool_name.clone(),
            }
        }
    }

    /// The payload's session id, if present and non-blank.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
