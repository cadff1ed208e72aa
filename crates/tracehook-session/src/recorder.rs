//! Records agent spawns from tool-use hook payloads.

use tracehook_core::{time, Config, Event, HookInput, SessionMetadata, ToolInvocation};

use crate::selector::SessionSelector;
use crate::store::{Result, SessionStore};

/// Appends `agent_spawned` events for the agent-spawning tool.
pub struct EventRecorder<S: SessionStore> {
    store: S,
    selector: SessionSelector,
    spawn_tool: String,
    /// Explicit id, highest precedence
    session_override: Option<String>,
    /// Id read from the environment
    env_session: Option<String>,
}

impl<S: SessionStore> EventRecorder<S> {
    /// Create a recorder that ignores the environment.
    pub fn new(store: S, selector: SessionSelector, spawn_tool: impl Into<String>) -> Self {
        Self {
            store,
            selector,
            spawn_tool: spawn_tool.into(),
            session_override: None,
            env_session: None,
        }
    }

    /// Create a recorder from configuration, reading the session id variable.
    pub fn from_config(store: S, config: &Config) -> Self {
        let selector = SessionSelector::from_config(&config.trace);
        let env_session = selector.env_session();
        Self::new(store, selector, &config.trace.spawn_tool).with_env_session(env_session)
    }

    /// Force every event into `id` (if valid).
    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.session_override = Some(id.into());
        self
    }

    pub fn with_env_session(mut self, id: Option<String>) -> Self {
        self.env_session = id;
        self
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record one hook payload.
    ///
    /// Returns the appended event, or `None` when the payload is for some
    /// other tool. Nothing touches the disk in that case.
    pub async fn record(&self, input: &HookInput) -> Result<Option<Event>> {
        let spawn = match input.invocation(&self.spawn_tool) {
            ToolInvocation::SpawnAgent(spawn) => spawn,
            ToolInvocation::Other { tool_name } => {
                tracing::debug!(tool = %tool_name, "Not an agent spawn, ignoring");
                return Ok(None);
            }
        };

        let id = self.selector.resolve_writer([
            self.session_override.as_deref(),
            self.env_session.as_deref(),
            input.session_id(),
        ]);

        let agent_type = spawn.agent_type.clone();
        let event = Event::agent_spawned(id.as_str(), spawn);
        self.store.append_event(&id, &event).await?;

        if let Err(e) = self.store.set_current(&id).await {
            tracing::warn!(session = %id, error = %e, "Failed to update current-session pointer");
        }

        let previous = self.store.read_metadata(&id).await?;
        let log = self.store.read_events(&id).await?;
        let metadata = SessionMetadata::derive(previous.as_ref(), &log.events, agent_type, time::now());
        self.store.write_metadata(&id, &metadata).await?;

        tracing::debug!(
            session = %id,
            agent = %metadata.last_agent,
            events = metadata.events_count,
            "Recorded agent spawn"
        );

        Ok(Some(event))
    }

    /// Parse a raw stdin payload and record it.
    pub async fn record_raw(&self, raw: &str) -> Result<Option<Event>> {
        let input = HookInput::parse(raw)?;
        self.record(&input).await
    }

    /// Like [`record_raw`](Self::record_raw), but never fails.
    ///
    /// Errors are logged at `warn` and reported as `None`.
    pub async fn record_silently(&self, raw: &str) -> Option<Event> {
        match self.record_raw(raw).await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Trace recording failed");
                None
            }
        }
    }
}
