//! Session selection for writers and readers.
//!
//! Writers take the first valid externally supplied id and otherwise mint a
//! time-derived one. Readers follow the current pointer and otherwise take
//! the session directory created most recently; directory names are never
//! compared to decide recency.

use tracehook_core::config::TraceConfig;
use tracehook_core::{time, SessionId};

use crate::store::{Result, SessionEntry, SessionStore};

/// Resolves which session a hook run writes to or reads from.
#[derive(Debug, Clone)]
pub struct SessionSelector {
    prefix: String,
    env_var: String,
}

impl SessionSelector {
    /// An unusable `prefix` is replaced by the default one.
    pub fn new(prefix: impl Into<String>, env_var: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !SessionId::is_valid_prefix(&prefix) {
            tracing::warn!(prefix = %prefix, "Ignoring unusable session prefix");
            prefix = SessionId::DEFAULT_PREFIX.to_string();
        }
        Self {
            prefix,
            env_var: env_var.into(),
        }
    }

    pub fn from_config(trace: &TraceConfig) -> Self {
        Self::new(&trace.session_prefix, &trace.session_env)
    }

    /// Name of the environment variable carrying the host's session id.
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Session id from the environment, if set.
    pub fn env_session(&self) -> Option<String> {
        if self.env_var.is_empty() {
            return None;
        }
        std::env::var(&self.env_var).ok()
    }

    /// Mint a new `<prefix><epoch-millis>` id.
    pub fn generate(&self) -> SessionId {
        SessionId::generate(&self.prefix, time::now())
    }

    /// First valid id among `candidates`, in order, else a generated one.
    ///
    /// Blank candidates are skipped silently; invalid ones are logged.
    pub fn resolve_writer<'a, I>(&self, candidates: I) -> SessionId
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        for candidate in candidates.into_iter().flatten() {
            if candidate.trim().is_empty() {
                continue;
            }
            match SessionId::parse(candidate) {
                Ok(id) => return id,
                Err(e) => tracing::warn!(error = %e, "Ignoring session id"),
            }
        }

        let id = self.generate();
        tracing::debug!(session = %id, "Generated session id");
        id
    }

    /// The session aggregation should read.
    ///
    /// The current pointer wins when it names an existing session; otherwise
    /// the newest session directory by creation time.
    pub async fn current<S: SessionStore + ?Sized>(&self, store: &S) -> Result<Option<SessionEntry>> {
        let sessions = store.list().await?;

        if let Some(pointed) = store.current().await? {
            if let Some(entry) = sessions.iter().find(|s| s.id == pointed) {
                tracing::debug!(session = %pointed, "Selected session from pointer");
                return Ok(Some(entry.clone()));
            }
            tracing::debug!(session = %pointed, "Current pointer names a missing session");
        }

        Ok(sessions.into_iter().next())
    }
}
