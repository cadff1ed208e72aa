//! Session storage implementation.
//!
//! One directory per session under a root:
//!
//! ```text
//! <root>/.current                     name of the session last written to
//! <root>/<session_id>/events.jsonl    append-only event log
//! <root>/<session_id>/metadata.json   derived counters, overwritten
//! <root>/<session_id>/metrics.json    aggregated summary, overwritten
//! ```
//!
//! Appends are a single write of one full line. Whole-file records are
//! written to a temporary file and renamed into place; there is no locking,
//! so concurrent writers of the same record race and the last rename wins.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use tracehook_core::{Event, MetricsSummary, SessionId, SessionMetadata};

/// Event log file name inside a session directory.
pub const EVENTS_FILE: &str = "events.jsonl";
/// Metadata file name inside a session directory.
pub const METADATA_FILE: &str = "metadata.json";
/// Metrics summary file name inside a session directory.
pub const METRICS_FILE: &str = "metrics.json";
/// Pointer file in the root naming the current session.
pub const CURRENT_POINTER: &str = ".current";

/// Errors that can occur during session storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Core(#[from] tracehook_core::Error),

    #[error("Storage path error: {0}")]
    PathError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Result of appending an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    /// Byte offset of the new line in the log
    pub file_offset: u64,
    /// Length of the line, excluding the newline
    pub byte_length: usize,
}

/// Events decoded from a session log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Successfully decoded events, in append order
    pub events: Vec<Event>,
    /// Non-blank lines that failed to decode
    pub skipped: usize,
}

impl EventLog {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// A session directory found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: SessionId,
    pub path: PathBuf,
    /// Directory birth time, or modification time where unsupported
    pub created: DateTime<Utc>,
}

/// Session storage trait for abstraction over storage backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Root directory holding all sessions.
    fn root(&self) -> &Path;

    /// Append one event to a session's log, creating the session if needed.
    async fn append_event(&self, id: &SessionId, event: &Event) -> Result<AppendResult>;

    /// Read a session's log. A missing log reads as empty.
    async fn read_events(&self, id: &SessionId) -> Result<EventLog>;

    /// Read the metadata record. Missing or undecodable records read as `None`.
    async fn read_metadata(&self, id: &SessionId) -> Result<Option<SessionMetadata>>;

    /// Replace the metadata record.
    async fn write_metadata(&self, id: &SessionId, metadata: &SessionMetadata) -> Result<()>;

    /// Read the metrics summary. Missing or undecodable records read as `None`.
    async fn read_summary(&self, id: &SessionId) -> Result<Option<MetricsSummary>>;

    /// Replace the metrics summary.
    async fn write_summary(&self, id: &SessionId, summary: &MetricsSummary) -> Result<()>;

    /// Whether the session directory exists.
    async fn exists(&self, id: &SessionId) -> Result<bool>;

    /// All sessions, newest first.
    async fn list(&self) -> Result<Vec<SessionEntry>>;

    /// Sessions whose id starts with `prefix`, newest first.
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<SessionEntry>>;

    /// Session named by the current pointer, if any.
    async fn current(&self) -> Result<Option<SessionId>>;

    /// Point the current pointer at `id`.
    async fn set_current(&self, id: &SessionId) -> Result<()>;
}

/// Filesystem-backed session storage.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `root`.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory of a session.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Event log path of a session.
    pub fn events_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(EVENTS_FILE)
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join(CURRENT_POINTER)
    }

    /// Ensure session directory exists.
    fn ensure_session_dir(&self, id: &SessionId) -> Result<PathBuf> {
        let dir = self.session_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn entry_for(path: PathBuf, meta: &fs::Metadata) -> Option<SessionEntry> {
        let name = path.file_name()?.to_str()?;
        let id = SessionId::parse(name).ok()?;
        let created: SystemTime = meta
            .created()
            .or_else(|_| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        Some(SessionEntry {
            id,
            path,
            created: DateTime::<Utc>::from(created),
        })
    }
}

/// Decode a JSON record, treating absence and corruption alike.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable record");
            Ok(None)
        }
    }
}

/// Write pretty JSON through a temporary sibling and rename it into place.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::PathError(format!("{} has no parent", path.display())))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::PathError(format!("{} has no file name", path.display())))?;
    let tmp = dir.join(format!(".{}.{}.tmp", name, std::process::id()));

    let json = serde_json::to_string_pretty(value)?;
    let result = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn append_event(&self, id: &SessionId, event: &Event) -> Result<AppendResult> {
        self.ensure_session_dir(id)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path(id))?;

        let offset = file.metadata()?.len();
        let json = event.to_json_line()?;
        let byte_length = json.len();

        // One write per line keeps concurrent small appends from interleaving.
        let mut line = json;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;

        tracing::debug!(session = %id, offset, "Appended event");

        Ok(AppendResult {
            file_offset: offset,
            byte_length,
        })
    }

    async fn read_events(&self, id: &SessionId) -> Result<EventLog> {
        let path = self.events_path(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EventLog::default()),
            Err(e) => return Err(e.into()),
        };

        let mut log = EventLog::default();
        for (idx, chunk) in BufReader::new(file).split(b'\n').enumerate() {
            let chunk = chunk?;
            let line = match std::str::from_utf8(&chunk) {
                Ok(line) => line,
                Err(_) => {
                    tracing::debug!(session = %id, line = idx + 1, "Skipping non-UTF-8 line");
                    log.skipped += 1;
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match Event::from_json_line(line) {
                Ok(event) => log.events.push(event),
                Err(e) => {
                    tracing::debug!(session = %id, line = idx + 1, error = %e, "Skipping malformed line");
                    log.skipped += 1;
                }
            }
        }

        Ok(log)
    }

    async fn read_metadata(&self, id: &SessionId) -> Result<Option<SessionMetadata>> {
        read_json(&self.session_dir(id).join(METADATA_FILE))
    }

    async fn write_metadata(&self, id: &SessionId, metadata: &SessionMetadata) -> Result<()> {
        let dir = self.ensure_session_dir(id)?;
        write_json_atomic(&dir.join(METADATA_FILE), metadata)
    }

    async fn read_summary(&self, id: &SessionId) -> Result<Option<MetricsSummary>> {
        read_json(&self.session_dir(id).join(METRICS_FILE))
    }

    async fn write_summary(&self, id: &SessionId, summary: &MetricsSummary) -> Result<()> {
        let dir = self.ensure_session_dir(id)?;
        write_json_atomic(&dir.join(METRICS_FILE), summary)
    }

    async fn exists(&self, id: &SessionId) -> Result<bool> {
        Ok(self.session_dir(id).is_dir())
    }

    async fn list(&self) -> Result<Vec<SessionEntry>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        for entry in entries {
            // Entries can vanish between the directory read and the stat.
            let (entry, meta) = match entry.and_then(|e| e.metadata().map(|m| (e, m))) {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry in trace root");
                    continue;
                }
            };
            if !meta.is_dir() {
                continue;
            }
            if let Some(session) = Self::entry_for(entry.path(), &meta) {
                sessions.push(session);
            }
        }

        sessions.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        Ok(sessions)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<SessionEntry>> {
        let sessions = self.list().await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.id.as_str().starts_with(prefix))
            .collect())
    }

    async fn current(&self) -> Result<Option<SessionId>> {
        let raw = match fs::read_to_string(self.pointer_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::debug!(error = %e, "Current-session pointer unreadable, ignoring");
                return Ok(None);
            }
        };

        match SessionId::parse(&raw) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid current-session pointer");
                Ok(None)
            }
        }
    }

    async fn set_current(&self, id: &SessionId) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let tmp = self
            .root
            .join(format!("{}.{}.tmp", CURRENT_POINTER, std::process::id()));
        fs::write(&tmp, id.as_str())?;
        fs::rename(&tmp, self.pointer_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use tracehook_core::{time, AgentSpawn};

    fn create_test_store() -> (FileSessionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().join("sessions"));
        (store, temp_dir)
    }

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    fn spawn(agent: &str) -> AgentSpawn {
        AgentSpawn {
            agent_type: agent.to_string(),
            description: format!("work for {}", agent),
            model: "sonnet".to_string(),
            run_in_background: false,
        }
    }

    #[tokio::test]
    async fn test_append_and_read_events() {
        let (store, _tmp) = create_test_store();
        let id = sid("sess_1");

        let first = store
            .append_event(&id, &Event::agent_spawned("sess_1", spawn("a")))
            .await
            .unwrap();
        let second = store
            .append_event(&id, &Event::agent_spawned("sess_1", spawn("b")))
            .await
            .unwrap();
        assert_eq!(first.file_offset, 0);
        assert_eq!(second.file_offset, first.byte_length as u64 + 1);

        let log = store.read_events(&id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.skipped, 0);
        assert_eq!(log.events[0].agent_spawn().unwrap().agent_type, "a");
        assert_eq!(log.events[1].agent_spawn().unwrap().agent_type, "b");
    }

    #[tokio::test]
    async fn test_n_appends_give_n_lines() {
        let (store, _tmp) = create_test_store();
        let id = sid("sess_n");

        for i in 0..7 {
            let event = Event::agent_spawned("sess_n", spawn(&format!("agent-{}", i)));
            store.append_event(&id, &event).await.unwrap();
        }

        let raw = fs::read_to_string(store.events_path(&id)).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 7);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            for field in ["event", "timestamp", "session_id", "data"] {
                assert!(value.get(field).is_some(), "missing {} in {}", field, line);
            }
        }
    }

    #[tokio::test]
    async fn test_read_skips_malformed_and_blank_lines() {
        let (store, _tmp) = create_test_store();
        let id = sid("sess_bad");
        store
            .append_event(&id, &Event::agent_spawned("sess_bad", spawn("a")))
            .await
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(store.events_path(&id)).unwrap();
        file.write_all(b"{\"event\": \"agent_sp\n\n   \n").unwrap();
        file.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        drop(file);

        store
            .append_event(&id, &Event::agent_spawned("sess_bad", spawn("b")))
            .await
            .unwrap();

        let log = store.read_events(&id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.skipped, 2);
    }

    #[tokio::test]
    async fn test_missing_session_reads_empty() {
        let (store, _tmp) = create_test_store();
        let id = sid("sess_none");

        assert!(store.read_events(&id).await.unwrap().is_empty());
        assert!(store.read_metadata(&id).await.unwrap().is_none());
        assert!(store.read_summary(&id).await.unwrap().is_none());
        assert!(!store.exists(&id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.root().exists());
    }

    #[tokio::test]
    async fn test_metadata_round_trip_and_corruption() {
        let (store, _tmp) = create_test_store();
        let id = sid("sess_meta");
        let now = time::now();
        let meta = SessionMetadata {
            created: now,
            agent_count: 2,
            events_count: 2,
            last_updated: now,
            last_agent: "a".to_string(),
        };

        store.write_metadata(&id, &meta).await.unwrap();
        assert_eq!(store.read_metadata(&id).await.unwrap(), Some(meta));

        fs::write(store.session_dir(&id).join(METADATA_FILE), "{ nope").unwrap();
        assert!(store.read_metadata(&id).await.unwrap().is_none());

        let leftovers: Vec<_> = fs::read_dir(store.session_dir(&id))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_summary_is_replaced() {
        let (store, _tmp) = create_test_store();
        let id = sid("sess_sum");
        let mut summary = MetricsSummary {
            session_id: "sess_sum".to_string(),
            aggregated_at: time::now(),
            total_events: 1,
            total_agents_spawned: 1,
            agents_by_type: BTreeMap::from([("a".to_string(), 1)]),
            models_used: BTreeMap::from([("sonnet".to_string(), 1)]),
            first_event: None,
            last_event: None,
        };
        store.write_summary(&id, &summary).await.unwrap();

        summary.total_events = 5;
        summary.agents_by_type.clear();
        store.write_summary(&id, &summary).await.unwrap();

        let read = store.read_summary(&id).await.unwrap().unwrap();
        assert_eq!(read.total_events, 5);
        assert!(read.agents_by_type.is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_files_and_invalid_names() {
        let (store, _tmp) = create_test_store();
        store.set_current(&sid("sess_2")).await.unwrap();
        fs::create_dir_all(store.root().join("sess_1")).unwrap();
        fs::create_dir_all(store.root().join("sess_2")).unwrap();
        fs::create_dir_all(store.root().join(".hidden")).unwrap();
        fs::write(store.root().join("notes.txt"), "x").unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"sess_1".to_string()));
        assert!(ids.contains(&"sess_2".to_string()));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let (store, _tmp) = create_test_store();
        fs::create_dir_all(store.root().join("sess_b")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        fs::create_dir_all(store.root().join("sess_a")).unwrap();

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions[0].id.as_str(), "sess_a");
        assert_eq!(sessions[1].id.as_str(), "sess_b");
    }

    #[tokio::test]
    async fn test_find_by_prefix() {
        let (store, _tmp) = create_test_store();
        for name in ["sess_100", "sess_101", "other"] {
            fs::create_dir_all(store.root().join(name)).unwrap();
        }

        assert_eq!(store.find_by_prefix("sess_10").await.unwrap().len(), 2);
        assert_eq!(store.find_by_prefix("oth").await.unwrap().len(), 1);
        assert!(store.find_by_prefix("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_current_pointer() {
        let (store, _tmp) = create_test_store();
        assert!(store.current().await.unwrap().is_none());

        store.set_current(&sid("sess_7")).await.unwrap();
        assert_eq!(store.current().await.unwrap(), Some(sid("sess_7")));

        fs::write(store.root().join(CURRENT_POINTER), "../escape").unwrap();
        assert!(store.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pointer_directory_reads_as_absent() {
        let (store, _tmp) = create_test_store();
        store
            .append_event(&sid("sess_1"), &Event::agent_spawned("sess_1", spawn("a")))
            .await
            .unwrap();
        fs::create_dir_all(store.root().join(CURRENT_POINTER)).unwrap();

        assert!(store.current().await.unwrap().is_none());
        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, ["sess_1"]);
    }
}
