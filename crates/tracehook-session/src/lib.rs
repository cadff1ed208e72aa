//! # tracehook-session
//!
//! Session trace storage and event recording for tracehook.
//!
//! This crate provides:
//! - A directory-per-session store with an append-only JSONL event log
//! - Session selection for writers (external or generated ids) and readers
//!   (current pointer, then newest directory)
//! - The event recorder behind the tool-use hook
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tracehook_core::Config;
//! use tracehook_session::{EventRecorder, FileSessionStore};
//!
//! let config = Config::load()?;
//! let store = FileSessionStore::new(&config.trace.root);
//! let recorder = EventRecorder::from_config(store, &config);
//!
//! // Never fails; problems are logged.
//! recorder.record_silently(&stdin_payload).await;
//! ```
//!
//! ## Storage Layout
//!
//! - `<root>/<session_id>/events.jsonl` - Append-only event log
//! - `<root>/<session_id>/metadata.json` - Counters derived from the log
//! - `<root>/<session_id>/metrics.json` - Aggregated summary
//! - `<root>/.current` - Session last written to

pub mod recorder;
pub mod selector;
pub mod store;

// Re-export commonly used types
pub use recorder::EventRecorder;
pub use selector::SessionSelector;
pub use store::{
    AppendResult, EventLog, FileSessionStore, SessionEntry, SessionStore, StoreError,
};
