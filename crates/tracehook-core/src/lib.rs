//! # tracehook-core
//!
//! Core types for tracehook, the session tracer for AI coding assistant hooks.
//!
//! This crate provides:
//! - Trace events and their lenient log decoding
//! - Hook payload parsing
//! - Session identifiers, metadata and metrics summary records
//! - Configuration system
//! - Common error types

pub mod config;
pub mod error;
pub mod event;
pub mod hook;
pub mod session;
pub mod time;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{AgentSpawn, Event, EventKind};
pub use hook::{HookInput, ToolInvocation};
pub use session::{MetricsSummary, SessionId, SessionMetadata};
