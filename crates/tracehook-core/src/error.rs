//! Error types for tracehook.
//!
//! Library code returns these; the hook entry points in the CLI log them and
//! carry on, so every variant is written to be readable on stderr.

use thiserror::Error;

/// Result type alias using the tracehook [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tracehook.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hook payload could not be decoded
    #[error("Invalid hook payload: {0}")]
    InvalidPayload(String),

    /// Session identifier is not usable as a directory name
    #[error("Invalid session id '{id}': {reason}")]
    InvalidSessionId { id: String, reason: &'static str },

    /// No recorded session matches
    #[error("Session not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) => Some("Check .tracehook/config.toml or run 'tracehook config show'"),
            Error::InvalidPayload(_) => {
                Some("Hooks expect a JSON object with 'tool_name' and 'tool_input' on stdin")
            }
            Error::InvalidSessionId { .. } => {
                Some("Session ids must be a single path component without separators")
            }
            Error::NotFound(_) => Some("Use 'tracehook session list' to see recorded sessions"),
        }
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}
