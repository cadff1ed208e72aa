//! Configuration system for tracehook.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::session::SessionId;

/// Main configuration struct for tracehook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how sessions are traced
    pub trace: TraceConfig,
    /// Hook runtime settings
    pub hook: HookConfig,
    /// Console output settings
    pub display: DisplayConfig,
    /// Diagnostic logging
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Directory holding one subdirectory per session
    pub root: PathBuf,
    /// Environment variable carrying the host's session id
    pub session_env: String,
    /// Prefix of generated session ids
    pub session_prefix: String,
    /// Tool name whose invocations spawn sub-agents
    pub spawn_tool: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".temp/traces/sessions"),
            session_env: "CLAUDE_SESSION_ID".to_string(),
            session_prefix: SessionId::DEFAULT_PREFIX.to_string(),
            spawn_tool: "Task".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Wall-clock ceiling for a single hook run, in milliseconds
    pub timeout_ms: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl HookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Print the agent digest after aggregation
    pub digest: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { digest: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level: error, warn, info, debug, trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error).collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect()
    }

    /// Add an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "hook.timeout_ms")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl Config {
    /// Project-level config file, relative to the working directory.
    pub const PROJECT_FILE: &'static str = ".tracehook/config.toml";
    /// Gitignored local overrides of the project config.
    pub const PROJECT_LOCAL_FILE: &'static str = ".tracehook/config.local.toml";

    /// Layered sources, lowest precedence first.
    pub fn figment() -> Figment {
        Figment::new()
            // Default values
            .merge(Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            // Project config
            .merge(Toml::file(Self::PROJECT_FILE))
            // Project local config (gitignored)
            .merge(Toml::file(Self::PROJECT_LOCAL_FILE))
            // Environment variables, e.g. TRACEHOOK_TRACE__ROOT
            .merge(Env::prefixed("TRACEHOOK_").split("__"))
    }

    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, Error> {
        let config = Self::load().map_err(|e| Error::Config(e.to_string()))?;
        config.ensure_valid()
    }

    /// Fail on validation errors, logging any warnings.
    pub fn ensure_valid(self) -> Result<Self, Error> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.trace.root.as_os_str().is_empty() {
            result.add_error("trace.root", "Trace root cannot be empty");
        }

        if self.trace.spawn_tool.trim().is_empty() {
            result.add_error("trace.spawn_tool", "Spawn tool name cannot be empty");
        }

        if self.trace.session_prefix.is_empty() {
            result.add_error("trace.session_prefix", "Session prefix cannot be empty");
        } else if !SessionId::is_valid_prefix(&self.trace.session_prefix) {
            result.add_error(
                "trace.session_prefix",
                "Session prefix must be usable as the start of a directory name",
            );
        }

        if self.trace.session_env.trim().is_empty() {
            result.add_warning(
                "trace.session_env",
                "No session environment variable; every hook run will generate a new session",
            );
        }

        if self.hook.timeout_ms == 0 {
            result.add_error("hook.timeout_ms", "timeout_ms must be greater than 0");
        } else if self.hook.timeout_ms > 60_000 {
            result.add_warning(
                "hook.timeout_ms",
                "timeout_ms is above 60s, a stuck hook may hold up the host",
            );
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            result.add_error(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Valid values: {:?}",
                    self.logging.level, VALID_LOG_LEVELS
                ),
            );
        }

        result
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("tracehook"))
            .unwrap_or_else(|| PathBuf::from("~/.config/tracehook"))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_ok(), "Default config should be valid: {:?}", result.issues);
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_defaults_match_hook_layout() {
        let config = Config::default();
        assert_eq!(config.trace.root, PathBuf::from(".temp/traces/sessions"));
        assert_eq!(config.trace.session_env, "CLAUDE_SESSION_ID");
        assert_eq!(config.trace.spawn_tool, "Task");
        assert_eq!(config.hook.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.hook.timeout_ms = 0;
        let result = config.validate();
        assert!(!result.is_ok());
        assert!(result.errors().iter().any(|e| e.field == "hook.timeout_ms"));
    }

    #[test]
    fn test_long_timeout_is_warning() {
        let mut config = Config::default();
        config.hook.timeout_ms = 120_000;
        let result = config.validate();
        assert!(result.is_ok());
        assert!(result.warnings().iter().any(|e| e.field == "hook.timeout_ms"));
    }

    #[test]
    fn test_invalid_prefix_and_level() {
        let mut config = Config::default();
        config.trace.session_prefix = "../sess_".to_string();
        config.logging.level = "loud".to_string();
        let result = config.validate();
        assert!(result.errors().iter().any(|e| e.field == "trace.session_prefix"));
        assert!(result.errors().iter().any(|e| e.field == "logging.level"));
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_to_toml_contains_sections() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[trace]"));
        assert!(rendered.contains("timeout_ms = 5000"));
    }
}
