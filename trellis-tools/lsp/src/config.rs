//! Server Configuration
//!
//! Settings held in the server state, and the shape the client sends them
//! in (`initializationOptions` or the `trellis` configuration section).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerResult;

/// Configuration section requested from the client.
pub const CONFIG_SECTION: &str = "trellis";

/// Verbosity, from least to most chatty.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Returns true if a message at `level` should be shown at this verbosity.
    pub fn allows(self, level: LogLevel) -> bool {
        level <= self
    }
}

/// Settings held in the server state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Solution to load; discovered under the root path when unset.
    pub solution_path: Option<PathBuf>,

    /// Verbosity of messages forwarded to the client.
    pub log_level: LogLevel,
}

/// Settings as sent by the client. Absent fields leave the current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientSettings {
    /// Solution path; an empty string clears it.
    pub solution: Option<String>,

    pub log_level: Option<LogLevel>,
}

impl ClientSettings {
    /// Parses a settings object.
    pub fn from_value(value: Value) -> ServerResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parses a `workspace/didChangeConfiguration` payload.
    ///
    /// Clients send either `{ "trellis": { .. } }` or the section itself.
    /// Returns `Ok(None)` when the payload carries no settings.
    pub fn from_change_payload(value: &Value) -> ServerResult<Option<Self>> {
        let section = match value.get(CONFIG_SECTION) {
            Some(section) => section,
            None => value,
        };

        match section {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            other => Self::from_value(other.clone()).map(Some),
        }
    }

    /// Returns `current` with the fields present here replaced.
    pub fn apply_to(&self, current: &Settings) -> Settings {
        let solution_path = match &self.solution {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => current.solution_path.clone(),
        };

        Settings {
            solution_path,
            log_level: self.log_level.unwrap_or(current.log_level),
        }
    }
}
