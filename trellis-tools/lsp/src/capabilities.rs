//! LSP Server Capabilities
//!
//! What the trellis server advertises, what it registers dynamically, and
//! the client capabilities it checks before doing so.

use std::time::Duration;

use serde_json::json;
use tower_lsp::lsp_types::notification::{DidChangeWatchedFiles, Notification};
use tower_lsp::lsp_types::*;
use trellis_model::file_patterns;

/// Reload delay after `initialized` and configuration changes.
pub const INITIAL_RELOAD_DELAY: Duration = Duration::from_millis(100);

/// Reload delay after file-watcher notifications.
pub const WATCHED_FILES_RELOAD_DELAY: Duration = Duration::from_secs(5);

/// Id of the watched-files registration.
pub const WATCHED_FILES_REGISTRATION_ID: &str = "trellis-watched-files";

/// Returns the server capabilities for the trellis language server.
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        // Type hierarchy has no dedicated field in this protocol version.
        experimental: Some(json!({ "typeHierarchyProvider": true })),
        ..ServerCapabilities::default()
    }
}

/// Returns true if the client accepts dynamic watched-files registrations.
pub fn supports_watched_files_registration(capabilities: &ClientCapabilities) -> bool {
    capabilities
        .workspace
        .as_ref()
        .and_then(|w| w.did_change_watched_files.as_ref())
        .map(|wf| wf.dynamic_registration == Some(true))
        .unwrap_or(false)
}

/// Returns true if the client answers `workspace/configuration`.
pub fn supports_configuration(capabilities: &ClientCapabilities) -> bool {
    capabilities
        .workspace
        .as_ref()
        .and_then(|w| w.configuration)
        .unwrap_or(false)
}

/// Registration watching every source, project and solution file.
pub fn watched_files_registration() -> Registration {
    let options = DidChangeWatchedFilesRegistrationOptions {
        watchers: vec![FileSystemWatcher {
            glob_pattern: file_patterns::watch_glob().into(),
            kind: None,
        }],
    };

    Registration {
        id: WATCHED_FILES_REGISTRATION_ID.to_string(),
        method: DidChangeWatchedFiles::METHOD.to_string(),
        register_options: serde_json::to_value(options).ok(),
    }
}
