//! Build Toolchain Discovery
//!
//! Locates installed instances of the build tool that produces project
//! manifests. The server refuses to start without at least one.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Executable name searched for by default.
pub const DEFAULT_TOOL_NAME: &str = "trellis-build";

/// Toolchain discovery errors.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("no `{tool}` toolchain found in {searched} searched directories")]
    NotFound { tool: String, searched: usize },
}

/// A discovered toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainInstance {
    /// Path of the tool executable.
    pub path: PathBuf,
}

impl ToolchainInstance {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Where and what to search for.
#[derive(Debug, Clone)]
pub struct ToolchainQuery {
    /// Executable name without platform suffix.
    pub tool_name: String,
    /// Directories searched before the search path.
    pub extra_dirs: Vec<PathBuf>,
    /// A `PATH`-style list of directories.
    pub search_path: Option<OsString>,
}

impl ToolchainQuery {
    /// Searches only `extra_dirs` and nothing from the environment.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            extra_dirs: Vec::new(),
            search_path: None,
        }
    }

    /// Searches the process `PATH` after any extra directories.
    pub fn from_env(tool_name: impl Into<String>) -> Self {
        Self {
            search_path: env::var_os("PATH"),
            ..Self::new(tool_name)
        }
    }

    pub fn with_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.extra_dirs.extend(dirs);
        self
    }

    fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = self.extra_dirs.clone();
        if let Some(search_path) = &self.search_path {
            dirs.extend(env::split_paths(search_path));
        }
        dirs
    }
}

/// Finds toolchain instances in search order, without duplicates.
pub fn discover(query: &ToolchainQuery) -> Result<Vec<ToolchainInstance>, ToolchainError> {
    let dirs = query.directories();
    let mut found: Vec<ToolchainInstance> = Vec::new();

    for dir in &dirs {
        for candidate in candidate_names(&query.tool_name) {
            let path = dir.join(&candidate);
            if is_executable(&path) && !found.iter().any(|t| t.path == path) {
                debug!("Found toolchain at {}", path.display());
                found.push(ToolchainInstance::new(path));
            }
        }
    }

    if found.is_empty() {
        return Err(ToolchainError::NotFound {
            tool: query.tool_name.clone(),
            searched: dirs.len(),
        });
    }

    Ok(found)
}

fn candidate_names(tool_name: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{}.exe", tool_name), tool_name.to_string()]
    } else {
        vec![tool_name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
