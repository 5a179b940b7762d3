//! Project Loader
//!
//! Turns a solution or a set of project manifests into a [`SolutionModel`].
//!
//! # Target Discovery
//!
//! [`LoadTarget::discover`] picks what to load for a workspace root:
//! - an explicit solution path (relative paths resolve against the root),
//! - otherwise the `*.trlsln` at the root (first in name order if several),
//! - otherwise every `*.trlproj` below the root.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::file_patterns;
use crate::manifest::{LocationEntry, ProjectManifest, SolutionManifest};
use crate::model::{ProjectModel, SolutionModelBuilder, SymbolDecl};
use crate::symbol::{qualified_name, SourceLocation, SymbolId};
use crate::toolchain::ToolchainInstance;

/// Errors raised while loading a model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate type `{0}`")]
    DuplicateType(String),

    #[error("unknown type `{name}` referenced by `{from}`")]
    UnresolvedType { name: String, from: String },
}

/// Loader result type.
pub type LoadResult<T> = Result<T, LoadError>;

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    /// A solution manifest.
    Solution(PathBuf),
    /// Loose project manifests, in load order.
    Projects(Vec<PathBuf>),
}

impl LoadTarget {
    /// Chooses a target for `root`, honouring an explicit solution path.
    ///
    /// Returns `None` when there is nothing to load.
    pub fn discover(root: Option<&Path>, solution: Option<&Path>) -> Option<Self> {
        if let Some(solution) = solution {
            let path = match root {
                Some(root) if solution.is_relative() => root.join(solution),
                _ => solution.to_path_buf(),
            };
            return Some(LoadTarget::Solution(normalize_path(&path)));
        }

        let root = root?;
        let mut solutions: Vec<PathBuf> = fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && file_patterns::is_solution(path))
            .collect();
        solutions.sort();

        if let Some(first) = solutions.first() {
            if solutions.len() > 1 {
                warn!(
                    "Found {} solutions in {}, using {}",
                    solutions.len(),
                    root.display(),
                    first.display()
                );
            }
            return Some(LoadTarget::Solution(normalize_path(first)));
        }

        let mut projects: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && file_patterns::is_project(entry.path()))
            .map(|entry| normalize_path(entry.path()))
            .collect();
        projects.sort();

        if projects.is_empty() {
            None
        } else {
            Some(LoadTarget::Projects(projects))
        }
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.') || name == "target")
}

/// Builds models from a [`LoadTarget`].
///
/// Implementations may block; callers run them off the async runtime.
pub trait ProjectLoader: Send + Sync {
    fn load(&self, target: &LoadTarget) -> LoadResult<Arc<dyn ProjectModel>>;
}

/// Loads manifest-indexed solutions.
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    toolchain: Option<ToolchainInstance>,
}

impl ManifestLoader {
    /// Creates a loader that was not bound to a build toolchain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the loader to the toolchain discovered at startup.
    pub fn with_toolchain(toolchain: ToolchainInstance) -> Self {
        Self {
            toolchain: Some(toolchain),
        }
    }

    fn project_paths(&self, target: &LoadTarget) -> LoadResult<Vec<PathBuf>> {
        match target {
            LoadTarget::Solution(path) => {
                let solution: SolutionManifest = read_manifest(path)?;
                let dir = parent_dir(path);
                Ok(solution
                    .projects
                    .iter()
                    .map(|p| normalize_path(&dir.join(p)))
                    .collect())
            }
            LoadTarget::Projects(paths) => Ok(paths.clone()),
        }
    }
}

struct PendingRelations {
    id: SymbolId,
    full_name: String,
    base: Option<String>,
    interfaces: Vec<String>,
}

impl ProjectLoader for ManifestLoader {
    fn load(&self, target: &LoadTarget) -> LoadResult<Arc<dyn ProjectModel>> {
        let start = Instant::now();
        if let Some(toolchain) = &self.toolchain {
            debug!("Loading {:?} with toolchain {}", target, toolchain.path.display());
        }

        let mut builder = SolutionModelBuilder::new();
        let mut by_name: HashMap<String, SymbolId> = HashMap::new();
        let mut pending = Vec::new();
        let mut symbol_count = 0usize;

        let project_paths = self.project_paths(target)?;
        for manifest_path in &project_paths {
            let manifest: ProjectManifest = read_manifest(manifest_path)?;
            let dir = parent_dir(manifest_path);
            let project = builder.add_project(manifest.name.clone(), manifest_path.clone());

            for document in &manifest.documents {
                builder.add_document(project, normalize_path(&dir.join(document)));
            }

            for entry in manifest.types {
                let full_name = qualified_name(&entry.namespace, &entry.name);
                if by_name.contains_key(&full_name) {
                    return Err(LoadError::DuplicateType(full_name));
                }

                let mut decl = SymbolDecl::new(entry.name, entry.kind).in_namespace(entry.namespace.clone());
                decl.special = entry.special;
                decl.locations = resolve_locations(&dir, &entry.locations);
                let id = builder.add_symbol(project, decl);
                symbol_count += 1;
                by_name.insert(full_name.clone(), id);

                for member in entry.members {
                    let mut decl = SymbolDecl::new(member.name, member.kind)
                        .in_namespace(entry.namespace.clone())
                        .member_of(id);
                    decl.locations = resolve_locations(&dir, &member.locations);
                    builder.add_symbol(project, decl);
                    symbol_count += 1;
                }

                pending.push(PendingRelations {
                    id,
                    full_name,
                    base: entry.base,
                    interfaces: entry.interfaces,
                });
            }
        }

        // References may point forward or into later projects.
        for relations in pending {
            let lookup = |name: &String| {
                by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| LoadError::UnresolvedType {
                        name: name.clone(),
                        from: relations.full_name.clone(),
                    })
            };

            if let Some(base) = &relations.base {
                let base = lookup(base)?;
                builder.set_base(relations.id, base);
            }
            for interface in &relations.interfaces {
                let interface = lookup(interface)?;
                builder.add_interface(relations.id, interface);
            }
        }

        let model = builder.build();
        info!(
            "Loaded {} projects with {} symbols in {:?}",
            project_paths.len(),
            symbol_count,
            start.elapsed()
        );

        Ok(Arc::new(model))
    }
}

fn read_manifest<T: serde::de::DeserializeOwned>(path: &Path) -> LoadResult<T> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_locations(dir: &Path, entries: &[LocationEntry]) -> Vec<SourceLocation> {
    entries
        .iter()
        .map(|entry| SourceLocation {
            path: normalize_path(&dir.join(&entry.file)),
            range: entry.range,
            name_range: entry.name_range.unwrap_or(entry.range),
        })
        .collect()
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Removes `.` and `..` components without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/ws/app/../lib/./src/a.trl")),
            PathBuf::from("/ws/lib/src/a.trl")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_explicit_solution_resolves_against_root() {
        let target = LoadTarget::discover(Some(Path::new("/ws")), Some(Path::new("sub/App.trlsln")));
        assert_eq!(target, Some(LoadTarget::Solution(PathBuf::from("/ws/sub/App.trlsln"))));

        let target = LoadTarget::discover(None, Some(Path::new("/abs/App.trlsln")));
        assert_eq!(target, Some(LoadTarget::Solution(PathBuf::from("/abs/App.trlsln"))));
    }

    #[test]
    fn test_no_root_no_target() {
        assert_eq!(LoadTarget::discover(None, None), None);
    }
}
