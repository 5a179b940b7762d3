//! Trellis Project Model
//!
//! The project model the trellis language server queries: declared types,
//! their source locations, and the relations between them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌──────────────┐
//! │  manifests   │───►│ ManifestLoader │───►│ SolutionModel│
//! │ .trlsln/proj │    │  (ProjectLoader)│   │ (ProjectModel)│
//! └──────────────┘    └────────────────┘    └──────────────┘
//! ```
//!
//! The server only depends on the [`ProjectModel`] and [`ProjectLoader`]
//! traits; the manifest-backed implementations are one possible engine.

pub mod loader;
pub mod manifest;
pub mod model;
pub mod symbol;
pub mod toolchain;

pub use loader::{LoadError, LoadResult, LoadTarget, ManifestLoader, ProjectLoader};
pub use model::{Project, ProjectModel, SolutionModel, SolutionModelBuilder, SymbolDecl};
pub use symbol::{
    Document, ProjectId, SourceLocation, SpecialType, Symbol, SymbolId, SymbolKind, TextPosition,
    TextRange,
};
pub use toolchain::{ToolchainError, ToolchainInstance, ToolchainQuery};

/// File patterns the model is built from.
pub mod file_patterns {
    use std::path::Path;

    /// Source file extension.
    pub const SOURCE_EXT: &str = "trl";

    /// Project manifest extension.
    pub const PROJECT_EXT: &str = "trlproj";

    /// Solution manifest extension.
    pub const SOLUTION_EXT: &str = "trlsln";

    fn has_extension(path: &Path, ext: &str) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(ext)
    }

    /// Check if a path is a source file.
    pub fn is_source(path: &Path) -> bool {
        has_extension(path, SOURCE_EXT)
    }

    /// Check if a path is a project manifest.
    pub fn is_project(path: &Path) -> bool {
        has_extension(path, PROJECT_EXT)
    }

    /// Check if a path is a solution manifest.
    pub fn is_solution(path: &Path) -> bool {
        has_extension(path, SOLUTION_EXT)
    }

    /// Glob matching every file that can change the model.
    pub fn watch_glob() -> String {
        format!("**/*.{{{},{},{}}}", SOURCE_EXT, PROJECT_EXT, SOLUTION_EXT)
    }
}
