//! Server Errors

use std::path::PathBuf;

use thiserror::Error;
use trellis_model::LoadError;

/// Errors raised by the server core.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("state actor has stopped")]
    ActorStopped,

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    #[error("no solution or project manifest found under {}", .root.display())]
    NothingToLoad { root: PathBuf },

    #[error("no workspace root and no solution path configured")]
    NoWorkspace,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("project loader panicked: {0}")]
    LoaderPanicked(String),
}

/// Server result type.
pub type ServerResult<T> = Result<T, ServerError>;
