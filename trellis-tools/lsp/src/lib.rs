//! Trellis Language Server Protocol Implementation
//!
//! Answers type-hierarchy queries against a project model that is rebuilt
//! in the background while requests keep flowing:
//!
//! - Prepare type hierarchy
//! - Supertypes and subtypes
//! - Debounced model reloads on configuration and file changes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐    ┌──────────────┐    ┌───────────────┐
//! │  IDE    │◄──►│ trellis-lsp  │◄──►│ trellis-model │
//! │ Client  │    │    Server    │    │ ProjectModel  │
//! └─────────┘    └──────────────┘    └───────────────┘
//! ```
//!
//! Notifications become [`StateEvent`]s applied one at a time by the state
//! actor. Requests read a [`RequestScope`] captured when they arrive.

pub mod backend;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod reload;
pub mod scope;
pub mod state;

use std::sync::Arc;

use tower_lsp::{ClientSocket, LspService, Server};
use tracing::info;
use trellis_model::ProjectLoader;

pub use backend::{ClientLogObserver, TrellisLanguageServer};
pub use config::{LogLevel, Settings};
pub use error::{ServerError, ServerResult};
pub use scope::RequestScope;
pub use state::{ServerState, StateActor, StateEvent, StateHandle};

/// What a server instance starts with.
pub struct ServerConfig {
    /// Initial settings; the client may override them.
    pub settings: Settings,
    /// Builds project models on reload.
    pub loader: Arc<dyn ProjectLoader>,
}

/// Creates the LSP service and spawns its state actor.
///
/// Must be called from within a tokio runtime.
pub fn build_service(config: ServerConfig) -> (LspService<TrellisLanguageServer>, ClientSocket) {
    let ServerConfig { settings, loader } = config;

    LspService::new(move |client| {
        let observer = Arc::new(ClientLogObserver::new(client.clone()));
        let state = StateActor::spawn(ServerState::new(settings), loader, Some(observer));
        TrellisLanguageServer::new(client, state)
    })
}

/// Runs the trellis language server over stdio.
///
/// This is the main entry point for the LSP binary.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = build_service(config);

    info!("Starting trellis language server");
    Server::new(stdin, stdout, socket).serve(service).await;
    info!("trellis language server stopped");

    Ok(())
}
