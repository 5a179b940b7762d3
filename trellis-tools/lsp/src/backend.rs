//! LSP Backend Implementation
//!
//! Translates protocol traffic into state events (write path) and request
//! scopes (read path).

use std::path::PathBuf;

use tokio::sync::Mutex;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};
use trellis_model::file_patterns;
use trellis_model::loader::normalize_path;

use crate::capabilities::{self, INITIAL_RELOAD_DELAY, WATCHED_FILES_RELOAD_DELAY};
use crate::config::{ClientSettings, LogLevel, CONFIG_SECTION};
use crate::hierarchy::HierarchyResolver;
use crate::reload::{ReloadObserver, ReloadOutcome};
use crate::scope::RequestScope;
use crate::state::{ServerState, StateEvent, StateHandle};

/// The trellis language server backend.
pub struct TrellisLanguageServer {
    /// The LSP client for sending notifications and requests.
    client: Client,
    /// Handle to the state actor.
    state: StateHandle,
    /// Type hierarchy provider.
    hierarchy: HierarchyResolver,
    /// Held while a partial settings update is merged and posted.
    settings_merge: Mutex<()>,
}

impl TrellisLanguageServer {
    /// Creates a server bound to a running state actor.
    pub fn new(client: Client, state: StateHandle) -> Self {
        Self {
            client,
            state,
            hierarchy: HierarchyResolver::new(),
            settings_merge: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    async fn register_watched_files(&self, capabilities: &ClientCapabilities) {
        if !capabilities::supports_watched_files_registration(capabilities) {
            debug!("client cannot register watched files dynamically");
            return;
        }

        let registration = capabilities::watched_files_registration();
        match self.client.register_capability(vec![registration]).await {
            Ok(()) => debug!("registered {}", file_patterns::watch_glob()),
            Err(err) => warn!("Failed to register watched files: {}", err),
        }
    }

    async fn fetch_configuration(&self, capabilities: &ClientCapabilities) {
        if !capabilities::supports_configuration(capabilities) {
            return;
        }

        let item = ConfigurationItem {
            scope_uri: None,
            section: Some(CONFIG_SECTION.to_string()),
        };
        let values = match self.client.configuration(vec![item]).await {
            Ok(values) => values,
            Err(err) => {
                warn!("Failed to fetch configuration: {}", err);
                return;
            }
        };

        let Some(value) = values.into_iter().next() else {
            return;
        };
        match ClientSettings::from_change_payload(&value) {
            Ok(Some(update)) => {
                self.merge_settings(update).await;
            }
            Ok(None) => {}
            Err(err) => warn!("Ignoring client configuration: {}", err),
        }
    }

    /// Merges a partial update over the current settings and posts the result.
    ///
    /// Returns true if the solution path changed. Merges run one at a time,
    /// each over the settings the previous one posted.
    async fn merge_settings(&self, update: ClientSettings) -> bool {
        let _merge = self.settings_merge.lock().await;

        if let Err(err) = self.state.sync().await {
            debug!("settings update dropped: {}", err);
            return false;
        }
        let current = self.state.current_state();
        let settings = update.apply_to(&current.settings);
        let solution_changed = settings.solution_path != current.settings.solution_path;

        debug!("Settings changed: {:?}", settings);
        self.state.post(StateEvent::SettingsChange(settings));
        solution_changed
    }
}

/// Picks the workspace root from `initialize` parameters.
#[allow(deprecated)]
fn root_path(params: &InitializeParams) -> Option<PathBuf> {
    let from_uri = |uri: &Url| uri.to_file_path().ok();

    params
        .root_uri
        .as_ref()
        .and_then(from_uri)
        .or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first())
                .and_then(|folder| from_uri(&folder.uri))
        })
        .or_else(|| params.root_path.as_ref().map(PathBuf::from))
        .map(|path| normalize_path(&path))
}

/// Returns true if a watched-file event can change the model.
///
/// Content edits to source files do not, since declarations come from the
/// project manifests.
fn affects_model(event: &FileEvent) -> bool {
    let Ok(path) = event.uri.to_file_path() else {
        return false;
    };
    if file_patterns::is_project(&path) || file_patterns::is_solution(&path) {
        return true;
    }
    file_patterns::is_source(&path) && event.typ != FileChangeType::CHANGED
}

#[tower_lsp::async_trait]
impl LanguageServer for TrellisLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("Initializing trellis language server");

        self.state
            .post(StateEvent::ClientCapabilityChange(params.capabilities.clone()));

        match root_path(&params) {
            Some(root) => {
                info!("Workspace root: {}", root.display());
                self.state.post(StateEvent::RootPathChange(root));
            }
            None => warn!("Client sent no workspace root"),
        }

        if let Some(options) = &params.initialization_options {
            match ClientSettings::from_change_payload(options) {
                Ok(Some(update)) => {
                    self.merge_settings(update).await;
                }
                Ok(None) => {}
                Err(err) => warn!("Ignoring initialization options: {}", err),
            }
        }

        Ok(InitializeResult {
            capabilities: capabilities::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "trellis-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        if let Err(err) = self.state.sync().await {
            warn!("State unavailable after initialize: {}", err);
            return;
        }

        let client_capabilities = self
            .state
            .current_state()
            .client_capabilities
            .clone()
            .unwrap_or_default();

        self.register_watched_files(&client_capabilities).await;
        self.fetch_configuration(&client_capabilities).await;
        self.state
            .post(StateEvent::SolutionReloadRequest(INITIAL_RELOAD_DELAY));

        info!("trellis language server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down trellis language server");
        if let Err(err) = self.state.sync().await {
            debug!("state actor already stopped: {}", err);
        }
        Ok(())
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let update = match ClientSettings::from_change_payload(&params.settings) {
            Ok(Some(update)) => update,
            Ok(None) => return,
            Err(err) => {
                warn!("Ignoring configuration change: {}", err);
                return;
            }
        };

        if self.merge_settings(update).await {
            self.state
                .post(StateEvent::SolutionReloadRequest(INITIAL_RELOAD_DELAY));
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let relevant = params.changes.iter().filter(|e| affects_model(e)).count();
        debug!(
            "{} watched file changes, {} affect the model",
            params.changes.len(),
            relevant
        );

        if relevant > 0 {
            self.state
                .post(StateEvent::SolutionReloadRequest(WATCHED_FILES_RELOAD_DELAY));
        }
    }

    async fn prepare_type_hierarchy(
        &self,
        params: TypeHierarchyPrepareParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        let scope = RequestScope::new(&self.state, "textDocument/prepareTypeHierarchy");
        let position = params.text_document_position_params;

        Ok(scope.span().in_scope(|| {
            debug!(
                "Prepare type hierarchy at {} line {} char {}",
                position.text_document.uri, position.position.line, position.position.character
            );
            self.hierarchy
                .prepare(&scope, &position.text_document.uri, position.position)
        }))
    }

    async fn supertypes(
        &self,
        params: TypeHierarchySupertypesParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        let scope = RequestScope::new(&self.state, "typeHierarchy/supertypes");

        Ok(scope.span().in_scope(|| {
            debug!("Supertypes of {}", params.item.name);
            self.hierarchy.supertypes(&scope, &params.item)
        }))
    }

    async fn subtypes(
        &self,
        params: TypeHierarchySubtypesParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        let scope = RequestScope::new(&self.state, "typeHierarchy/subtypes");

        Ok(scope.span().in_scope(|| {
            debug!("Subtypes of {}", params.item.name);
            self.hierarchy.subtypes(&scope, &params.item)
        }))
    }
}

/// Forwards reload results to the client's log, filtered by the configured
/// log level.
pub struct ClientLogObserver {
    client: Client,
}

impl ClientLogObserver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ReloadObserver for ClientLogObserver {
    fn reload_finished(&self, state: &ServerState, outcome: &ReloadOutcome) {
        let (level, typ, message) = match outcome {
            ReloadOutcome::Loaded { projects, elapsed } => (
                LogLevel::Info,
                MessageType::INFO,
                format!("Loaded {} projects in {:?}", projects, elapsed),
            ),
            ReloadOutcome::Failed(err) => (
                LogLevel::Warning,
                MessageType::WARNING,
                format!("Failed to load solution: {}", err),
            ),
        };

        if !state.settings.log_level.allows(level) {
            return;
        }

        let client = self.client.clone();
        tokio::spawn(async move {
            client.log_message(typ, message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(path: &str, typ: FileChangeType) -> FileEvent {
        FileEvent {
            uri: Url::from_file_path(path).unwrap(),
            typ,
        }
    }

    #[test]
    fn test_manifest_changes_affect_model() {
        assert!(affects_model(&event("/ws/App.trlproj", FileChangeType::CHANGED)));
        assert!(affects_model(&event("/ws/App.trlsln", FileChangeType::DELETED)));
    }

    #[test]
    fn test_source_edits_do_not_affect_model() {
        assert!(!affects_model(&event("/ws/src/a.trl", FileChangeType::CHANGED)));
        assert!(affects_model(&event("/ws/src/a.trl", FileChangeType::CREATED)));
        assert!(affects_model(&event("/ws/src/a.trl", FileChangeType::DELETED)));
        assert!(!affects_model(&event("/ws/README.md", FileChangeType::CREATED)));
    }

    #[test]
    #[allow(deprecated)]
    fn test_root_path_precedence() {
        let mut params = InitializeParams {
            root_path: Some("/legacy".to_string()),
            ..InitializeParams::default()
        };
        assert_eq!(root_path(&params), Some(PathBuf::from("/legacy")));

        params.workspace_folders = Some(vec![WorkspaceFolder {
            uri: Url::parse("file:///folder").unwrap(),
            name: "folder".to_string(),
        }]);
        assert_eq!(root_path(&params), Some(PathBuf::from("/folder")));

        params.root_uri = Some(Url::parse("file:///root/./ws").unwrap());
        assert_eq!(root_path(&params), Some(PathBuf::from("/root/ws")));

        assert_eq!(root_path(&InitializeParams::default()), None);
    }
}
