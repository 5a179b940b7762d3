//! Request Scopes
//!
//! A [`RequestScope`] captures the published server state exactly once, when
//! a request arrives, and answers every model query of that request from the
//! captured snapshot. Reloads that land while the request runs are invisible
//! to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tower_lsp::lsp_types::{ClientCapabilities, Location, Position, Range, Url};
use tracing::{debug, Span};
use trellis_model::loader::normalize_path;
use trellis_model::{
    Document, ProjectId, ProjectModel, Symbol, SymbolId, TextPosition, TextRange,
};

use crate::config::Settings;
use crate::state::{ServerState, StateHandle};

static NEXT_CORRELATION_ID: AtomicU64 = AtomicU64::new(1);

/// A symbol paired with one of its source locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLocation {
    pub symbol: SymbolId,
    /// The whole declaration.
    pub location: Location,
    /// The declared identifier inside `location`.
    pub name_range: Range,
}

/// Read-only view of the server state for one request.
#[derive(Debug)]
pub struct RequestScope {
    state: Arc<ServerState>,
    correlation_id: u64,
    span: Span,
}

impl RequestScope {
    /// Captures the current state for a request to `method`.
    pub fn new(handle: &StateHandle, method: &'static str) -> Self {
        Self::from_state(handle.current_state(), method)
    }

    /// Builds a scope over an already captured state.
    pub fn from_state(state: Arc<ServerState>, method: &'static str) -> Self {
        let correlation_id = NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!(
            "request",
            id = correlation_id,
            revision = state.revision,
            method
        );
        Self {
            state,
            correlation_id,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn client_capabilities(&self) -> Option<&ClientCapabilities> {
        self.state.client_capabilities.as_ref()
    }

    /// The model captured with this scope.
    pub fn model(&self) -> &dyn ProjectModel {
        self.state.model.as_ref()
    }

    /// Finds the model document behind a `file:` URI.
    pub fn document_for_uri(&self, uri: &Url) -> Option<Document> {
        if uri.scheme() != "file" {
            debug!("ignoring non-file uri {}", uri);
            return None;
        }
        let path = uri.to_file_path().ok()?;
        self.model().document(&normalize_path(&path))
    }

    pub fn symbol_at(&self, document: &Document, position: Position) -> Option<SymbolId> {
        self.model().symbol_at(document, to_text_position(position))
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.model().symbol(id)
    }

    /// Pairs each symbol with each of its source locations, in input order.
    ///
    /// Metadata-only symbols contribute nothing.
    pub fn resolve_symbol_locations(
        &self,
        project: ProjectId,
        symbols: &[SymbolId],
    ) -> Vec<SymbolLocation> {
        let mut resolved = Vec::new();
        for &symbol in symbols {
            for source in self.model().symbol_locations(project, symbol) {
                let Ok(uri) = Url::from_file_path(&source.path) else {
                    debug!("skipping location with non-url path {}", source.path.display());
                    continue;
                };
                resolved.push(SymbolLocation {
                    symbol,
                    location: Location::new(uri, to_lsp_range(source.range)),
                    name_range: to_lsp_range(source.name_range),
                });
            }
        }
        resolved
    }
}

pub fn to_text_position(position: Position) -> TextPosition {
    TextPosition::new(position.line, position.character)
}

pub fn to_lsp_position(position: TextPosition) -> Position {
    Position::new(position.line, position.character)
}

pub fn to_lsp_range(range: TextRange) -> Range {
    Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::path::PathBuf;
    use trellis_model::{SolutionModelBuilder, SourceLocation, SymbolDecl, SymbolKind};

    fn loc(path: &str, line: u32) -> SourceLocation {
        let range = TextRange::new(TextPosition::new(line, 0), TextPosition::new(line + 2, 1));
        SourceLocation {
            path: PathBuf::from(path),
            range,
            name_range: range,
        }
    }

    fn scope_over(builder: SolutionModelBuilder) -> RequestScope {
        let mut state = ServerState::new(Settings::default());
        state.model = Arc::new(builder.build());
        RequestScope::from_state(Arc::new(state), "test")
    }

    #[test]
    fn test_correlation_ids_increase() {
        let a = scope_over(SolutionModelBuilder::new());
        let b = scope_over(SolutionModelBuilder::new());
        assert!(b.correlation_id() > a.correlation_id());
    }

    #[test]
    fn test_scope_reads_its_snapshot() {
        let mut state = ServerState::new(Settings {
            solution_path: Some(PathBuf::from("/ws/App.trlsln")),
            ..Settings::default()
        });
        state.revision = 7;
        state.client_capabilities = Some(ClientCapabilities::default());
        let scope = RequestScope::from_state(Arc::new(state), "test");

        assert_eq!(scope.revision(), 7);
        assert_eq!(
            scope.settings().solution_path.as_deref(),
            Some(std::path::Path::new("/ws/App.trlsln"))
        );
        assert!(scope.client_capabilities().is_some());
        assert_eq!(scope.model().project_count(), 0);
    }

    #[test]
    fn test_document_for_uri() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("P", "/ws/P.trlproj");
        builder.add_document(project, "/ws/src/a.trl");
        let scope = scope_over(builder);

        let file = Url::parse("file:///ws/src/a.trl").unwrap();
        let dotted = Url::parse("file:///ws/src/../src/a.trl").unwrap();
        let remote = Url::parse("https://example.com/ws/src/a.trl").unwrap();

        assert!(scope.document_for_uri(&file).is_some());
        assert!(scope.document_for_uri(&dotted).is_some());
        assert!(scope.document_for_uri(&remote).is_none());
    }

    #[test]
    fn test_locations_flatten_in_order() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("P", "/ws/P.trlproj");
        let split = builder.add_symbol(
            project,
            SymbolDecl::new("Split", SymbolKind::Class)
                .located(loc("/ws/a.trl", 0))
                .located(loc("/ws/b.trl", 4)),
        );
        let meta = builder.add_symbol(project, SymbolDecl::new("Meta", SymbolKind::Class));
        let single = builder.add_symbol(
            project,
            SymbolDecl::new("Single", SymbolKind::Interface).located(loc("/ws/c.trl", 1)),
        );
        let scope = scope_over(builder);

        let resolved = scope.resolve_symbol_locations(project, &[split, meta, single]);

        let pairs: Vec<(SymbolId, String)> = resolved
            .iter()
            .map(|entry| (entry.symbol, entry.location.uri.path().to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (split, "/ws/a.trl".to_string()),
                (split, "/ws/b.trl".to_string()),
                (single, "/ws/c.trl".to_string()),
            ]
        );
        assert_eq!(resolved[1].location.range.start, Position::new(4, 0));
    }

    #[test]
    fn test_relative_location_is_skipped() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("P", "/ws/P.trlproj");
        let id = builder.add_symbol(
            project,
            SymbolDecl::new("Rel", SymbolKind::Class).located(loc("relative/a.trl", 0)),
        );
        let scope = scope_over(builder);

        assert!(scope.resolve_symbol_locations(project, &[id]).is_empty());
    }
}
