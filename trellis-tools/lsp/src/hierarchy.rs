//! Type Hierarchy
//!
//! Computes `textDocument/prepareTypeHierarchy`, `typeHierarchy/supertypes`
//! and `typeHierarchy/subtypes` results over a [`RequestScope`].
//!
//! Every result is the flattened product of symbols and their source
//! locations, in the order the model reports symbols and then the order of
//! each symbol's locations. Nothing is sorted or deduplicated.

use tower_lsp::lsp_types::{Position, SymbolKind as LspSymbolKind, TypeHierarchyItem, Url};
use tracing::debug;
use trellis_model::{Document, ProjectId, Symbol, SymbolId, SymbolKind};

use crate::scope::RequestScope;

/// Type hierarchy provider.
pub struct HierarchyResolver;

impl HierarchyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Items for the named type declared at `position`.
    ///
    /// Returns `None` when the position holds no declaration or a declaration
    /// that is not a named type.
    pub fn prepare(
        &self,
        scope: &RequestScope,
        uri: &Url,
        position: Position,
    ) -> Option<Vec<TypeHierarchyItem>> {
        let document = scope.document_for_uri(uri)?;
        let id = scope.symbol_at(&document, position)?;
        let symbol = scope.symbol(id)?;

        if !symbol.kind.is_named_type() {
            debug!("{} is a {:?}, not a type", symbol.name, symbol.kind);
            return None;
        }

        Some(self.items(scope, document.project, &[id]))
    }

    /// Direct base type (unless it is a special root) followed by the
    /// directly implemented or extended interfaces.
    pub fn supertypes(
        &self,
        scope: &RequestScope,
        item: &TypeHierarchyItem,
    ) -> Option<Vec<TypeHierarchyItem>> {
        let (document, id) = self.resolve_item(scope, item)?;
        let symbol = scope.symbol(id)?;

        let base = symbol
            .base
            .filter(|&base| scope.symbol(base).is_some_and(|b| b.special.is_none()));

        let supertypes: Vec<SymbolId> = base
            .into_iter()
            .chain(symbol.interfaces.iter().copied())
            .collect();

        debug!("{} has {} direct supertypes", symbol.name, supertypes.len());
        Some(self.items(scope, document.project, &supertypes))
    }

    /// Derived classes, then derived interfaces, then implementing types.
    pub fn subtypes(
        &self,
        scope: &RequestScope,
        item: &TypeHierarchyItem,
    ) -> Option<Vec<TypeHierarchyItem>> {
        let (document, id) = self.resolve_item(scope, item)?;
        let model = scope.model();

        let mut subtypes = model.derived_classes(id);
        subtypes.extend(model.derived_interfaces(id));
        subtypes.extend(model.implementations(id));

        debug!("{} has {} direct subtypes", id, subtypes.len());
        Some(self.items(scope, document.project, &subtypes))
    }

    /// Finds the symbol an item was built from, by its name position.
    fn resolve_item(
        &self,
        scope: &RequestScope,
        item: &TypeHierarchyItem,
    ) -> Option<(Document, SymbolId)> {
        let document = scope.document_for_uri(&item.uri)?;
        let id = scope.symbol_at(&document, item.selection_range.start)?;
        Some((document, id))
    }

    fn items(
        &self,
        scope: &RequestScope,
        project: ProjectId,
        symbols: &[SymbolId],
    ) -> Vec<TypeHierarchyItem> {
        scope
            .resolve_symbol_locations(project, symbols)
            .into_iter()
            .filter_map(|entry| {
                let symbol = scope.symbol(entry.symbol)?;
                Some(TypeHierarchyItem {
                    name: symbol.name.clone(),
                    kind: lsp_kind(symbol),
                    tags: None,
                    detail: detail(symbol),
                    uri: entry.location.uri,
                    range: entry.location.range,
                    selection_range: entry.name_range,
                    data: None,
                })
            })
            .collect()
    }
}

impl Default for HierarchyResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn detail(symbol: &Symbol) -> Option<String> {
    if symbol.namespace.is_empty() {
        None
    } else {
        Some(symbol.namespace.clone())
    }
}

fn lsp_kind(symbol: &Symbol) -> LspSymbolKind {
    match symbol.kind {
        SymbolKind::Class => LspSymbolKind::CLASS,
        SymbolKind::Interface => LspSymbolKind::INTERFACE,
        SymbolKind::Struct => LspSymbolKind::STRUCT,
        SymbolKind::Enum => LspSymbolKind::ENUM,
        SymbolKind::Delegate => LspSymbolKind::FUNCTION,
        SymbolKind::Method => LspSymbolKind::METHOD,
        SymbolKind::Property => LspSymbolKind::PROPERTY,
        SymbolKind::Field => LspSymbolKind::FIELD,
    }
}
