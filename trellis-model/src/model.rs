//! Project Model
//!
//! The query surface the language server runs against, plus the
//! arena-backed [`SolutionModel`] produced by the manifest loader.
//!
//! A published model is immutable. Reloading builds a new model instead of
//! mutating the old one, so readers holding an older `Arc` keep a valid view.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::symbol::{
    Document, ProjectId, SourceLocation, SpecialType, Symbol, SymbolId, SymbolKind, TextPosition,
};

/// Queries answered by a loaded project model.
///
/// Relationship queries are direct (one hierarchy level) and return symbols
/// in a stable order chosen by the implementation.
pub trait ProjectModel: Send + Sync + fmt::Debug {
    /// Looks up a source document by absolute path.
    fn document(&self, path: &Path) -> Option<Document>;

    /// Resolves the declaration whose identifier is at `position` in
    /// `document`. Positions in a declaration body resolve to nothing.
    fn symbol_at(&self, document: &Document, position: TextPosition) -> Option<SymbolId>;

    /// Returns the declaration record for `id`.
    fn symbol(&self, id: SymbolId) -> Option<&Symbol>;

    /// Returns the source locations of `id` as seen from `project`.
    ///
    /// Metadata-only symbols have no locations.
    fn symbol_locations(&self, project: ProjectId, id: SymbolId) -> Vec<SourceLocation>;

    /// Classes whose base type is `id`.
    fn derived_classes(&self, id: SymbolId) -> Vec<SymbolId>;

    /// Interfaces that extend `id`.
    fn derived_interfaces(&self, id: SymbolId) -> Vec<SymbolId>;

    /// Non-interface types that list `id` among their interfaces.
    fn implementations(&self, id: SymbolId) -> Vec<SymbolId>;

    /// Number of loaded projects.
    fn project_count(&self) -> usize;
}

/// A project inside a solution.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Path of the project manifest.
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Default)]
struct DerivedTypes {
    classes: Vec<SymbolId>,
    interfaces: Vec<SymbolId>,
    implementations: Vec<SymbolId>,
}

/// An in-memory model of every project in a solution.
#[derive(Debug, Default)]
pub struct SolutionModel {
    projects: Vec<Project>,
    symbols: Vec<Symbol>,
    documents: HashMap<PathBuf, Document>,
    /// Symbols with at least one location in a file, in declaration order.
    declarations: HashMap<PathBuf, Vec<SymbolId>>,
    derived: HashMap<SymbolId, DerivedTypes>,
}

impl SolutionModel {
    /// Creates a model with no projects.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns all projects in solution order.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Returns all symbols in declaration order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Finds a symbol by its namespace-qualified name.
    pub fn find_by_name(&self, full_name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .find(|s| s.kind.is_named_type() && s.full_name() == full_name)
            .map(|s| s.id)
    }

    fn derived(&self, id: SymbolId) -> Option<&DerivedTypes> {
        self.derived.get(&id)
    }
}

impl ProjectModel for SolutionModel {
    fn document(&self, path: &Path) -> Option<Document> {
        self.documents.get(path).cloned()
    }

    fn symbol_at(&self, document: &Document, position: TextPosition) -> Option<SymbolId> {
        let candidates = self.declarations.get(&document.path)?;

        // Locations without a name range fall back to the whole declaration,
        // so nested ones can overlap; the innermost wins.
        candidates
            .iter()
            .flat_map(|&id| {
                self.symbols[id.index()]
                    .locations
                    .iter()
                    .filter(|loc| loc.path == document.path && loc.name_range.contains(position))
                    .map(move |loc| (id, loc.name_range))
            })
            .max_by(|(_, a), (_, b)| a.start.cmp(&b.start).then(b.end.cmp(&a.end)))
            .map(|(id, _)| id)
    }

    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    fn symbol_locations(&self, _project: ProjectId, id: SymbolId) -> Vec<SourceLocation> {
        // Every project of a solution sees source declarations of the others.
        self.symbol(id)
            .map(|s| s.locations.clone())
            .unwrap_or_default()
    }

    fn derived_classes(&self, id: SymbolId) -> Vec<SymbolId> {
        self.derived(id).map(|d| d.classes.clone()).unwrap_or_default()
    }

    fn derived_interfaces(&self, id: SymbolId) -> Vec<SymbolId> {
        self.derived(id)
            .map(|d| d.interfaces.clone())
            .unwrap_or_default()
    }

    fn implementations(&self, id: SymbolId) -> Vec<SymbolId> {
        self.derived(id)
            .map(|d| d.implementations.clone())
            .unwrap_or_default()
    }

    fn project_count(&self) -> usize {
        self.projects.len()
    }
}

/// A declaration to add to a [`SolutionModelBuilder`].
#[derive(Debug, Clone)]
pub struct SymbolDecl {
    pub name: String,
    pub namespace: String,
    pub kind: SymbolKind,
    pub special: Option<SpecialType>,
    pub locations: Vec<SourceLocation>,
    pub container: Option<SymbolId>,
}

impl SymbolDecl {
    /// Creates a declaration with no locations in the global namespace.
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            kind,
            special: None,
            locations: Vec::new(),
            container: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn special(mut self, special: SpecialType) -> Self {
        self.special = Some(special);
        self
    }

    pub fn located(mut self, location: SourceLocation) -> Self {
        self.locations.push(location);
        self
    }

    pub fn member_of(mut self, container: SymbolId) -> Self {
        self.container = Some(container);
        self
    }
}

/// Incrementally assembles a [`SolutionModel`].
#[derive(Debug, Default)]
pub struct SolutionModelBuilder {
    model: SolutionModel,
}

impl SolutionModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project and returns its id.
    pub fn add_project(&mut self, name: impl Into<String>, manifest: impl Into<PathBuf>) -> ProjectId {
        let id = ProjectId::new(self.model.projects.len());
        self.model.projects.push(Project {
            id,
            name: name.into(),
            manifest: manifest.into(),
        });
        id
    }

    /// Registers a source document. The first project to claim a path owns it.
    pub fn add_document(&mut self, project: ProjectId, path: impl Into<PathBuf>) {
        let path = path.into();
        self.model
            .documents
            .entry(path.clone())
            .or_insert(Document { path, project });
    }

    /// Adds a declaration and returns its id.
    ///
    /// Files named by the declaration's locations are registered as documents
    /// of `project` if nobody claimed them yet.
    pub fn add_symbol(&mut self, project: ProjectId, decl: SymbolDecl) -> SymbolId {
        let id = SymbolId::new(self.model.symbols.len());
        for location in &decl.locations {
            self.add_document(project, location.path.clone());
            let declared = self
                .model
                .declarations
                .entry(location.path.clone())
                .or_default();
            if declared.last() != Some(&id) {
                declared.push(id);
            }
        }

        self.model.symbols.push(Symbol {
            id,
            project,
            name: decl.name,
            namespace: decl.namespace,
            kind: decl.kind,
            special: decl.special,
            base: None,
            interfaces: Vec::new(),
            locations: decl.locations,
            container: decl.container,
        });
        id
    }

    /// Records the direct base type of `id`.
    pub fn set_base(&mut self, id: SymbolId, base: SymbolId) {
        if let Some(symbol) = self.model.symbols.get_mut(id.index()) {
            symbol.base = Some(base);
        }
    }

    /// Appends a directly implemented or extended interface of `id`.
    pub fn add_interface(&mut self, id: SymbolId, interface: SymbolId) {
        if let Some(symbol) = self.model.symbols.get_mut(id.index()) {
            symbol.interfaces.push(interface);
        }
    }

    /// Computes the reverse relations and returns the finished model.
    pub fn build(mut self) -> SolutionModel {
        let mut derived: HashMap<SymbolId, DerivedTypes> = HashMap::new();

        for symbol in &self.model.symbols {
            if symbol.kind == SymbolKind::Class {
                if let Some(base) = symbol.base {
                    derived.entry(base).or_default().classes.push(symbol.id);
                }
            }

            for &interface in &symbol.interfaces {
                let entry = derived.entry(interface).or_default();
                if symbol.kind == SymbolKind::Interface {
                    entry.interfaces.push(symbol.id);
                } else if symbol.kind.is_named_type() {
                    entry.implementations.push(symbol.id);
                }
            }
        }

        self.model.derived = derived;
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::TextRange;

    fn loc(path: &str, start: (u32, u32), end: (u32, u32)) -> SourceLocation {
        let range = TextRange::new(
            TextPosition::new(start.0, start.1),
            TextPosition::new(end.0, end.1),
        );
        SourceLocation {
            path: PathBuf::from(path),
            range,
            name_range: range,
        }
    }

    /// A declaration spanning `lines` whose name sits on its first line.
    fn named(path: &str, lines: (u32, u32), name: (u32, u32)) -> SourceLocation {
        SourceLocation {
            path: PathBuf::from(path),
            range: TextRange::new(TextPosition::new(lines.0, 0), TextPosition::new(lines.1, 1)),
            name_range: TextRange::new(
                TextPosition::new(lines.0, name.0),
                TextPosition::new(lines.0, name.1),
            ),
        }
    }

    #[test]
    fn test_symbol_at_resolves_identifiers_only() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("App", "/ws/App.trlproj");
        let shape = builder.add_symbol(
            project,
            SymbolDecl::new("ShapeBase", SymbolKind::Class)
                .located(named("/ws/a.trl", (10, 20), (13, 22))),
        );
        let area = builder.add_symbol(
            project,
            SymbolDecl::new("Area", SymbolKind::Method)
                .located(named("/ws/a.trl", (12, 14), (15, 19)))
                .member_of(shape),
        );
        let model = builder.build();
        let doc = model.document(Path::new("/ws/a.trl")).unwrap();

        assert_eq!(model.symbol_at(&doc, TextPosition::new(10, 13)), Some(shape));
        assert_eq!(model.symbol_at(&doc, TextPosition::new(10, 21)), Some(shape));
        assert_eq!(model.symbol_at(&doc, TextPosition::new(12, 15)), Some(area));

        // Keyword, blank line in the body, and the end of the identifier.
        assert_eq!(model.symbol_at(&doc, TextPosition::new(10, 2)), None);
        assert_eq!(model.symbol_at(&doc, TextPosition::new(16, 0)), None);
        assert_eq!(model.symbol_at(&doc, TextPosition::new(10, 22)), None);
    }

    #[test]
    fn test_symbol_at_without_name_range_prefers_innermost() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("App", "/ws/App.trlproj");
        let outer = builder.add_symbol(
            project,
            SymbolDecl::new("Outer", SymbolKind::Class).located(loc("/ws/a.trl", (0, 0), (20, 1))),
        );
        let inner = builder.add_symbol(
            project,
            SymbolDecl::new("Inner", SymbolKind::Class).located(loc("/ws/a.trl", (4, 4), (8, 5))),
        );
        let model = builder.build();
        let doc = model.document(Path::new("/ws/a.trl")).unwrap();

        assert_eq!(model.symbol_at(&doc, TextPosition::new(6, 0)), Some(inner));
        assert_eq!(model.symbol_at(&doc, TextPosition::new(12, 0)), Some(outer));
        assert_eq!(model.symbol_at(&doc, TextPosition::new(20, 1)), None);
        assert_eq!(model.symbol_at(&doc, TextPosition::new(30, 0)), None);
    }

    #[test]
    fn test_reverse_relations() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("App", "/ws/App.trlproj");
        let shape = builder.add_symbol(project, SymbolDecl::new("IShape", SymbolKind::Interface));
        let solid = builder.add_symbol(project, SymbolDecl::new("ISolid", SymbolKind::Interface));
        let base = builder.add_symbol(project, SymbolDecl::new("ShapeBase", SymbolKind::Class));
        let circle = builder.add_symbol(project, SymbolDecl::new("Circle", SymbolKind::Class));
        let point = builder.add_symbol(project, SymbolDecl::new("Point", SymbolKind::Struct));
        builder.add_interface(solid, shape);
        builder.add_interface(base, shape);
        builder.add_interface(point, shape);
        builder.set_base(circle, base);
        let model = builder.build();

        assert_eq!(model.derived_interfaces(shape), vec![solid]);
        assert_eq!(model.implementations(shape), vec![base, point]);
        assert_eq!(model.derived_classes(base), vec![circle]);
        assert!(model.derived_classes(circle).is_empty());
    }

    #[test]
    fn test_find_by_name_skips_members() {
        let mut builder = SolutionModelBuilder::new();
        let project = builder.add_project("App", "/ws/App.trlproj");
        let widget = builder.add_symbol(
            project,
            SymbolDecl::new("Widget", SymbolKind::Class).in_namespace("App"),
        );
        builder.add_symbol(
            project,
            SymbolDecl::new("Widget", SymbolKind::Method)
                .in_namespace("App")
                .member_of(widget),
        );
        let model = builder.build();

        assert_eq!(model.find_by_name("App.Widget"), Some(widget));
        assert_eq!(model.find_by_name("Widget"), None);
    }
}
