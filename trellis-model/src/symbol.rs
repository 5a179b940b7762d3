//! Symbols and Source Spans
//!
//! Identity handles and declaration records stored in a project model.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity of one declaration inside a model.
///
/// Two ids are equal only when they name the same declaration; two types
/// with the same name in different projects get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the arena index of this symbol.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a project inside a loaded solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(u32);

impl ProjectId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the arena index of this project.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
    Method,
    Property,
    Field,
}

impl SymbolKind {
    /// Returns true for kinds that take part in a type hierarchy.
    pub fn is_named_type(self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Interface
                | SymbolKind::Struct
                | SymbolKind::Enum
                | SymbolKind::Delegate
        )
    }
}

/// Special designation carried by the roots of the type system.
///
/// A type with a special designation is never reported as somebody's
/// supertype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialType {
    /// The universal root every class derives from.
    Object,
    /// Implicit base of all structs.
    ValueType,
    /// Implicit base of all enums.
    Enum,
}

/// A zero-based line/character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TextPosition {
    pub line: u32,
    pub character: u32,
}

impl TextPosition {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A span between two positions. The end is exclusive, as in LSP ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextRange {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        Self { start, end }
    }

    /// Returns true if `position` falls inside this range.
    pub fn contains(&self, position: TextPosition) -> bool {
        self.start <= position && position < self.end
    }
}

/// Where a symbol is declared in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Absolute path of the declaring file.
    pub path: PathBuf,
    /// The whole declaration.
    pub range: TextRange,
    /// The declared identifier.
    pub name_range: TextRange,
}

/// A declaration in the model.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub project: ProjectId,
    pub name: String,
    /// Dotted namespace, empty for the global namespace.
    pub namespace: String,
    pub kind: SymbolKind,
    pub special: Option<SpecialType>,
    /// Direct base type, if declared.
    pub base: Option<SymbolId>,
    /// Directly implemented or extended interfaces, in declaration order.
    pub interfaces: Vec<SymbolId>,
    /// Source locations; empty for metadata-only symbols.
    pub locations: Vec<SourceLocation>,
    /// Enclosing type for members.
    pub container: Option<SymbolId>,
}

impl Symbol {
    /// Returns the namespace-qualified name.
    pub fn full_name(&self) -> String {
        qualified_name(&self.namespace, &self.name)
    }
}

/// Joins a namespace and a simple name.
pub fn qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// A source document known to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub project: ProjectId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_excludes_end() {
        let range = TextRange::new(TextPosition::new(2, 4), TextPosition::new(5, 1));

        assert!(range.contains(TextPosition::new(2, 4)));
        assert!(range.contains(TextPosition::new(3, 0)));
        assert!(range.contains(TextPosition::new(5, 0)));
        assert!(!range.contains(TextPosition::new(5, 1)));
        assert!(!range.contains(TextPosition::new(2, 3)));
    }

    #[test]
    fn test_empty_range_contains_nothing() {
        let at = TextPosition::new(3, 3);
        assert!(!TextRange::new(at, at).contains(at));
    }

    #[test]
    fn test_named_type_kinds() {
        assert!(SymbolKind::Class.is_named_type());
        assert!(SymbolKind::Delegate.is_named_type());
        assert!(!SymbolKind::Method.is_named_type());
        assert!(!SymbolKind::Field.is_named_type());
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("", "Widget"), "Widget");
        assert_eq!(qualified_name("App.Ui", "Widget"), "App.Ui.Widget");
    }
}
