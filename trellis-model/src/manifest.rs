//! Manifest Formats
//!
//! Serde shapes of the solution (`*.trlsln`) and project (`*.trlproj`)
//! manifests. Paths inside a manifest are relative to the manifest's
//! directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::symbol::{SpecialType, SymbolKind, TextRange};

/// A solution: an ordered list of project manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionManifest {
    pub projects: Vec<PathBuf>,
}

/// A project: its documents and the type declarations indexed from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    pub name: String,
    #[serde(default)]
    pub documents: Vec<PathBuf>,
    #[serde(default)]
    pub types: Vec<TypeEntry>,
}

/// One declared type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeEntry {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialType>,
    /// Qualified name of the direct base type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Qualified names of directly implemented or extended interfaces.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub locations: Vec<LocationEntry>,
    #[serde(default)]
    pub members: Vec<MemberEntry>,
}

/// A member declared inside a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub locations: Vec<LocationEntry>,
}

/// A declaration span inside one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEntry {
    pub file: PathBuf,
    pub range: TextRange,
    /// Span of the identifier; the whole range when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_range: Option<TextRange>,
}
