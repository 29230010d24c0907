use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Namespace,
    Type,
    Method,
    Property,
    Field,
    Event,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 6] = [
        SymbolKind::Namespace,
        SymbolKind::Type,
        SymbolKind::Method,
        SymbolKind::Property,
        SymbolKind::Field,
        SymbolKind::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type => "type",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Event => "event",
        }
    }

    /// Members live inside a type declaration.
    pub fn is_member(self) -> bool {
        matches!(
            self,
            SymbolKind::Method | SymbolKind::Property | SymbolKind::Field | SymbolKind::Event
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymbolKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown symbol kind `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    Record,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Accessibility {
    #[default]
    Public,
    Internal,
    Protected,
    ProtectedInternal,
    PrivateProtected,
    Private,
}

impl Accessibility {
    pub fn is_public(self) -> bool {
        self == Accessibility::Public
    }

    pub fn is_internal(self) -> bool {
        self == Accessibility::Internal
    }
}

/// Zero-based line/character position, as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn at_line(line: u32, character: u32, len: u32) -> Self {
        Self {
            start: Position { line, character },
            end: Position {
                line,
                character: character + len,
            },
        }
    }
}

/// A span inside one source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub file: PathBuf,
    pub range: Range,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, range: Range) -> Self {
        Self {
            file: file.into(),
            range,
        }
    }

    /// One-based line number for display.
    pub fn line(&self) -> u32 {
        self.range.start.line + 1
    }

    /// One-based column for display.
    pub fn column(&self) -> u32 {
        self.range.start.character + 1
    }
}

/// Stable identity of a declared symbol, assigned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declared entity as the provider's symbol model describes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolInfo {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Declaration sites. Partial declarations have more than one.
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

impl SymbolInfo {
    pub fn primary_location(&self) -> Option<&Location> {
        self.locations.first()
    }

    /// Short signature summary: the signature if known, else the first
    /// non-empty documentation line.
    pub fn summary(&self) -> Option<String> {
        if let Some(signature) = &self.signature {
            return Some(signature.clone());
        }
        self.documentation.as_deref().and_then(|doc| {
            doc.lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespaceDecl {
    pub info: SymbolInfo,
    #[serde(default)]
    pub namespaces: Vec<NamespaceDecl>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl NamespaceDecl {
    /// The unnamed root namespace of a compilation.
    pub fn global() -> Self {
        Self {
            info: SymbolInfo {
                id: SymbolId::new("N:<global>"),
                name: String::new(),
                kind: SymbolKind::Namespace,
                accessibility: Accessibility::Public,
                locations: Vec::new(),
                signature: None,
                documentation: None,
            },
            namespaces: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.info.name.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeDecl {
    pub info: SymbolInfo,
    pub type_kind: TypeKind,
    /// Members in provider-declared order.
    #[serde(default)]
    pub members: Vec<SymbolInfo>,
    #[serde(default)]
    pub nested_types: Vec<TypeDecl>,
}

/// A usage site of a symbol somewhere in the project graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolUsage {
    pub symbol: SymbolId,
    pub location: Location,
}

/// Symbol model of one compilable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Compilation {
    pub module: String,
    pub global_namespace: NamespaceDecl,
    #[serde(default)]
    pub usages: Vec<SymbolUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Other modules of the same graph this module references.
    #[serde(default)]
    pub module_references: Vec<String>,
    /// Prebuilt binaries this module references.
    #[serde(default)]
    pub external_references: Vec<String>,
}

/// A loaded project graph. Immutable once loaded; reloads replace it whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectGraph {
    pub path: PathBuf,
    pub modules: Vec<ModuleInfo>,
}

impl ProjectGraph {
    pub fn new(path: impl Into<PathBuf>, modules: Vec<ModuleInfo>) -> Self {
        Self {
            path: path.into(),
            modules,
        }
    }

    /// Display name, taken from the graph file's stem.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn module_of_file(&self, file: &Path) -> Option<&ModuleInfo> {
        self.modules
            .iter()
            .find(|module| module.files.iter().any(|f| f == file))
    }

    /// Every source file in module order, first occurrence wins.
    pub fn all_files(&self) -> Vec<PathBuf> {
        let mut seen = std::collections::HashSet::new();
        self.modules
            .iter()
            .flat_map(|module| module.files.iter())
            .filter(|file| seen.insert(file.as_path()))
            .cloned()
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.all_files().len()
    }
}

/// A flat, indexable record for one declared symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SymbolRecord {
    pub name: String,
    pub full_name: String,
    pub kind: SymbolKind,
    pub accessibility: Accessibility,
    pub namespace: String,
    pub module: String,
    pub file: Option<PathBuf>,
    /// One-based; zero when the symbol has no source location.
    pub line: u32,
    pub summary: Option<String>,
}
