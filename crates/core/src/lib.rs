//! Code Index Core Library
//!
//! Data model, provider contract, symbol index builder and complexity pass
//! shared by the engine and service crates.

pub mod complexity;
pub mod config;
pub mod error;
pub mod graph;
pub mod provider;
pub mod symbol_index;
pub mod syntax;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

// Re-export main types
pub use complexity::{cyclomatic_complexity, rank_findings, ComplexityAnalyzer, ComplexityFinding};
pub use config::{CacheSettings, IndexConfig};
pub use error::{ErrorKind, IndexError, ProviderError, Result};
pub use graph::{
    Accessibility, Compilation, Location, ModuleInfo, NamespaceDecl, Position, ProjectGraph,
    Range, SymbolId, SymbolInfo, SymbolKind, SymbolRecord, SymbolUsage, TypeDecl, TypeKind,
};
pub use provider::{ProjectGraphProvider, SharedProvider};
pub use symbol_index::{extract_declarations, IndexEntry, KindFilter, SymbolIndexer};
pub use syntax::{DeclaredSymbol, FileModel, SemanticModel, SyntaxKind, SyntaxNode, SyntaxTree};
