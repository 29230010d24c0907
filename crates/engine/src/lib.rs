//! Code Index Query Engine
//!
//! Search, reference resolution and dependency analysis over the modules of a
//! loaded project graph. Every operation fans out one task per module.

pub mod dependencies;
pub mod fanout;
pub mod references;
pub mod search;

// Re-export main types
pub use dependencies::{
    Dependency, DependencyAnalysis, DependencyAnalyzer, DependencyKind, NamespaceUsage,
};
pub use fanout::{fan_out, Gathered, UnitFailure};
pub use references::{ReferenceKind, ReferenceResolver, ReferenceResult};
pub use search::{SearchEngine, SearchOptions, SearchResult, WildcardPattern};

use codeindex_core::{IndexConfig, SharedProvider};

/// Main engine that combines all query functionality
pub struct Engine {
    search_engine: SearchEngine,
    reference_resolver: ReferenceResolver,
    dependency_analyzer: DependencyAnalyzer,
}

impl Engine {
    /// Create a new engine over a provider
    pub fn new(provider: SharedProvider, config: &IndexConfig) -> Self {
        Self {
            search_engine: SearchEngine::new(provider.clone()),
            reference_resolver: ReferenceResolver::new(provider.clone())
                .with_context_lines(config.context_lines),
            dependency_analyzer: DependencyAnalyzer::new(provider)
                .with_platform_namespaces(config.platform_namespaces.clone()),
        }
    }

    /// Get a reference to the search engine
    pub fn search(&self) -> &SearchEngine {
        &self.search_engine
    }

    /// Get a reference to the reference resolver
    pub fn references(&self) -> &ReferenceResolver {
        &self.reference_resolver
    }

    /// Get a reference to the dependency analyzer
    pub fn dependencies(&self) -> &DependencyAnalyzer {
        &self.dependency_analyzer
    }
}
