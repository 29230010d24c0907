//! Incremental code index over project graphs.
//!
//! The member crates split the work: `codeindex-core` holds the data model,
//! provider contract and per-file passes, `codeindex-engine` the module
//! fan-out queries, and `codeindex-service` the caches, incremental analysis
//! and tool boundary.

pub use codeindex_core::{
    ComplexityAnalyzer, ComplexityFinding, ErrorKind, IndexConfig, IndexError, KindFilter,
    ProjectGraph, ProjectGraphProvider, ProviderError, Result, SharedProvider, SymbolKind,
    SymbolRecord,
};

pub use codeindex_engine::{
    DependencyAnalysis, Engine, Gathered, ReferenceResult, SearchOptions, SearchResult,
    UnitFailure,
};

pub use codeindex_service::{
    AnalysisResult, IndexService, ToolError, ToolResponse, Tools, TOOL_NAMES,
};
