//! Code Index Service
//!
//! The long-lived half of the index: project graph and per-file caches,
//! incremental analysis and the tool boundary that remote callers use.

pub mod cache;
pub mod incremental;
pub mod service;
pub mod solution_cache;
pub mod tools;

pub use cache::{CacheManager, CacheStats, DurableLayer, MemoryLayer, SledLayer};
pub use incremental::{AnalysisResult, FileAnalysis, FileAnalysisCache, IncrementalAnalyzer};
pub use service::IndexService;
pub use solution_cache::{normalize_path, SolutionCache, SolutionEntry};
pub use tools::{
    redact_paths, AnalyzeChangesParams, AnalyzeCodeComplexityParams, AnalyzeDependenciesParams,
    FindReferencesParams, SearchSymbolsParams, ToolError, ToolResponse, ToolResult, Tools,
    TOOL_NAMES,
};
