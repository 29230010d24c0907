//! Tool invocation boundary.
//!
//! Each tool takes a small parameter record and answers with a structured
//! response or a [`ToolError`]; errors never carry absolute paths.

use crate::incremental::AnalysisResult;
use crate::service::IndexService;
use codeindex_core::{rank_findings, ComplexityFinding, ErrorKind, IndexError, KindFilter, SymbolKind};
use codeindex_engine::{
    DependencyAnalysis, Gathered, ReferenceResult, SearchOptions, SearchResult, UnitFailure,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl AsRef<str>) -> Self {
        Self {
            kind,
            message: redact_paths(message.as_ref()),
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<IndexError> for ToolError {
    fn from(err: IndexError) -> Self {
        ToolError::new(err.kind(), err.to_string())
    }
}

static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[\s'"(\[=])((?:[A-Za-z]:[\\/]|/)[^\s:;,'"`()\[\]{}]+)"#)
        .expect("path pattern is a valid regex")
});

/// Replace every absolute path in `message` with its final component.
pub fn redact_paths(message: &str) -> String {
    PATH_PATTERN
        .replace_all(message, |caps: &regex::Captures<'_>| {
            let name = caps[2]
                .rsplit(|c| c == '/' || c == '\\')
                .find(|segment| !segment.is_empty())
                .unwrap_or("");
            format!("{}{}", &caps[1], name)
        })
        .into_owned()
}

/// A tool answer: the data plus contained partial failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ToolError>,
}

impl<T> ToolResponse<T> {
    fn new(data: T, failures: Vec<UnitFailure>) -> Self {
        let warnings = failures
            .into_iter()
            .map(|failure| {
                ToolError::new(
                    ErrorKind::PartialAnalysisFailure,
                    format!("{} skipped: {}", failure.unit, failure.message),
                )
            })
            .collect();
        Self { data, warnings }
    }
}

impl<T> From<Gathered<T>> for ToolResponse<Vec<T>> {
    fn from(gathered: Gathered<T>) -> Self {
        ToolResponse::new(gathered.items, gathered.failures)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSymbolsParams {
    pub solution_path: PathBuf,
    pub pattern: String,
    #[serde(default)]
    pub kinds: Option<Vec<SymbolKind>>,
    #[serde(default = "default_true")]
    pub ignore_case: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindReferencesParams {
    pub solution_path: PathBuf,
    pub symbol_name: String,
    #[serde(default)]
    pub include_definition: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeDependenciesParams {
    pub solution_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeCodeComplexityParams {
    pub solution_path: PathBuf,
    #[serde(default)]
    pub threshold: Option<u32>,
    /// Restrict the analysis to one file of the graph.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeChangesParams {
    pub solution_path: PathBuf,
    #[serde(default)]
    pub changed_files: Option<Vec<PathBuf>>,
}

pub type ToolResult<T> = std::result::Result<ToolResponse<T>, ToolError>;

/// The remotely callable operations, by name.
pub const TOOL_NAMES: [&str; 5] = [
    "SearchSymbols",
    "FindReferences",
    "AnalyzeDependencies",
    "AnalyzeCodeComplexity",
    "AnalyzeChanges",
];

pub struct Tools {
    service: Arc<IndexService>,
}

impl Tools {
    pub fn new(service: Arc<IndexService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<IndexService> {
        &self.service
    }

    pub async fn search_symbols(&self, params: SearchSymbolsParams) -> ToolResult<Vec<SearchResult>> {
        let options = SearchOptions {
            kinds: params
                .kinds
                .map(|kinds| kinds.into_iter().collect())
                .unwrap_or_else(KindFilter::all),
            ignore_case: params.ignore_case,
            limit: params.limit,
        };
        if options.kinds.is_empty() {
            return Err(ToolError::new(ErrorKind::InvalidInput, "no symbol kinds selected"));
        }
        let gathered = self
            .service
            .search(&params.solution_path, &params.pattern, &options)
            .await?;
        Ok(gathered.into())
    }

    pub async fn find_references(
        &self,
        params: FindReferencesParams,
    ) -> ToolResult<Vec<ReferenceResult>> {
        let gathered = self
            .service
            .find_references(
                &params.solution_path,
                &params.symbol_name,
                params.include_definition,
            )
            .await?;
        Ok(gathered.into())
    }

    pub async fn analyze_dependencies(
        &self,
        params: AnalyzeDependenciesParams,
    ) -> ToolResult<DependencyAnalysis> {
        let mut analysis = self
            .service
            .analyze_dependencies(&params.solution_path)
            .await?;
        let failures = std::mem::take(&mut analysis.failures);
        Ok(ToolResponse::new(analysis, failures))
    }

    /// Findings ranked by descending complexity.
    pub async fn analyze_code_complexity(
        &self,
        params: AnalyzeCodeComplexityParams,
    ) -> ToolResult<Vec<ComplexityFinding>> {
        let threshold = params
            .threshold
            .unwrap_or(self.service.config().default_complexity_threshold);
        let mut gathered = match &params.file {
            Some(file) => {
                self.service
                    .analyze_file_complexity(&params.solution_path, file, threshold)
                    .await?
            }
            None => {
                self.service
                    .analyze_complexity(&params.solution_path, threshold)
                    .await?
            }
        };
        rank_findings(&mut gathered.items);
        Ok(gathered.into())
    }

    pub async fn analyze_changes(&self, params: AnalyzeChangesParams) -> ToolResult<AnalysisResult> {
        let mut result = self
            .service
            .analyze(&params.solution_path, params.changed_files.as_deref())
            .await?;
        let failures = std::mem::take(&mut result.failures);
        Ok(ToolResponse::new(result, failures))
    }

    /// Dispatch a tool call given as JSON and answer with JSON.
    pub async fn invoke(&self, tool: &str, params: Value) -> std::result::Result<Value, ToolError> {
        match tool {
            "SearchSymbols" => encode(self.search_symbols(decode(params)?).await?),
            "FindReferences" => encode(self.find_references(decode(params)?).await?),
            "AnalyzeDependencies" => encode(self.analyze_dependencies(decode(params)?).await?),
            "AnalyzeCodeComplexity" => encode(self.analyze_code_complexity(decode(params)?).await?),
            "AnalyzeChanges" => encode(self.analyze_changes(decode(params)?).await?),
            other => Err(ToolError::new(
                ErrorKind::InvalidInput,
                format!("unknown tool `{other}`"),
            )),
        }
    }
}

fn decode<P: DeserializeOwned>(params: Value) -> std::result::Result<P, ToolError> {
    serde_json::from_value(params)
        .map_err(|e| ToolError::new(ErrorKind::InvalidInput, format!("invalid parameters: {e}")))
}

fn encode<T: Serialize>(response: ToolResponse<T>) -> std::result::Result<Value, ToolError> {
    serde_json::to_value(response)
        .map_err(|e| ToolError::new(ErrorKind::InvalidInput, format!("cannot encode result: {e}")))
}
