//! Cross-module reference resolution.
//!
//! Every symbol whose name matches the query (case-insensitively) is a
//! target; overloads and same-named types in different modules are resolved
//! together. Declarations are visited first, then usages in module order, so
//! deduplication on `(file, line)` keeps the most informative entry.

use crate::fanout::{fan_out, Gathered};
use codeindex_core::{
    Compilation, IndexError, Location, ProjectGraph, Result, SharedProvider, SymbolId,
    SymbolIndexer, SymbolKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    MethodCall,
    PropertyAccess,
    FieldAccess,
    TypeReference,
    Reference,
}

impl From<SymbolKind> for ReferenceKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Method => ReferenceKind::MethodCall,
            SymbolKind::Property => ReferenceKind::PropertyAccess,
            SymbolKind::Field => ReferenceKind::FieldAccess,
            SymbolKind::Type => ReferenceKind::TypeReference,
            SymbolKind::Namespace | SymbolKind::Event => ReferenceKind::Reference,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceResult {
    pub symbol_name: String,
    pub file: PathBuf,
    pub module: String,
    /// One-based.
    pub line: u32,
    /// One-based.
    pub column: u32,
    pub line_text: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub is_definition: bool,
    pub kind: ReferenceKind,
}

/// A symbol the query resolved to.
#[derive(Debug, Clone)]
struct Target {
    id: SymbolId,
    name: String,
    kind: SymbolKind,
    module: String,
    declarations: Vec<Location>,
}

/// A location before its source text is attached.
#[derive(Debug, Clone)]
struct Candidate {
    target: usize,
    module: String,
    location: Location,
    is_definition: bool,
}

pub struct ReferenceResolver {
    provider: SharedProvider,
    context_lines: usize,
}

impl ReferenceResolver {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            context_lines: 2,
        }
    }

    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    pub async fn find_references(
        &self,
        graph: &Arc<ProjectGraph>,
        symbol_name: &str,
        include_definitions: bool,
    ) -> Result<Gathered<ReferenceResult>> {
        let symbol_name = symbol_name.trim();
        if symbol_name.is_empty() {
            return Err(IndexError::InvalidInput("symbol name is empty".into()));
        }

        let compiled = fan_out(graph, |graph, module| {
            let provider = Arc::clone(&self.provider);
            async move { provider.compile(&graph, &module).await }
        })
        .await;
        let compilations = compiled.items;

        let targets = collect_targets(&compilations, symbol_name);
        if targets.is_empty() {
            if compiled.failures.is_empty() {
                return Err(IndexError::NotFound(format!("symbol `{symbol_name}`")));
            }
            // The symbol may live in a module that failed to compile.
            return Ok(Gathered {
                items: Vec::new(),
                failures: compiled.failures,
            });
        }
        debug!(symbol = symbol_name, targets = targets.len(), "resolved reference targets");

        let candidates = collect_candidates(&targets, &compilations, include_definitions);
        let mut results = self.attach_source(&targets, candidates).await;
        results.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

        info!(
            symbol = symbol_name,
            references = results.len(),
            failed_modules = compiled.failures.len(),
            "reference search finished"
        );
        Ok(Gathered {
            items: results,
            failures: compiled.failures,
        })
    }

    /// Read each file once and cut the reference line plus its context.
    async fn attach_source(
        &self,
        targets: &[Target],
        candidates: Vec<Candidate>,
    ) -> Vec<ReferenceResult> {
        let mut sources: HashMap<PathBuf, Option<Arc<Vec<String>>>> = HashMap::new();
        let mut results = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let file = candidate.location.file.clone();
            if !sources.contains_key(&file) {
                let lines = match self.provider.read_source(&file).await {
                    Ok(text) => Some(Arc::new(text.lines().map(str::to_string).collect())),
                    Err(err) => {
                        warn!(file = %file.display(), error = %err, "source unavailable; context omitted");
                        None
                    }
                };
                sources.insert(file.clone(), lines);
            }

            let (line_text, context_before, context_after) =
                match sources.get(&file).and_then(Option::as_ref) {
                    Some(lines) => {
                        extract_context(lines, candidate.location.range.start.line as usize, self.context_lines)
                    }
                    None => (String::new(), Vec::new(), Vec::new()),
                };

            let target = &targets[candidate.target];
            results.push(ReferenceResult {
                symbol_name: target.name.clone(),
                line: candidate.location.line(),
                column: candidate.location.column(),
                file,
                module: candidate.module,
                line_text,
                context_before,
                context_after,
                is_definition: candidate.is_definition,
                kind: ReferenceKind::from(target.kind),
            });
        }

        results
    }
}

fn collect_targets(compilations: &[Arc<Compilation>], symbol_name: &str) -> Vec<Target> {
    let mut targets = Vec::new();
    let mut seen = HashSet::new();
    for compilation in compilations {
        SymbolIndexer::new(compilation).walk(|entry| {
            if entry.info.name.eq_ignore_ascii_case(symbol_name) && seen.insert(entry.info.id.clone())
            {
                targets.push(Target {
                    id: entry.info.id.clone(),
                    name: entry.info.name.clone(),
                    kind: entry.kind(),
                    module: compilation.module.clone(),
                    declarations: entry.info.locations.clone(),
                });
            }
        });
    }
    targets
}

fn collect_candidates(
    targets: &[Target],
    compilations: &[Arc<Compilation>],
    include_definitions: bool,
) -> Vec<Candidate> {
    let by_id: HashMap<&SymbolId, usize> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| (&target.id, index))
        .collect();

    let mut ordered: Vec<Candidate> = Vec::new();
    for (index, target) in targets.iter().enumerate() {
        for location in &target.declarations {
            ordered.push(Candidate {
                target: index,
                module: target.module.clone(),
                location: location.clone(),
                is_definition: true,
            });
        }
    }
    for compilation in compilations {
        for usage in &compilation.usages {
            let Some(&index) = by_id.get(&usage.symbol) else {
                continue;
            };
            let is_definition = targets[index].declarations.iter().any(|declaration| {
                declaration.file == usage.location.file
                    && declaration.range.start == usage.location.range.start
            });
            ordered.push(Candidate {
                target: index,
                module: compilation.module.clone(),
                location: usage.location.clone(),
                is_definition,
            });
        }
    }

    let mut seen: HashSet<(PathBuf, u32)> = HashSet::new();
    ordered
        .into_iter()
        .filter(|candidate| include_definitions || !candidate.is_definition)
        .filter(|candidate| {
            seen.insert((candidate.location.file.clone(), candidate.location.range.start.line))
        })
        .collect()
}

/// `line` is zero-based. Context is clipped to the file bounds.
fn extract_context(lines: &[String], line: usize, context: usize) -> (String, Vec<String>, Vec<String>) {
    let Some(text) = lines.get(line) else {
        return (String::new(), Vec::new(), Vec::new());
    };
    let before = lines[line.saturating_sub(context)..line].to_vec();
    let end = (line + 1 + context).min(lines.len());
    let after = lines[line + 1..end].to_vec();
    (text.trim_end().to_string(), before, after)
}
