//! Wildcard symbol search with relevance ranking

use crate::fanout::{fan_out, Gathered};
use codeindex_core::{
    IndexError, KindFilter, ProjectGraph, Result, SharedProvider, SymbolIndexer, SymbolRecord,
};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;

/// A `*`/`?` wildcard pattern compiled to an anchored matcher.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    literal: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn compile(pattern: &str, ignore_case: bool) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(IndexError::InvalidInput("search pattern is empty".into()));
        }

        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut literal = String::new();
        let mut chunk = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' | '?' => {
                    expr.push_str(&regex::escape(&chunk));
                    chunk.clear();
                    expr.push_str(if ch == '*' { ".*" } else { "." });
                }
                _ => {
                    chunk.push(ch);
                    literal.push(ch);
                }
            }
        }
        expr.push_str(&regex::escape(&chunk));
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| IndexError::InvalidInput(format!("invalid pattern `{pattern}`: {e}")))?;

        Ok(Self {
            source: pattern.to_string(),
            literal,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The pattern with every wildcard removed.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Matches the short name or the fully qualified name.
    pub fn matches_symbol(&self, name: &str, full_name: &str) -> bool {
        self.is_match(name) || self.is_match(full_name)
    }
}

/// Relevance of `record` against the wildcard-free part of the query.
pub fn relevance(record: &SymbolRecord, literal: &str) -> f64 {
    let name = record.name.to_lowercase();
    let literal = literal.to_lowercase();

    let mut score = 0.0;
    if name == literal {
        score += 100.0;
    }
    if name.starts_with(&literal) {
        score += 50.0;
    }
    score -= 0.1 * record.name.chars().count() as f64;
    if record.accessibility.is_public() {
        score += 10.0;
    }
    score
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub kinds: KindFilter,
    pub ignore_case: bool,
    /// Applied after ordering.
    pub limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            kinds: KindFilter::all(),
            ignore_case: true,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub symbol: SymbolRecord,
    pub score: f64,
}

fn compare(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.symbol.name.cmp(&b.symbol.name))
        .then_with(|| a.symbol.full_name.cmp(&b.symbol.full_name))
}

/// Descending score, then ascending name. The sort is stable, so results
/// that tie on both keep traversal order.
pub fn order_results(results: &mut [SearchResult]) {
    results.par_sort_by(compare);
}

pub struct SearchEngine {
    provider: SharedProvider,
}

impl SearchEngine {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    pub async fn search(
        &self,
        graph: &Arc<ProjectGraph>,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<Gathered<SearchResult>> {
        let matcher = Arc::new(WildcardPattern::compile(pattern, options.ignore_case)?);
        let kinds = Arc::new(options.kinds.clone());

        let mut gathered = fan_out(graph, |graph, module| {
            let provider = Arc::clone(&self.provider);
            let matcher = Arc::clone(&matcher);
            let kinds = Arc::clone(&kinds);
            async move {
                let compilation = provider.compile(&graph, &module).await?;
                let indexer = SymbolIndexer::new(&compilation);
                let mut matches = Vec::new();
                indexer.walk(|entry| {
                    if matcher.matches_symbol(&entry.info.name, entry.full_name)
                        && kinds.contains(entry.kind())
                    {
                        let symbol = entry.to_record(indexer.module());
                        let score = relevance(&symbol, matcher.literal());
                        matches.push(SearchResult { symbol, score });
                    }
                });
                Ok(matches)
            }
        })
        .await
        .flatten();

        order_results(&mut gathered.items);
        if let Some(limit) = options.limit {
            gathered.items.truncate(limit);
        }

        info!(
            pattern,
            results = gathered.items.len(),
            failed_modules = gathered.failures.len(),
            "search finished"
        );
        Ok(gathered)
    }
}
