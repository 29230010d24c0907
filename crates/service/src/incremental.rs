//! Incremental per-file analysis.
//!
//! A file is reanalyzed only when its on-disk modification time has moved
//! past the timestamp of its cached entry. Candidates are processed in
//! sequential batches; inside a batch files run concurrently under a
//! semaphore so at most `max_concurrency` file models are alive at once.

use crate::cache::{CacheManager, CacheStats};
use chrono::{DateTime, Utc};
use codeindex_core::{
    extract_declarations, ComplexityAnalyzer, ComplexityFinding, ProjectGraph, Result,
    SharedProvider, SymbolRecord,
};
use codeindex_engine::UnitFailure;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAnalysis {
    pub file: PathBuf,
    /// Taken just before the file model was requested.
    pub analyzed_at: SystemTime,
    pub symbols: Vec<SymbolRecord>,
    pub complexity: Vec<ComplexityFinding>,
}

impl FileAnalysis {
    /// Usable without recomputation while the file has not been modified
    /// after the analysis started.
    pub fn is_valid_for(&self, modified: SystemTime) -> bool {
        self.analyzed_at >= modified
    }
}

/// One entry per source file; entries are replaced, never merged.
pub struct FileAnalysisCache {
    entries: CacheManager<FileAnalysis>,
}

fn file_key(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

impl FileAnalysisCache {
    pub fn new(entries: CacheManager<FileAnalysis>) -> Self {
        Self { entries }
    }

    pub async fn get(&self, file: &Path) -> Option<FileAnalysis> {
        self.entries.get(&file_key(file)).await
    }

    pub async fn store(&self, analysis: FileAnalysis) {
        let key = file_key(&analysis.file);
        if let Err(err) = self.entries.insert(&key, analysis).await {
            warn!(file = %key, error = %err, "could not persist file analysis");
        }
    }

    pub async fn forget(&self, file: &Path) -> Result<()> {
        self.entries.remove(&file_key(file)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.entries.clear().await
    }

    /// Make room for `files` entries so one pass never evicts what it is
    /// about to read.
    pub fn reserve(&self, files: usize) {
        self.entries.ensure_capacity(files);
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbols: Vec<SymbolRecord>,
    pub complexity_findings: Vec<ComplexityFinding>,
    /// Analyzed plus reused.
    pub processed_file_count: usize,
    pub analyzed_file_count: usize,
    pub reused_file_count: usize,
    pub failures: Vec<UnitFailure>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

enum Outcome {
    Reused(FileAnalysis),
    Analyzed(FileAnalysis),
    Failed(UnitFailure),
}

pub struct IncrementalAnalyzer {
    provider: SharedProvider,
    cache: Arc<FileAnalysisCache>,
    semaphore: Arc<Semaphore>,
    batch_size: usize,
    threshold: u32,
}

impl IncrementalAnalyzer {
    pub fn new(
        provider: SharedProvider,
        cache: Arc<FileAnalysisCache>,
        max_concurrency: usize,
        batch_size: usize,
        threshold: u32,
    ) -> Self {
        Self {
            provider,
            cache,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            batch_size: batch_size.max(1),
            threshold,
        }
    }

    pub fn cache(&self) -> &Arc<FileAnalysisCache> {
        &self.cache
    }

    /// Analyze `changed` files, or every file of the graph when `None`.
    /// Output is in candidate order whatever the batch size.
    pub async fn analyze(
        &self,
        graph: &Arc<ProjectGraph>,
        changed: Option<&[PathBuf]>,
    ) -> Result<AnalysisResult> {
        let start_time = Utc::now();
        let candidates = match changed {
            Some(files) => {
                let mut seen = HashSet::new();
                files
                    .iter()
                    .filter(|file| seen.insert(file.as_path()))
                    .cloned()
                    .collect()
            }
            None => graph.all_files(),
        };
        self.cache.reserve(graph.file_count().max(candidates.len()));

        let mut result = AnalysisResult {
            symbols: Vec::new(),
            complexity_findings: Vec::new(),
            processed_file_count: 0,
            analyzed_file_count: 0,
            reused_file_count: 0,
            failures: Vec::new(),
            start_time,
            end_time: start_time,
        };

        for (batch_index, batch) in candidates.chunks(self.batch_size).enumerate() {
            let mut outcomes = self.run_batch(graph, batch).await;
            outcomes.sort_by_key(|(index, _)| *index);
            debug!(batch = batch_index, files = batch.len(), "batch finished");

            for (_, outcome) in outcomes {
                match outcome {
                    Outcome::Reused(analysis) => {
                        result.reused_file_count += 1;
                        result.symbols.extend(analysis.symbols);
                        result.complexity_findings.extend(analysis.complexity);
                    }
                    Outcome::Analyzed(analysis) => {
                        result.analyzed_file_count += 1;
                        result.symbols.extend(analysis.symbols);
                        result.complexity_findings.extend(analysis.complexity);
                    }
                    Outcome::Failed(failure) => result.failures.push(failure),
                }
            }
        }

        result.processed_file_count = result.analyzed_file_count + result.reused_file_count;
        result.end_time = Utc::now();
        info!(
            analyzed = result.analyzed_file_count,
            reused = result.reused_file_count,
            failed = result.failures.len(),
            symbols = result.symbols.len(),
            "incremental analysis finished"
        );
        Ok(result)
    }

    async fn run_batch(&self, graph: &Arc<ProjectGraph>, batch: &[PathBuf]) -> Vec<(usize, Outcome)> {
        let mut set = JoinSet::new();
        for (index, file) in batch.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let cache = Arc::clone(&self.cache);
            let semaphore = Arc::clone(&self.semaphore);
            let graph = Arc::clone(graph);
            let file = file.clone();
            let analyzer = ComplexityAnalyzer::new(self.threshold);

            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => analyze_file(provider, cache, &graph, file, analyzer).await,
                    Err(err) => Outcome::Failed(UnitFailure::new(file.display().to_string(), err)),
                };
                (index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(batch.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(error = %err, "file analysis task did not complete"),
            }
        }
        outcomes
    }
}

async fn analyze_file(
    provider: SharedProvider,
    cache: Arc<FileAnalysisCache>,
    graph: &ProjectGraph,
    file: PathBuf,
    analyzer: ComplexityAnalyzer,
) -> Outcome {
    match provider.modified_time(&file).await {
        Ok(modified) => {
            if let Some(cached) = cache.get(&file).await {
                if cached.is_valid_for(modified) {
                    debug!(file = %file.display(), "reusing cached analysis");
                    return Outcome::Reused(cached);
                }
            }
        }
        Err(err) => {
            debug!(file = %file.display(), error = %err, "modification time unavailable; reanalyzing");
        }
    }

    let analyzed_at = SystemTime::now();
    let (symbols, complexity) = match provider.file_model(graph, &file).await {
        Ok(Some(model)) => {
            let symbols = extract_declarations(&model);
            let complexity = analyzer.analyze_tree(&model.syntax);
            // Syntax tree and semantic model are released here, before the
            // permit is returned.
            drop(model);
            (symbols, complexity)
        }
        Ok(None) => (Vec::new(), Vec::new()),
        Err(err) => {
            warn!(file = %file.display(), error = %err, "file analysis failed; skipping");
            return Outcome::Failed(UnitFailure::new(file.display().to_string(), err));
        }
    };

    let analysis = FileAnalysis {
        file,
        analyzed_at,
        symbols,
        complexity,
    };
    cache.store(analysis.clone()).await;
    Outcome::Analyzed(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeindex_core::test_fixtures::{module, FileModelBuilder, FixtureProvider};
    use std::time::Duration;

    fn fixture() -> (Arc<FixtureProvider>, Arc<ProjectGraph>) {
        let graph = ProjectGraph::new(
            "/repo/App.sln",
            vec![
                module("Core", &["a.cs", "b.cs"], &[]),
                module("App", &["c.cs", "broken.cs"], &["Core"]),
            ],
        );
        let provider = FixtureProvider::new()
            .with_graph(graph.clone())
            .with_file_model(FileModelBuilder::new("a.cs", "Core", "Acme.A", 0).routine("Run", 2, 12).build())
            .with_file_model(FileModelBuilder::new("b.cs", "Core", "Acme.B", 0).routine("Go", 2, 3).build())
            .with_file_model(FileModelBuilder::new("c.cs", "App", "App.C", 0).build())
            .failing_file("broken.cs");
        (Arc::new(provider), Arc::new(graph))
    }

    fn analyzer(provider: &Arc<FixtureProvider>, batch_size: usize) -> IncrementalAnalyzer {
        let cache = Arc::new(FileAnalysisCache::new(CacheManager::new(64, None)));
        IncrementalAnalyzer::new(provider.clone(), cache, 2, batch_size, 10)
    }

    #[tokio::test]
    async fn test_full_analysis() {
        let (provider, graph) = fixture();
        let result = analyzer(&provider, 2).analyze(&graph, None).await.unwrap();

        assert_eq!(result.analyzed_file_count, 3);
        assert_eq!(result.reused_file_count, 0);
        assert_eq!(result.processed_file_count, 3);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].unit, "broken.cs");

        let names: Vec<&str> = result.symbols.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(names, vec!["Acme.A", "Acme.A.Run", "Acme.B", "Acme.B.Go", "App.C"]);
        assert_eq!(result.complexity_findings.len(), 1);
        assert_eq!(result.complexity_findings[0].routine, "Run");
        assert!(result.start_time <= result.end_time);
    }

    #[tokio::test]
    async fn test_unchanged_files_are_reused() {
        let (provider, graph) = fixture();
        let analyzer = analyzer(&provider, 2);

        let first = analyzer.analyze(&graph, None).await.unwrap();
        let second = analyzer.analyze(&graph, None).await.unwrap();

        assert_eq!(second.reused_file_count, 3);
        assert_eq!(second.analyzed_file_count, 0);
        assert_eq!(first.symbols, second.symbols);
        assert_eq!(first.complexity_findings, second.complexity_findings);
        assert_eq!(provider.file_model_calls(Path::new("a.cs")), 1);
        // Failed files are retried.
        assert_eq!(provider.file_model_calls(Path::new("broken.cs")), 2);
    }

    #[tokio::test]
    async fn test_touched_file_is_reanalyzed() {
        let (provider, graph) = fixture();
        let analyzer = analyzer(&provider, 2);
        analyzer.analyze(&graph, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        provider.touch("b.cs");
        let second = analyzer.analyze(&graph, None).await.unwrap();

        assert_eq!(second.analyzed_file_count, 1);
        assert_eq!(second.reused_file_count, 2);
        assert_eq!(provider.file_model_calls(Path::new("b.cs")), 2);
        assert_eq!(provider.file_model_calls(Path::new("a.cs")), 1);
    }

    #[tokio::test]
    async fn test_changed_subset_only() {
        let (provider, graph) = fixture();
        let analyzer = analyzer(&provider, 4);
        let changed = vec![PathBuf::from("c.cs"), PathBuf::from("c.cs")];

        let result = analyzer.analyze(&graph, Some(changed.as_slice())).await.unwrap();
        assert_eq!(result.processed_file_count, 1);
        assert_eq!(provider.total_file_model_calls(), 1);
        assert_eq!(analyzer.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_results() {
        let (provider, graph) = fixture();
        let one = analyzer(&provider, 1).analyze(&graph, None).await.unwrap();
        let many = analyzer(&provider, 8).analyze(&graph, None).await.unwrap();

        assert_eq!(one.symbols, many.symbols);
        assert_eq!(one.complexity_findings, many.complexity_findings);
        assert_eq!(one.processed_file_count, many.processed_file_count);
    }

    #[tokio::test]
    async fn test_graph_larger_than_cache_is_reused() {
        let names: Vec<String> = (0..40).map(|i| format!("f{i}.cs")).collect();
        let files: Vec<&str> = names.iter().map(String::as_str).collect();
        let graph = Arc::new(ProjectGraph::new("/big/Big.sln", vec![module("Big", &files, &[])]));
        let provider = Arc::new(FixtureProvider::new().with_graph((*graph).clone()));
        let cache = Arc::new(FileAnalysisCache::new(CacheManager::new(8, None)));
        let analyzer = IncrementalAnalyzer::new(provider.clone(), cache, 4, 4, 10);

        let first = analyzer.analyze(&graph, None).await.unwrap();
        assert_eq!(first.analyzed_file_count, 40);
        assert_eq!(analyzer.cache().capacity(), 40);

        let second = analyzer.analyze(&graph, None).await.unwrap();
        assert_eq!(second.reused_file_count, 40);
        assert_eq!(second.analyzed_file_count, 0);
        assert_eq!(provider.total_file_model_calls(), 40);
        assert_eq!(analyzer.cache().stats().evictions, 0);
    }

    #[tokio::test]
    async fn test_forget_forces_reanalysis() {
        let (provider, graph) = fixture();
        let analyzer = analyzer(&provider, 2);
        analyzer.analyze(&graph, None).await.unwrap();

        analyzer.cache().forget(Path::new("a.cs")).await.unwrap();
        let second = analyzer.analyze(&graph, None).await.unwrap();
        assert_eq!(second.analyzed_file_count, 1);
        assert_eq!(provider.file_model_calls(Path::new("a.cs")), 2);
    }
}
