use crate::cache::{CacheManager, CacheStats, SledLayer};
use crate::incremental::{AnalysisResult, FileAnalysis, FileAnalysisCache, IncrementalAnalyzer};
use crate::solution_cache::{SolutionCache, SolutionEntry};
use codeindex_core::{
    ComplexityAnalyzer, ComplexityFinding, IndexConfig, IndexError, ProjectGraph, Result,
    SharedProvider,
};
use codeindex_engine::{
    DependencyAnalysis, Engine, Gathered, ReferenceResult, SearchOptions, SearchResult,
    UnitFailure,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the caches and wires the provider into every analysis. Each
/// instance is independent; nothing is process-global.
pub struct IndexService {
    config: IndexConfig,
    provider: SharedProvider,
    solutions: SolutionCache,
    engine: Engine,
    incremental: IncrementalAnalyzer,
}

impl IndexService {
    pub fn new(provider: SharedProvider, config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let mut solution_entries: CacheManager<SolutionEntry> =
            CacheManager::from_settings(&config.cache);
        let mut file_entries: CacheManager<FileAnalysis> =
            CacheManager::new(config.cache.file_capacity(), config.cache.fast_ttl());
        if let Some(path) = &config.cache.durable_path {
            let db = SledLayer::open_db(path)?;
            solution_entries =
                solution_entries.with_durable(Arc::new(SledLayer::from_db(&db, "solutions")?));
            file_entries = file_entries.with_durable(Arc::new(SledLayer::from_db(&db, "files")?));
            info!(path = %path.display(), "durable cache opened");
        }

        let files = Arc::new(FileAnalysisCache::new(file_entries));
        let incremental = IncrementalAnalyzer::new(
            provider.clone(),
            files,
            config.max_concurrency,
            config.batch_size(),
            config.default_complexity_threshold,
        );

        Ok(Self {
            solutions: SolutionCache::new(provider.clone(), solution_entries, config.reload_window()),
            engine: Engine::new(provider.clone(), &config),
            incremental,
            provider,
            config,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn solutions(&self) -> &SolutionCache {
        &self.solutions
    }

    pub fn file_cache(&self) -> &Arc<FileAnalysisCache> {
        self.incremental.cache()
    }

    pub fn solution_stats(&self) -> CacheStats {
        self.solutions.entries().stats()
    }

    pub fn file_stats(&self) -> CacheStats {
        self.incremental.cache().stats()
    }

    /// Run `work` under the request timeout. On expiry the future is
    /// dropped, which aborts the module tasks it still owns.
    async fn bounded<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        let budget = self.config.request_timeout();
        match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?budget, "request timed out");
                Err(IndexError::Timeout(budget))
            }
        }
    }

    pub async fn resolve(&self, path: &Path) -> Result<Arc<ProjectGraph>> {
        self.bounded(self.solutions.resolve(path)).await
    }

    pub async fn search(
        &self,
        path: &Path,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<Gathered<SearchResult>> {
        self.bounded(async {
            let graph = self.solutions.resolve(path).await?;
            self.engine.search().search(&graph, pattern, options).await
        })
        .await
    }

    pub async fn find_references(
        &self,
        path: &Path,
        symbol_name: &str,
        include_definitions: bool,
    ) -> Result<Gathered<ReferenceResult>> {
        self.bounded(async {
            let graph = self.solutions.resolve(path).await?;
            self.engine
                .references()
                .find_references(&graph, symbol_name, include_definitions)
                .await
        })
        .await
    }

    pub async fn analyze_dependencies(&self, path: &Path) -> Result<DependencyAnalysis> {
        self.bounded(async {
            let graph = self.solutions.resolve(path).await?;
            self.engine.dependencies().analyze_dependencies(&graph).await
        })
        .await
    }

    pub async fn analyze_complexity(
        &self,
        path: &Path,
        threshold: u32,
    ) -> Result<Gathered<ComplexityFinding>> {
        self.bounded(async {
            let graph = self.solutions.resolve(path).await?;
            self.engine
                .dependencies()
                .analyze_complexity(&graph, threshold)
                .await
        })
        .await
    }

    /// Complexity of a single file of the graph.
    pub async fn analyze_file_complexity(
        &self,
        path: &Path,
        file: &Path,
        threshold: u32,
    ) -> Result<Gathered<ComplexityFinding>> {
        self.bounded(async {
            let graph = self.solutions.resolve(path).await?;
            let file = locate_file(&graph, file)?;
            let mut gathered = Gathered::default();
            match self.provider.file_model(&graph, &file).await {
                Ok(Some(model)) => {
                    gathered.items = ComplexityAnalyzer::new(threshold).analyze_tree(&model.syntax)
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "complexity analysis failed");
                    gathered
                        .failures
                        .push(UnitFailure::new(file.display().to_string(), err));
                }
            }
            Ok(gathered)
        })
        .await
    }

    pub async fn analyze(
        &self,
        path: &Path,
        changed: Option<&[PathBuf]>,
    ) -> Result<AnalysisResult> {
        let graph = self.resolve(path).await?;
        self.incremental.analyze(&graph, changed).await
    }
}

/// Match `file` against the graph's files, either exactly or by path suffix
/// (`src/Widget.cs` finds `/repo/src/Widget.cs`).
fn locate_file(graph: &ProjectGraph, file: &Path) -> Result<PathBuf> {
    graph
        .all_files()
        .into_iter()
        .find(|candidate| candidate == file || candidate.ends_with(file))
        .ok_or_else(|| {
            IndexError::NotFound(format!(
                "file {} in {}",
                file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                graph.name()
            ))
        })
}
