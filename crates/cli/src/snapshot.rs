//! Project graph provider backed by a JSON snapshot.
//!
//! A front end that understands the source language writes the module list,
//! the per-module symbol models and the per-file syntax trees into one JSON
//! document. The snapshot file itself plays the role of the project graph
//! path. Source text and modification times are read from disk.

use async_trait::async_trait;
use codeindex_core::{
    Compilation, FileModel, ModuleInfo, NamespaceDecl, ProjectGraph, ProjectGraphProvider,
    ProviderError,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// On-disk layout of a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub modules: Vec<ModuleInfo>,
    #[serde(default)]
    pub compilations: Vec<Compilation>,
    #[serde(default)]
    pub files: Vec<FileModel>,
}

#[derive(Debug, Default)]
struct LoadedSnapshot {
    compilations: HashMap<String, Arc<Compilation>>,
    files: HashMap<PathBuf, FileModel>,
}

impl From<Snapshot> for LoadedSnapshot {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            compilations: snapshot
                .compilations
                .into_iter()
                .map(|c| (c.module.clone(), Arc::new(c)))
                .collect(),
            files: snapshot
                .files
                .into_iter()
                .map(|model| (model.syntax.file.clone(), model))
                .collect(),
        }
    }
}

/// Symbol models and syntax trees are kept per snapshot path. A graph that
/// reaches this provider without a `load_graph` call (for example one served
/// from a durable cache after a restart) has its snapshot reread on first use.
#[derive(Default)]
pub struct SnapshotProvider {
    loaded: DashMap<PathBuf, Arc<OnceCell<Arc<LoadedSnapshot>>>>,
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(source: &str) -> Result<Snapshot, ProviderError> {
        serde_json::from_str(source).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn read(path: &Path) -> Result<(ProjectGraph, LoadedSnapshot), ProviderError> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::from_io(path, e))?;
        let mut snapshot = Self::parse(&source)?;

        let modules = std::mem::take(&mut snapshot.modules);
        Ok((ProjectGraph::new(path, modules), LoadedSnapshot::from(snapshot)))
    }

    async fn snapshot_of(&self, graph: &ProjectGraph) -> Result<Arc<LoadedSnapshot>, ProviderError> {
        let cell = self.loaded.entry(graph.path.clone()).or_default().clone();
        let loaded = cell
            .get_or_try_init(|| async {
                debug!(path = %graph.path.display(), "snapshot not in memory; rereading");
                let (_, loaded) = Self::read(&graph.path).await?;
                Ok::<_, ProviderError>(Arc::new(loaded))
            })
            .await?;
        Ok(Arc::clone(loaded))
    }
}

#[async_trait]
impl ProjectGraphProvider for SnapshotProvider {
    async fn load_graph(&self, path: &Path) -> Result<ProjectGraph, ProviderError> {
        let (graph, loaded) = Self::read(path).await?;
        info!(
            path = %path.display(),
            modules = graph.modules.len(),
            files = loaded.files.len(),
            "snapshot loaded"
        );
        self.loaded.insert(
            path.to_path_buf(),
            Arc::new(OnceCell::from(Arc::new(loaded))),
        );
        Ok(graph)
    }

    async fn compile(
        &self,
        graph: &ProjectGraph,
        module: &ModuleInfo,
    ) -> Result<Arc<Compilation>, ProviderError> {
        let snapshot = self.snapshot_of(graph).await?;
        match snapshot.compilations.get(&module.name) {
            Some(compilation) => Ok(Arc::clone(compilation)),
            None => {
                debug!(module = %module.name, "no symbol model in snapshot");
                Ok(Arc::new(Compilation {
                    module: module.name.clone(),
                    global_namespace: NamespaceDecl::global(),
                    usages: Vec::new(),
                }))
            }
        }
    }

    async fn file_model(
        &self,
        graph: &ProjectGraph,
        file: &Path,
    ) -> Result<Option<FileModel>, ProviderError> {
        Ok(self.snapshot_of(graph).await?.files.get(file).cloned())
    }
}
