//! Contract of the external front end that loads project graphs and hands
//! out symbol models and syntax trees. The index never parses source itself.

use crate::error::ProviderError;
use crate::graph::{Compilation, ModuleInfo, ProjectGraph};
use crate::syntax::FileModel;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Every method is a suspension point; implementations may block on a
/// compiler, a language server, or disk.
#[async_trait]
pub trait ProjectGraphProvider: Send + Sync {
    /// Load the project graph rooted at `path`.
    async fn load_graph(&self, path: &Path) -> Result<ProjectGraph, ProviderError>;

    /// Symbol model of one module: its namespace tree and usage sites.
    async fn compile(
        &self,
        graph: &ProjectGraph,
        module: &ModuleInfo,
    ) -> Result<Arc<Compilation>, ProviderError>;

    /// Syntax tree and semantic model of one file, or `None` when the
    /// provider has no model for it (generated or excluded files).
    async fn file_model(
        &self,
        graph: &ProjectGraph,
        file: &Path,
    ) -> Result<Option<FileModel>, ProviderError>;

    /// Source text, used for reference context lines.
    async fn read_source(&self, file: &Path) -> Result<String, ProviderError> {
        tokio::fs::read_to_string(file)
            .await
            .map_err(|e| ProviderError::from_io(file, e))
    }

    /// Last modification time of a source file on disk.
    async fn modified_time(&self, file: &Path) -> Result<SystemTime, ProviderError> {
        let metadata = tokio::fs::metadata(file)
            .await
            .map_err(|e| ProviderError::from_io(file, e))?;
        metadata.modified().map_err(|e| ProviderError::from_io(file, e))
    }
}

pub type SharedProvider = Arc<dyn ProjectGraphProvider>;
