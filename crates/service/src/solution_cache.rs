//! Project graphs keyed by normalized absolute path.
//!
//! An entry is fresh for a fixed window after it was loaded and reloaded
//! unconditionally afterwards. Concurrent resolves of the same path share one
//! load.

use crate::cache::CacheManager;
use codeindex_core::{IndexError, ProjectGraph, Result, SharedProvider};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionEntry {
    pub path: PathBuf,
    pub graph: Arc<ProjectGraph>,
    pub loaded_at: SystemTime,
}

impl SolutionEntry {
    /// An entry stamped in the future (clock moved back) counts as fresh.
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.loaded_at
            .elapsed()
            .map(|age| age < window)
            .unwrap_or(true)
    }
}

/// Absolute, lexically cleaned form of `path`. Symlinks are not resolved so
/// a graph that does not exist yet still gets a stable key.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(IndexError::InvalidInput("project graph path is empty".into()));
    }
    let absolute = std::path::absolute(path)
        .map_err(|e| IndexError::InvalidInput(format!("cannot resolve path: {e}")))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct SolutionCache {
    provider: SharedProvider,
    entries: CacheManager<SolutionEntry>,
    loading: DashMap<PathBuf, Arc<Mutex<()>>>,
    reload_window: Duration,
}

impl SolutionCache {
    pub fn new(
        provider: SharedProvider,
        entries: CacheManager<SolutionEntry>,
        reload_window: Duration,
    ) -> Self {
        Self {
            provider,
            entries,
            loading: DashMap::new(),
            reload_window,
        }
    }

    pub async fn resolve(&self, path: &Path) -> Result<Arc<ProjectGraph>> {
        let normalized = normalize_path(path)?;
        let key = cache_key(&normalized);

        if let Some(graph) = self.fresh(&key).await {
            return Ok(graph);
        }

        let lock = self
            .loading
            .entry(normalized.clone())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.load_locked(&normalized, &key).await
        };
        // Drop the lock entry unless another caller still holds it.
        self.loading
            .remove_if(&normalized, |_, held| Arc::strong_count(held) <= 2);
        result
    }

    async fn load_locked(&self, normalized: &Path, key: &str) -> Result<Arc<ProjectGraph>> {
        // Whoever held the lock before us may have finished the load.
        if let Some(graph) = self.fresh(key).await {
            debug!(path = %normalized.display(), "graph loaded by a concurrent request");
            return Ok(graph);
        }

        let graph = self
            .provider
            .load_graph(normalized)
            .await
            .map_err(|e| IndexError::load_failure(normalized, e))?;
        let graph = Arc::new(graph);
        info!(
            path = %normalized.display(),
            modules = graph.modules.len(),
            "project graph loaded"
        );

        let entry = SolutionEntry {
            path: normalized.to_path_buf(),
            graph: Arc::clone(&graph),
            loaded_at: SystemTime::now(),
        };
        if let Err(err) = self.entries.insert(key, entry).await {
            warn!(path = %normalized.display(), error = %err, "could not persist project graph");
        }
        Ok(graph)
    }

    async fn fresh(&self, key: &str) -> Option<Arc<ProjectGraph>> {
        let entry = self.entries.get(key).await?;
        if entry.is_fresh(self.reload_window) {
            Some(entry.graph)
        } else {
            debug!(key, "project graph is stale");
            None
        }
    }

    /// Drop the entry for `path`; the next resolve reloads it.
    pub async fn invalidate(&self, path: &Path) -> Result<()> {
        let normalized = normalize_path(path)?;
        self.entries.remove(&cache_key(&normalized)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.loading.clear();
        self.entries.clear().await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &CacheManager<SolutionEntry> {
        &self.entries
    }
}
