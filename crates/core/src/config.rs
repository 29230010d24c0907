use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Tunables for the index service. Every field has a default, so an empty
/// TOML document is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Seconds a loaded project graph stays fresh before it is reloaded.
    pub reload_window_secs: u64,
    /// Overall budget for one search or reference request, in seconds.
    pub request_timeout_secs: u64,
    /// Simultaneous file analyses; defaults to the number of CPUs.
    pub max_concurrency: usize,
    /// Files per incremental batch; defaults to `max_concurrency`.
    pub batch_size: Option<usize>,
    /// Threshold used when the incremental analyzer records complexity.
    pub default_complexity_threshold: u32,
    /// Lines of context captured on each side of a reference.
    pub context_lines: usize,
    /// Namespaces left out of the namespace usage histogram.
    pub platform_namespaces: Vec<String>,
    pub cache: CacheSettings,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            reload_window_secs: 300,
            request_timeout_secs: 300,
            max_concurrency: num_cpus::get().max(1),
            batch_size: None,
            default_complexity_threshold: 10,
            context_lines: 2,
            platform_namespaces: vec!["System".to_string(), "Microsoft".to_string()],
            cache: CacheSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// Entries kept in the in-memory layer.
    pub fast_capacity: usize,
    /// In-memory entries of the per-file analysis cache; unbounded when
    /// unset. Always raised to the file count of the graph being analyzed.
    pub file_capacity: Option<usize>,
    /// Optional time-to-live of in-memory entries, in seconds.
    pub fast_ttl_secs: Option<u64>,
    /// Directory of the optional sled-backed durable layer.
    pub durable_path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fast_capacity: 1024,
            file_capacity: None,
            fast_ttl_secs: None,
            durable_path: None,
        }
    }
}

impl CacheSettings {
    pub fn file_capacity(&self) -> usize {
        self.file_capacity.unwrap_or(usize::MAX)
    }

    pub fn fast_ttl(&self) -> Option<Duration> {
        self.fast_ttl_secs.map(Duration::from_secs)
    }
}

impl IndexConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: IndexConfig = toml::from_str(source)
            .map_err(|e| IndexError::InvalidInput(format!("configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            IndexError::InvalidInput(format!(
                "cannot read configuration {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(IndexError::InvalidInput(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(IndexError::InvalidInput(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.cache.fast_capacity == 0 {
            return Err(IndexError::InvalidInput(
                "cache.fast_capacity must be at least 1".into(),
            ));
        }
        if self.cache.file_capacity == Some(0) {
            return Err(IndexError::InvalidInput(
                "cache.file_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn reload_window(&self) -> Duration {
        Duration::from_secs(self.reload_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(self.max_concurrency).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = IndexConfig::from_toml_str("").unwrap();
        assert_eq!(config, IndexConfig::default());
        assert_eq!(config.reload_window(), Duration::from_secs(300));
        assert_eq!(config.batch_size(), config.max_concurrency);
        assert_eq!(config.cache.file_capacity(), usize::MAX);
    }

    #[test]
    fn test_partial_document() {
        let config = IndexConfig::from_toml_str(
            r#"
            max_concurrency = 3
            default_complexity_threshold = 5
            platform_namespaces = ["System"]

            [cache]
            fast_capacity = 16
            fast_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.batch_size(), 3);
        assert_eq!(config.default_complexity_threshold, 5);
        assert_eq!(config.platform_namespaces, vec!["System".to_string()]);
        assert_eq!(config.cache.fast_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.context_lines, 2);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(IndexConfig::from_toml_str("max_concurrency = 0").is_err());
        assert!(IndexConfig::from_toml_str("batch_size = 0").is_err());
        assert!(IndexConfig::from_toml_str("[cache]\nfile_capacity = 0").is_err());
        assert!(IndexConfig::from_toml_str("reload_window_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codeindex.toml");
        std::fs::write(&path, "context_lines = 4\n").unwrap();

        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.context_lines, 4);
        assert!(IndexConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
