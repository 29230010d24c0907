use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a project graph provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("malformed project graph: {0}")]
    Malformed(String),
    #[error("toolchain unavailable: {0}")]
    Unavailable(String),
    #[error("access denied: {}", .0.display())]
    AccessDenied(PathBuf),
    #[error("analysis of {unit} failed: {reason}")]
    Analysis { unit: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProviderError {
    /// Classify an io error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProviderError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ProviderError::AccessDenied(path.to_path_buf()),
            _ => ProviderError::Io(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to load project graph {}: {reason}", .path.display())]
    LoadFailure { path: PathBuf, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("{failed} of {total} units could not be analyzed")]
    PartialAnalysisFailure { failed: usize, total: usize },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("cache storage failure: {0}")]
    Storage(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl IndexError {
    /// Wrap a provider failure raised while loading the graph at `path`.
    pub fn load_failure(path: &Path, err: ProviderError) -> Self {
        match err {
            ProviderError::AccessDenied(denied) => {
                IndexError::AccessDenied(denied.display().to_string())
            }
            other => IndexError::LoadFailure {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::InvalidInput(_) => ErrorKind::InvalidInput,
            IndexError::LoadFailure { .. } => ErrorKind::LoadFailure,
            IndexError::NotFound(_) => ErrorKind::NotFound,
            IndexError::Timeout(_) => ErrorKind::Timeout,
            IndexError::PartialAnalysisFailure { .. } => ErrorKind::PartialAnalysisFailure,
            IndexError::AccessDenied(_) => ErrorKind::AccessDenied,
            IndexError::Storage(_) => ErrorKind::Storage,
            IndexError::Provider(err) => match err {
                ProviderError::NotFound(_) => ErrorKind::NotFound,
                ProviderError::AccessDenied(_) => ErrorKind::AccessDenied,
                ProviderError::Io(io) if io.kind() == io::ErrorKind::PermissionDenied => {
                    ErrorKind::AccessDenied
                }
                _ => ErrorKind::LoadFailure,
            },
        }
    }
}

/// Caller-facing classification of an [`IndexError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    LoadFailure,
    NotFound,
    Timeout,
    PartialAnalysisFailure,
    AccessDenied,
    Storage,
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_classified() {
        let path = Path::new("/tmp/missing.sln");
        let not_found = ProviderError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(not_found, ProviderError::NotFound(p) if p == path));

        let denied =
            ProviderError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, ProviderError::AccessDenied(_)));
    }

    #[test]
    fn test_load_failure_mapping() {
        let path = Path::new("/repo/App.sln");
        let err = IndexError::load_failure(path, ProviderError::Malformed("bad json".into()));
        assert_eq!(err.kind(), ErrorKind::LoadFailure);

        let err = IndexError::load_failure(path, ProviderError::AccessDenied(path.into()));
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_provider_error_kind() {
        let err: IndexError = ProviderError::NotFound("x.cs".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err: IndexError = ProviderError::Unavailable("no sdk".into()).into();
        assert_eq!(err.kind(), ErrorKind::LoadFailure);
    }
}
