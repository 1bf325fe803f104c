use std::path::Path;
use thiserror::Error;

use crate::factory::BackendType;
use crate::types::Revision;

/// Errors that can occur while reading or reconciling history
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The collaborator (process wrapper or library) failed or reported a
    /// non-success status. `message` carries the backend's own diagnostics.
    #[error("{backend} backend call failed: {message}")]
    BackendInvocation {
        backend: BackendType,
        message: String,
    },

    /// A backend-native record could not be mapped onto the canonical model.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Historical content for a reconciliation candidate could not be read.
    #[error("Could not fetch content of {path}@{revision}: {source}")]
    ContentFetch {
        path: String,
        revision: Revision,
        #[source]
        source: Box<HistoryError>,
    },

    #[error("Invalid revision for predecessor computation: {0}")]
    RevisionArithmetic(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    /// Create a RepositoryNotFound error from a path
    pub fn repo_not_found(path: &Path) -> Self {
        Self::RepositoryNotFound(path.display().to_string())
    }

    /// Wrap any collaborator error as a BackendInvocation error
    pub fn backend<E: std::fmt::Display>(backend: BackendType, error: E) -> Self {
        Self::BackendInvocation {
            backend,
            message: error.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }

    /// Attach the entity that was being read to a content fetch failure
    pub fn content_fetch(path: &str, revision: &Revision, source: HistoryError) -> Self {
        Self::ContentFetch {
            path: path.to_string(),
            revision: revision.clone(),
            source: Box::new(source),
        }
    }

    /// True when a backend record, not the backend itself, was at fault
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            HistoryError::MalformedRecord(_) | HistoryError::RevisionArithmetic(_)
        )
    }

    /// True when the external collaborator failed
    pub fn is_backend_failure(&self) -> bool {
        match self {
            HistoryError::BackendInvocation { .. } | HistoryError::Io(_) => true,
            HistoryError::ContentFetch { source, .. } => source.is_backend_failure(),
            _ => false,
        }
    }

    /// True when the failure was caused by a cancellation token
    pub fn is_cancelled(&self) -> bool {
        match self {
            HistoryError::Cancelled => true,
            HistoryError::ContentFetch { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(feature = "git")]
impl From<git2::Error> for HistoryError {
    fn from(error: git2::Error) -> Self {
        Self::backend(BackendType::Git, error.message())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, HistoryError>;
