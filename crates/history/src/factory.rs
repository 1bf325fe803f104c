use crate::error::HistoryError;
use crate::reconcile::ReconcileOptions;
use crate::traits::HistoryBackend;
use crate::types::RepositoryId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Type of history backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Per-file dotted-decimal revisions (branch-tree)
    Cvs,
    /// Global integer revisions (global-sequence)
    #[serde(alias = "svn")]
    Subversion,
    /// Commit graph (DAG)
    Git,
    /// Per-revision status lists (flat-status)
    #[serde(alias = "hg")]
    Mercurial,
}

impl BackendType {
    /// Short name used in diagnostics and repository identities
    pub fn name(self) -> &'static str {
        match self {
            BackendType::Cvs => "cvs",
            BackendType::Subversion => "svn",
            BackendType::Git => "git",
            BackendType::Mercurial => "hg",
        }
    }

    /// Repository identity for a repository of this type at `location`
    pub fn repository_id(self, location: &str) -> RepositoryId {
        RepositoryId::new(format!("{}:{location}", self.name()))
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for a history backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub backend_type: BackendType,
    pub path: PathBuf,
    #[serde(default)]
    pub reconcile: ReconcileOptions,
}

/// Factory for creating history backends
pub struct HistoryFactory;

impl HistoryFactory {
    /// Create a backend based on configuration.
    ///
    /// Git repositories are opened directly through libgit2. The other
    /// backends read history through an external client, so they are built
    /// with their adapter's constructor instead (`CvsHistory::new`, ...).
    #[cfg(feature = "git")]
    pub fn create(config: &HistoryConfig) -> Result<Box<dyn HistoryBackend>, HistoryError> {
        match config.backend_type {
            BackendType::Git => {
                let git = crate::backend::git::GitHistory::open(&config.path)?;
                Ok(Box::new(git))
            }
            other => Err(HistoryError::InvalidOperation(format!(
                "{other} history requires a client; construct the adapter directly"
            ))),
        }
    }

    #[cfg(not(feature = "git"))]
    pub fn create(_config: &HistoryConfig) -> Result<Box<dyn HistoryBackend>, HistoryError> {
        Err(HistoryError::InvalidOperation(
            "No library-backed history features enabled".to_string(),
        ))
    }

    /// Auto-detect backend from a working copy
    pub fn detect(path: &Path) -> Result<BackendType, HistoryError> {
        let markers = [
            (".git", BackendType::Git),
            (".hg", BackendType::Mercurial),
            (".svn", BackendType::Subversion),
            ("CVS", BackendType::Cvs),
        ];
        markers
            .into_iter()
            .find(|(marker, _)| path.join(marker).exists())
            .map(|(_, backend)| backend)
            .ok_or_else(|| HistoryError::repo_not_found(path))
    }

    /// Create a backend by auto-detecting the type
    pub fn auto_detect(path: &Path) -> Result<Box<dyn HistoryBackend>, HistoryError> {
        let backend_type = Self::detect(path)?;
        Self::create(&HistoryConfig {
            backend_type,
            path: path.to_path_buf(),
            reconcile: ReconcileOptions::default(),
        })
    }
}
