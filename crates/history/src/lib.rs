//! Version-Control History Normalization
//!
//! This crate reads the history of CVS, Subversion, Git and Mercurial
//! repositories into one canonical model, so that tools analysing history
//! do not need to know which system produced it.
//!
//! # Design Goals
//!
//! - **One model for four addressing schemes**: per-file dotted revisions,
//!   global integers, commit DAGs and flat status lists all map onto
//!   [`Entity`], [`Change`] and [`ChangeSet`]
//! - **Narrow collaborator traits**: process invocation and output parsing
//!   stay outside the crate; adapters consume tokenized records
//! - **Explicit reconciliation**: raw changesets are promoted to moves and
//!   derived copies by [`optimize`], which reads historical content through
//!   a [`ContentSource`]
//!
//! # Example
//!
//! ```no_run
//! use vcs_history::{BackendType, HistoryConfig, HistoryFactory, ReconcileOptions};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HistoryConfig {
//!     backend_type: BackendType::Git,
//!     path: PathBuf::from("/path/to/repo"),
//!     reconcile: ReconcileOptions::default().with_workers(4),
//! };
//!
//! let history = HistoryFactory::create(&config)?;
//! let changeset = history.get_optimized_changeset("HEAD", &config.reconcile)?;
//! for change in changeset.changes() {
//!     println!("{change}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod factory;
mod reconcile;
mod traits;
mod types;

pub mod backend;
pub mod revision;

pub use error::{HistoryError, Result};
pub use factory::{BackendType, HistoryConfig, HistoryFactory};
pub use reconcile::{optimize, ReconcileOptions};
pub use traits::{ChangeSetIter, ChangeSetSource, ContentSource, HistoryBackend};
pub use types::{
    Change, ChangeSet, ChangeType, Entity, EntityKind, ReconcileState, RepositoryId, Revision,
};

pub use backend::cvs::{CvsClient, CvsFileRecord, CvsHistory, CvsLogEntry};
pub use backend::hg::{HgClient, HgHistory, HgLogRecord, HgStatusEntry};
pub use backend::svn::{SvnClient, SvnHistory, SvnLogEntry, SvnPathRecord};

#[cfg(feature = "git")]
pub use backend::git::GitHistory;

pub use tokio_util::sync::CancellationToken;
