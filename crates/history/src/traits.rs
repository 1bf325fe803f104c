use crate::error::Result;
use crate::factory::BackendType;
use crate::reconcile::{self, ReconcileOptions};
use crate::types::*;

/// Lazy, finite, non-restartable sequence of changesets
pub type ChangeSetIter<'a> = Box<dyn Iterator<Item = Result<ChangeSet>> + 'a>;

/// Historical content retrieval
///
/// Used both by callers and by the reconciliation engine, which may call it
/// from several worker threads at once. Implementations wrapping a client
/// that is not thread-safe must serialize access to it.
pub trait ContentSource: Send + Sync {
    /// Bytes of `path` as of `revision`
    fn get_file_contents(&self, path: &str, revision: &Revision) -> Result<Vec<u8>>;
}

/// Changeset queries
///
/// Each backend defines the revision syntax it accepts in
/// [`get_changeset`](ChangeSetSource::get_changeset).
pub trait ChangeSetSource: Send + Sync {
    /// Raw (unreconciled) changeset of one revision
    fn get_changeset(&self, revision: &str) -> Result<ChangeSet>;

    /// Every changeset in backend-native chronological order
    fn walk_history(&self) -> Result<ChangeSetIter<'_>>;
}

/// Combined trait representing one history backend
///
/// This is the main trait that users will interact with: an adapter that
/// both produces changesets and can resolve the entities inside them.
pub trait HistoryBackend: ContentSource + ChangeSetSource {
    /// Get backend type
    fn backend_type(&self) -> BackendType;

    /// Identity stamped on every entity this backend produces
    fn repository(&self) -> &RepositoryId;

    /// Get a human-readable description of this backend
    fn description(&self) -> String {
        format!("{} backend for {}", self.backend_type(), self.repository())
    }

    /// Changeset of one revision, passed through reconciliation
    fn get_optimized_changeset(
        &self,
        revision: &str,
        options: &ReconcileOptions,
    ) -> Result<ChangeSet> {
        let raw = self.get_changeset(revision)?;
        reconcile::optimize(raw, self, options)
    }
}
