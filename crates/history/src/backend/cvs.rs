//! CVS backend (branch-tree revisions).
//!
//! CVS versions each file independently with dotted-decimal revisions and
//! has no copy primitive, so this adapter only ever emits add, remove and
//! modify. It has no global revision id either: a changeset's identifier
//! is a digest of its author, date and message.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{HistoryError, Result};
use crate::factory::BackendType;
use crate::revision::cvs_predecessor;
use crate::traits::*;
use crate::types::*;

/// Client for a CVS repository (typically a wrapper around the `cvs`
/// executable and its XML log output)
pub trait CvsClient: Send + Sync {
    /// Log entry for one revision or tag expression (`HEAD`, `1.4`, ...)
    fn log(&self, revision: &str) -> Result<CvsLogEntry>;

    /// All log entries, oldest first
    fn log_all(&self) -> Result<Vec<CvsLogEntry>>;

    /// Contents of `path` checked out at `revision`
    fn checkout(&self, path: &str, revision: &str) -> Result<Vec<u8>>;
}

/// One commit as reported by `cvs log`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CvsLogEntry {
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub tags: Vec<String>,
    pub files: Vec<CvsFileRecord>,
}

/// One file revision inside a log entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CvsFileRecord {
    pub name: String,
    pub revision: String,
    /// `Exp`, `dead`, ...
    pub state: String,
    pub lines_added: Option<u32>,
    pub lines_removed: Option<u32>,
}

/// CVS implementation of a history backend
pub struct CvsHistory<C> {
    client: C,
    repository: RepositoryId,
}

impl<C: CvsClient> CvsHistory<C> {
    /// Wrap a client; `location` identifies the repository (CVSROOT and
    /// module)
    pub fn new(client: C, location: &str) -> Self {
        Self {
            client,
            repository: BackendType::Cvs.repository_id(location),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Map one log entry onto a raw changeset
    pub fn map_entry(&self, entry: &CvsLogEntry) -> Result<ChangeSet> {
        let changes = entry
            .files
            .iter()
            .map(|file| self.map_file(file))
            .collect::<Result<Vec<_>>>()?;

        Ok(ChangeSet::new(commit_digest(entry), changes)
            .with_author(entry.author.clone())
            .with_message(entry.message.clone())
            .with_timestamp(entry.date)
            .with_tags(entry.tags.clone()))
    }

    fn map_file(&self, file: &CvsFileRecord) -> Result<Change> {
        let predecessor = cvs_predecessor(&file.revision)?;
        let entity = |revision: &str| Entity::file(&self.repository, &file.name, revision);

        if file.state == "dead" {
            // The delete marker is itself a revision; a dead 1.1 has nothing
            // before it and stands for itself.
            let previous = predecessor.as_deref().unwrap_or(file.revision.as_str());
            return Ok(Change::removed(entity(previous)));
        }

        if file.lines_added.is_none() && file.lines_removed.is_none() {
            return Ok(Change::added(entity(&file.revision)));
        }

        let previous = predecessor.ok_or_else(|| {
            HistoryError::malformed(format!(
                "{} modified at {} which has no predecessor",
                file.name, file.revision
            ))
        })?;
        Ok(Change::modified(entity(&previous), entity(&file.revision)))
    }
}

/// CVS has no commit ids: derive a stable one from the commit metadata
fn commit_digest(entry: &CvsLogEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.author.as_deref().unwrap_or_default().as_bytes());
    hasher.update(
        entry
            .date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
            .as_bytes(),
    );
    hasher.update(entry.message.as_deref().unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

impl<C: CvsClient> ContentSource for CvsHistory<C> {
    fn get_file_contents(&self, path: &str, revision: &Revision) -> Result<Vec<u8>> {
        tracing::trace!(path, %revision, "cvs checkout");
        self.client.checkout(path, &revision.to_string())
    }
}

impl<C: CvsClient> ChangeSetSource for CvsHistory<C> {
    /// `revision` is passed to `cvs log -r`; an empty string means `HEAD`
    fn get_changeset(&self, revision: &str) -> Result<ChangeSet> {
        let revision = if revision.is_empty() { "HEAD" } else { revision };
        tracing::trace!(revision, "cvs log");
        let entry = self.client.log(revision)?;
        self.map_entry(&entry)
    }

    fn walk_history(&self) -> Result<ChangeSetIter<'_>> {
        tracing::trace!("cvs log (all)");
        let entries = self.client.log_all()?;
        Ok(Box::new(
            entries.into_iter().map(move |entry| self.map_entry(&entry)),
        ))
    }
}

impl<C: CvsClient> HistoryBackend for CvsHistory<C> {
    fn backend_type(&self) -> BackendType {
        BackendType::Cvs
    }

    fn repository(&self) -> &RepositoryId {
        &self.repository
    }
}
