//! Subversion backend (global-sequence revisions).
//!
//! Every commit gets the next integer revision, so a path's predecessor is
//! simply the previous repository revision. Copies are reported as `A` with
//! `copyfrom` metadata; replace (`R`) is approximated as a modify because
//! the canonical model has no replace primitive.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{HistoryError, Result};
use crate::factory::BackendType;
use crate::revision::svn_predecessor;
use crate::traits::*;
use crate::types::*;

/// Client for a Subversion repository (typically a wrapper around
/// `svn log --xml --verbose` and `svn cat`)
pub trait SvnClient: Send + Sync {
    /// Single log entry; `None` means `HEAD`
    fn log(&self, revision: Option<u64>) -> Result<SvnLogEntry>;

    /// Every log entry, in the order the client reports them
    fn log_all(&self) -> Result<Vec<SvnLogEntry>>;

    fn cat(&self, path: &str, revision: u64) -> Result<Vec<u8>>;

    /// Versioned properties of `path`; `None` means `HEAD`
    fn proplist(&self, path: &str, revision: Option<u64>) -> Result<BTreeMap<String, String>>;
}

/// One `<logentry>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvnLogEntry {
    pub revision: u64,
    /// SVN does not require author, date or message
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub paths: Vec<SvnPathRecord>,
    /// Nested entries reported by `svn log --use-merge-history`
    pub merged: Vec<SvnLogEntry>,
}

/// One `<path>` inside a log entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvnPathRecord {
    /// `A`, `D`, `M` or `R`
    pub action: String,
    /// Repository-absolute path, e.g. `/trunk/a.txt`
    pub path: String,
    pub kind: EntityKind,
    pub copyfrom_path: Option<String>,
    pub copyfrom_rev: Option<u64>,
}

/// Subversion implementation of a history backend
///
/// Content is read with `svn cat`, which cannot render directories, so
/// optimizing a revision that copies a directory (branch or tag creation)
/// fails with [`HistoryError::ContentFetch`].
pub struct SvnHistory<C> {
    client: C,
    repository: RepositoryId,
}

impl<C: SvnClient> SvnHistory<C> {
    /// Wrap a client; `location` is the repository URL
    pub fn new(client: C, location: &str) -> Self {
        Self {
            client,
            repository: BackendType::Subversion.repository_id(location),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Versioned properties of a path
    pub fn get_properties(
        &self,
        path: &str,
        revision: Option<&Revision>,
    ) -> Result<BTreeMap<String, String>> {
        let revision = revision.map(numeric_revision).transpose()?;
        tracing::trace!(path, ?revision, "svn proplist");
        self.client.proplist(path, revision)
    }

    /// Map one log entry onto a raw changeset
    pub fn map_entry(&self, entry: &SvnLogEntry) -> Result<ChangeSet> {
        let merged_from = highest_merged_revision(entry);

        let changes = entry
            .paths
            .iter()
            .map(|record| {
                let change = self.map_path(record, entry.revision)?;
                match merged_from {
                    Some(merged) if !change.previous().is_empty() => {
                        let path = strip_root(&record.path);
                        let source =
                            Entity::new(self.repository.clone(), path, merged, record.kind);
                        change.with_previous(source)
                    }
                    _ => Ok(change),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChangeSet::new(entry.revision, changes)
            .with_author(entry.author.clone())
            .with_message(entry.message.clone())
            .with_timestamp(entry.date))
    }

    fn map_path(&self, record: &SvnPathRecord, revision: u64) -> Result<Change> {
        let path = strip_root(&record.path);
        let entity = |path: &str, revision: u64| {
            Entity::new(self.repository.clone(), path, revision, record.kind)
        };

        // Copies are reported as `A` (or `R`) but carry copyfrom metadata.
        if let Some(copyfrom_path) = &record.copyfrom_path {
            let copyfrom_rev = record.copyfrom_rev.ok_or_else(|| {
                HistoryError::malformed(format!(
                    "{path}@{revision} copied from {copyfrom_path} without a source revision"
                ))
            })?;
            return Ok(Change::copied(
                entity(strip_root(copyfrom_path), copyfrom_rev),
                entity(path, revision),
            ));
        }

        match record.action.as_str() {
            "A" => Ok(Change::added(entity(path, revision))),
            "D" => Ok(Change::removed(entity(path, svn_predecessor(revision)?))),
            "M" | "R" => Ok(Change::modified(
                entity(path, svn_predecessor(revision)?),
                entity(path, revision),
            )),
            other => Err(HistoryError::malformed(format!(
                "unknown svn action '{other}' for {path}@{revision}"
            ))),
        }
    }
}

fn strip_root(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Highest revision among (recursively) nested merge entries
fn highest_merged_revision(entry: &SvnLogEntry) -> Option<u64> {
    entry
        .merged
        .iter()
        .map(|merged| {
            highest_merged_revision(merged)
                .map_or(merged.revision, |nested| nested.max(merged.revision))
        })
        .max()
}

fn numeric_revision(revision: &Revision) -> Result<u64> {
    match revision {
        Revision::Number(n) => Ok(*n),
        Revision::Id(id) => id
            .parse()
            .map_err(|_| HistoryError::malformed(format!("unparsable svn revision '{id}'"))),
    }
}

/// `HEAD` or an empty string mean the youngest revision
fn parse_revision_arg(revision: &str) -> Result<Option<u64>> {
    match revision.trim() {
        "" | "HEAD" => Ok(None),
        other => other
            .strip_prefix('r')
            .unwrap_or(other)
            .parse()
            .map(Some)
            .map_err(|_| HistoryError::malformed(format!("unparsable svn revision '{revision}'"))),
    }
}

impl<C: SvnClient> ContentSource for SvnHistory<C> {
    fn get_file_contents(&self, path: &str, revision: &Revision) -> Result<Vec<u8>> {
        let revision = numeric_revision(revision)?;
        tracing::trace!(path, revision, "svn cat");
        self.client.cat(path, revision)
    }
}

impl<C: SvnClient> ChangeSetSource for SvnHistory<C> {
    /// Accepts `HEAD`, `N` or `rN`
    fn get_changeset(&self, revision: &str) -> Result<ChangeSet> {
        let revision = parse_revision_arg(revision)?;
        tracing::trace!(?revision, "svn log");
        let entry = self.client.log(revision)?;
        self.map_entry(&entry)
    }

    fn walk_history(&self) -> Result<ChangeSetIter<'_>> {
        tracing::trace!("svn log (all)");
        let entries = self.client.log_all()?;
        Ok(Box::new(
            entries.into_iter().map(move |entry| self.map_entry(&entry)),
        ))
    }
}

impl<C: SvnClient> HistoryBackend for SvnHistory<C> {
    fn backend_type(&self) -> BackendType {
        BackendType::Subversion
    }

    fn repository(&self) -> &RepositoryId {
        &self.repository
    }
}
