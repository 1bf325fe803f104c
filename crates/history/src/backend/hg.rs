//! Mercurial backend (flat status lists).
//!
//! A revision's changes come from `hg status --change REV --copies`. Copy
//! sources appear as entries with a blank code, each immediately followed
//! by the entry of its destination.

use chrono::{DateTime, Utc};

use crate::error::{HistoryError, Result};
use crate::factory::BackendType;
use crate::revision::first_parent;
use crate::traits::*;
use crate::types::*;

/// Client for a Mercurial repository (typically a wrapper around `hg log`,
/// `hg status` and `hg cat`)
pub trait HgClient: Send + Sync {
    /// Log record of one revision; `None` means `tip`
    fn log(&self, revision: Option<&str>) -> Result<HgLogRecord>;

    /// Every log record, oldest first
    fn log_all(&self) -> Result<Vec<HgLogRecord>>;

    /// Status entries of one revision, copy sources before their destination
    fn status(&self, revision: &str) -> Result<Vec<HgStatusEntry>>;

    /// Parents of a revision, first parent first
    fn parents(&self, revision: &str) -> Result<Vec<HgLogRecord>>;

    fn cat(&self, path: &str, revision: &str) -> Result<Vec<u8>>;
}

/// One revision as reported by `hg log`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HgLogRecord {
    /// Local revision number
    pub rev: u64,
    /// Full changeset hash
    pub node: String,
    pub tags: Vec<String>,
    pub branch: Option<String>,
    pub author: Option<String>,
    pub desc: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// One line of `hg status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HgStatusEntry {
    /// `A`, `M`, `R`, or `' '` for a copy source
    pub code: char,
    pub path: String,
}

impl HgStatusEntry {
    pub fn new(code: char, path: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
        }
    }
}

/// Map the status list of one revision onto raw changes.
///
/// `R` yields a Remove whose previous entity sits at `revision` itself
/// rather than at the first parent. Consumers comparing removed entities
/// across backends should account for this.
pub fn map_status(
    repository: &RepositoryId,
    revision: u64,
    first_parent: Option<u64>,
    entries: &[HgStatusEntry],
) -> Result<Vec<Change>> {
    let entity = |path: &str, revision: u64| Entity::file(repository, path, revision);
    let parent = |entry: &HgStatusEntry| {
        first_parent.ok_or_else(|| {
            HistoryError::malformed(format!(
                "'{}' {} in revision {revision} which has no parent",
                entry.code, entry.path
            ))
        })
    };

    let mut changes = Vec::with_capacity(entries.len());
    let mut entries = entries.iter();
    while let Some(entry) = entries.next() {
        let change = match entry.code {
            ' ' => {
                let destination = match entries.next() {
                    Some(next) if next.code != ' ' => next,
                    _ => {
                        return Err(HistoryError::malformed(format!(
                            "copy source {} in revision {revision} has no destination",
                            entry.path
                        )))
                    }
                };
                Change::copied(
                    entity(&entry.path, parent(entry)?),
                    entity(&destination.path, revision),
                )
            }
            'A' => Change::added(entity(&entry.path, revision)),
            'M' => Change::modified(
                entity(&entry.path, parent(entry)?),
                entity(&entry.path, revision),
            ),
            'R' => Change::removed(entity(&entry.path, revision)),
            other => {
                return Err(HistoryError::malformed(format!(
                    "unknown hg status '{other}' for {} in revision {revision}",
                    entry.path
                )))
            }
        };
        changes.push(change);
    }
    Ok(changes)
}

/// Mercurial implementation of a history backend
pub struct HgHistory<C> {
    client: C,
    repository: RepositoryId,
}

impl<C: HgClient> HgHistory<C> {
    /// Wrap a client; `location` is the repository root or URL
    pub fn new(client: C, location: &str) -> Self {
        Self {
            client,
            repository: BackendType::Mercurial.repository_id(location),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn map_record(&self, record: &HgLogRecord) -> Result<ChangeSet> {
        tracing::trace!(rev = record.rev, node = %record.node, "hg status");
        let entries = self.client.status(&record.node)?;
        let parents: Vec<Revision> = self
            .client
            .parents(&record.node)?
            .iter()
            .map(|parent| Revision::from(parent.rev))
            .collect();
        let first_parent = first_parent(&parents).and_then(|rev| rev.as_number());

        let changes = map_status(&self.repository, record.rev, first_parent, &entries)?;
        Ok(ChangeSet::new(record.rev, changes)
            .with_author(record.author.clone())
            .with_message(record.desc.clone())
            .with_timestamp(record.date)
            .with_tags(record.tags.clone()))
    }
}

impl<C: HgClient> ContentSource for HgHistory<C> {
    fn get_file_contents(&self, path: &str, revision: &Revision) -> Result<Vec<u8>> {
        tracing::trace!(path, %revision, "hg cat");
        self.client.cat(path, &revision.to_string())
    }
}

impl<C: HgClient> ChangeSetSource for HgHistory<C> {
    /// Accepts any Mercurial revision expression; empty means `tip`
    fn get_changeset(&self, revision: &str) -> Result<ChangeSet> {
        let revision = Some(revision).filter(|r| !r.is_empty());
        tracing::trace!(?revision, "hg log");
        let record = self.client.log(revision)?;
        self.map_record(&record)
    }

    fn walk_history(&self) -> Result<ChangeSetIter<'_>> {
        tracing::trace!("hg log (all)");
        let records = self.client.log_all()?;
        Ok(Box::new(
            records.into_iter().map(move |record| self.map_record(&record)),
        ))
    }
}

impl<C: HgClient> HistoryBackend for HgHistory<C> {
    fn backend_type(&self) -> BackendType {
        BackendType::Mercurial
    }

    fn repository(&self) -> &RepositoryId {
        &self.repository
    }
}
