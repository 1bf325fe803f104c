//! Git backend (commit DAG).
//!
//! This module wraps git2 to read history. Each commit is diffed against its
//! first parent only; merge commits therefore report what the merge brought
//! into the first-parent line.

use chrono::DateTime;
use git2::{Commit, Delta, DiffDelta, DiffFindOptions, ObjectType, Oid, Repository, Sort};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::error::{HistoryError, Result};
use crate::factory::BackendType;
use crate::traits::*;
use crate::types::*;

/// One delta of a first-parent diff.
///
/// `code` is `A`, `D`, `M`, `R` optionally followed by the similarity
/// score, or another status letter the adapter does not map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitDiffRecord {
    pub code: String,
    pub old_path: String,
    pub new_path: String,
    pub old_blob: String,
    pub new_blob: String,
}

/// Blob listing of one parent commit's tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentTree {
    pub commit: String,
    /// `(path, blob id)` in tree traversal order
    pub blobs: Vec<(String, String)>,
}

impl ParentTree {
    fn find_blob(&self, blob: &str) -> Option<&str> {
        self.blobs
            .iter()
            .find(|(_, id)| id == blob)
            .map(|(path, _)| path.as_str())
    }
}

/// Map the deltas of one commit onto raw changes.
///
/// `first_parent` is `None` for root commits. `load_parents` lists the
/// trees of every parent, in parent order; it is only called when an added
/// file needs a copy source, and at most once.
pub fn map_diff_records<F>(
    repository: &RepositoryId,
    commit: &str,
    first_parent: Option<&str>,
    records: &[GitDiffRecord],
    mut load_parents: F,
) -> Result<Vec<Change>>
where
    F: FnMut() -> Result<Vec<ParentTree>>,
{
    let entity = |path: &str, revision: &str| Entity::file(repository, path, revision);
    let parent = |record: &GitDiffRecord| {
        first_parent.ok_or_else(|| {
            HistoryError::malformed(format!(
                "{} '{}' in root commit {commit}",
                record.code, record.old_path
            ))
        })
    };
    let mut parents: Option<Vec<ParentTree>> = None;

    let mut changes = Vec::with_capacity(records.len());
    for record in records {
        let mut chars = record.code.chars();
        let letter = chars.next();
        let score = chars.as_str();

        let change = match (letter, score) {
            (Some('A'), "") => {
                if parents.is_none() {
                    parents = Some(load_parents()?);
                }
                let current = entity(&record.new_path, commit);
                let source = parents.iter().flatten().find_map(|tree| {
                    tree.find_blob(&record.new_blob)
                        .map(|path| entity(path, &tree.commit))
                });
                match source {
                    Some(previous) => Change::copied(previous, current),
                    None => Change::added(current),
                }
            }
            (Some('D'), "") => Change::removed(entity(&record.old_path, parent(record)?)),
            (Some('M'), "") => Change::modified(
                entity(&record.old_path, parent(record)?),
                entity(&record.new_path, commit),
            ),
            (Some('R'), score) => {
                let similarity = if score.is_empty() {
                    None
                } else {
                    Some(score.parse::<u8>().map_err(|_| {
                        HistoryError::malformed(format!("bad rename score in '{}'", record.code))
                    })?)
                };
                let previous = entity(&record.old_path, parent(record)?);
                let current = entity(&record.new_path, commit);
                if similarity == Some(100) || record.old_blob == record.new_blob {
                    Change::moved(previous, current)
                } else {
                    Change::derived(previous, current)
                }
            }
            _ => {
                return Err(HistoryError::malformed(format!(
                    "unknown action '{}' for {} in {commit}",
                    record.code, record.new_path
                )))
            }
        };
        changes.push(change);
    }
    Ok(changes)
}

/// Git implementation of a history backend
pub struct GitHistory {
    path: PathBuf,
    repository: RepositoryId,
    repo: Mutex<Repository>,
}

impl GitHistory {
    /// Open the repository at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)?;
        Ok(Self::from_git2(repo))
    }

    /// Create a GitHistory from an existing git2::Repository
    pub fn from_git2(repo: Repository) -> Self {
        let path = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        let repository = BackendType::Git.repository_id(&path.display().to_string());
        Self {
            path,
            repository,
            repo: Mutex::new(repo),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_commit(&self, repo: &Repository, commit: &Commit<'_>) -> Result<ChangeSet> {
        let first_parent = if commit.parent_count() > 0 {
            Some(commit.parent(0)?)
        } else {
            None
        };
        let parent_tree = first_parent.as_ref().map(|p| p.tree()).transpose()?;
        let tree = commit.tree()?;

        let mut diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;
        let records = diff
            .deltas()
            .map(|delta| diff_record(&delta))
            .collect::<Result<Vec<_>>>()?;

        let commit_id = commit.id().to_string();
        let parent_id = first_parent.as_ref().map(|p| p.id().to_string());
        tracing::trace!(commit = %commit_id, deltas = records.len(), "git diff");

        let changes = map_diff_records(
            &self.repository,
            &commit_id,
            parent_id.as_deref(),
            &records,
            || parent_trees(commit),
        )?;

        Ok(ChangeSet::new(commit_id, changes)
            .with_author(commit.author().name().map(String::from))
            .with_message(commit.message().map(String::from))
            .with_timestamp(DateTime::from_timestamp(commit.time().seconds(), 0))
            .with_tags(tags_pointing_at(repo, commit.id())?))
    }
}

fn diff_record(delta: &DiffDelta<'_>) -> Result<GitDiffRecord> {
    let code = match delta.status() {
        Delta::Added => "A",
        Delta::Deleted => "D",
        Delta::Modified => "M",
        Delta::Renamed => "R",
        Delta::Copied => "C",
        Delta::Typechange => "T",
        _ => "X",
    };
    let path = |file: git2::DiffFile<'_>| -> Result<String> {
        file.path()
            .and_then(|p| p.to_str())
            .map(String::from)
            .ok_or_else(|| HistoryError::malformed("non UTF-8 path in git diff"))
    };
    Ok(GitDiffRecord {
        code: code.to_string(),
        old_path: path(delta.old_file())?,
        new_path: path(delta.new_file())?,
        old_blob: delta.old_file().id().to_string(),
        new_blob: delta.new_file().id().to_string(),
    })
}

fn parent_trees(commit: &Commit<'_>) -> Result<Vec<ParentTree>> {
    commit
        .parents()
        .map(|parent| -> Result<ParentTree> {
            let mut blobs = Vec::new();
            parent.tree()?.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(ObjectType::Blob) {
                    if let Some(name) = entry.name() {
                        blobs.push((format!("{root}{name}"), entry.id().to_string()));
                    }
                }
                git2::TreeWalkResult::Ok
            })?;
            Ok(ParentTree {
                commit: parent.id().to_string(),
                blobs,
            })
        })
        .collect()
}

fn tags_pointing_at(repo: &Repository, oid: Oid) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    for reference in repo.references_glob("refs/tags/*")? {
        let reference = reference?;
        let Ok(target) = reference.peel_to_commit() else {
            continue;
        };
        if target.id() == oid {
            if let Some(name) = reference.shorthand() {
                tags.push(name.to_string());
            }
        }
    }
    Ok(tags)
}

impl ContentSource for GitHistory {
    fn get_file_contents(&self, path: &str, revision: &Revision) -> Result<Vec<u8>> {
        tracing::trace!(path, %revision, "git blob");
        let repo = self.repo.lock();
        let commit = repo
            .revparse_single(&revision.to_string())?
            .peel_to_commit()?;
        let entry = commit.tree()?.get_path(Path::new(path))?;
        let blob = repo.find_blob(entry.id())?;
        Ok(blob.content().to_vec())
    }
}

impl ChangeSetSource for GitHistory {
    /// Accepts anything `git rev-parse` resolves to a commit; empty means
    /// `HEAD`
    fn get_changeset(&self, revision: &str) -> Result<ChangeSet> {
        let revision = if revision.is_empty() { "HEAD" } else { revision };
        let repo = self.repo.lock();
        let commit = repo.revparse_single(revision)?.peel_to_commit()?;
        let changeset = self.map_commit(&repo, &commit)?;
        Ok(changeset)
    }

    /// Commits reachable from any local branch, parents before children
    fn walk_history(&self) -> Result<ChangeSetIter<'_>> {
        let oids = {
            let repo = self.repo.lock();
            let mut revwalk = repo.revwalk()?;
            revwalk.push_glob("refs/heads/*")?;
            revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
            revwalk.collect::<std::result::Result<Vec<_>, _>>()?
        };
        tracing::trace!(commits = oids.len(), "git revwalk");

        Ok(Box::new(oids.into_iter().map(move |oid| -> Result<ChangeSet> {
            let repo = self.repo.lock();
            let commit = repo.find_commit(oid)?;
            let changeset = self.map_commit(&repo, &commit)?;
            Ok(changeset)
        })))
    }
}

impl HistoryBackend for GitHistory {
    fn backend_type(&self) -> BackendType {
        BackendType::Git
    }

    fn repository(&self) -> &RepositoryId {
        &self.repository
    }
}
