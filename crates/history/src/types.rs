use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{HistoryError, Result};
use crate::traits::ContentSource;

/// Identity of one repository.
///
/// Entities carry a copy of this handle instead of a reference to the
/// adapter, so comparing two entities never requires backend access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryId(String);

impl RepositoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-specific revision identifier.
///
/// Opaque outside of the adapter that produced it: SVN and Mercurial local
/// revisions are numbers, CVS dotted-decimal revisions and Git commit ids
/// are strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Revision {
    Number(u64),
    Id(String),
}

impl Revision {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Revision::Number(n) => Some(*n),
            Revision::Id(_) => None,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Number(n) => write!(f, "{n}"),
            Revision::Id(id) => write!(f, "{id}"),
        }
    }
}

impl From<u64> for Revision {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for Revision {
    fn from(s: String) -> Self {
        Self::Id(s)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Self::Id(s.to_string())
    }
}

/// Kind of versioned object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    File,
    Directory,
}

/// One versioned object at one point in history.
///
/// Two entities are equal when repository, path and revision are equal;
/// kind and tags are descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    repository: RepositoryId,
    path: String,
    revision: Revision,
    #[serde(default)]
    kind: EntityKind,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
}

impl Entity {
    pub fn new(
        repository: RepositoryId,
        path: impl Into<String>,
        revision: impl Into<Revision>,
        kind: EntityKind,
    ) -> Self {
        Self {
            repository,
            path: path.into(),
            revision: revision.into(),
            kind,
            tags: BTreeSet::new(),
        }
    }

    /// Shorthand for a file entity
    pub fn file(
        repository: &RepositoryId,
        path: impl Into<String>,
        revision: impl Into<Revision>,
    ) -> Self {
        Self::new(repository.clone(), path, revision, EntityKind::File)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Fetch this entity's content through the backend that owns it
    pub fn read<S: ContentSource + ?Sized>(&self, source: &S) -> Result<Vec<u8>> {
        source.get_file_contents(&self.path, &self.revision)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.repository == other.repository
            && self.path == other.path
            && self.revision == other.revision
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repository.hash(state);
        self.path.hash(state);
        self.revision.hash(state);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.revision)
    }
}

/// What happened to one item within a changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Created with no known origin
    Add,
    Remove,
    /// Contents modified in place
    Modify,
    /// Copied, and the source was removed in the same changeset
    Move,
    /// Copied from an existing path
    Copy,
    /// Copied or moved, then modified before commit
    Derived,
}

impl ChangeType {
    /// True for actions that carry a source path and a destination path
    pub fn is_transfer(self) -> bool {
        matches!(self, ChangeType::Move | ChangeType::Copy | ChangeType::Derived)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeType::Add => "add",
            ChangeType::Remove => "remove",
            ChangeType::Modify => "modify",
            ChangeType::Move => "move",
            ChangeType::Copy => "copy",
            ChangeType::Derived => "derived",
        };
        f.write_str(name)
    }
}

/// One transition of one logical item.
///
/// Constructors enforce the shape of each action: `Add` has no previous
/// entity, `Remove` has no current entity, everything else has both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChangeRecord")]
pub struct Change {
    action: ChangeType,
    previous: Vec<Entity>,
    current: Option<Entity>,
}

#[derive(Deserialize)]
struct ChangeRecord {
    action: ChangeType,
    #[serde(default)]
    previous: Vec<Entity>,
    current: Option<Entity>,
}

impl TryFrom<ChangeRecord> for Change {
    type Error = HistoryError;

    fn try_from(record: ChangeRecord) -> Result<Self> {
        Change::new(record.action, record.previous, record.current)
    }
}

impl Change {
    /// Build a change, validating the action against the entities given
    pub fn new(action: ChangeType, previous: Vec<Entity>, current: Option<Entity>) -> Result<Self> {
        let valid = match action {
            ChangeType::Add => previous.is_empty() && current.is_some(),
            ChangeType::Remove => !previous.is_empty() && current.is_none(),
            _ => !previous.is_empty() && current.is_some(),
        };
        if !valid {
            return Err(HistoryError::malformed(format!(
                "{action} with {} previous entities and {} current entity",
                previous.len(),
                if current.is_some() { "a" } else { "no" },
            )));
        }
        Ok(Self {
            action,
            previous,
            current,
        })
    }

    pub fn added(current: Entity) -> Self {
        Self {
            action: ChangeType::Add,
            previous: Vec::new(),
            current: Some(current),
        }
    }

    pub fn removed(previous: Entity) -> Self {
        Self {
            action: ChangeType::Remove,
            previous: vec![previous],
            current: None,
        }
    }

    pub fn modified(previous: Entity, current: Entity) -> Self {
        Self::transition(ChangeType::Modify, previous, current)
    }

    pub fn copied(previous: Entity, current: Entity) -> Self {
        Self::transition(ChangeType::Copy, previous, current)
    }

    pub fn moved(previous: Entity, current: Entity) -> Self {
        Self::transition(ChangeType::Move, previous, current)
    }

    pub fn derived(previous: Entity, current: Entity) -> Self {
        Self::transition(ChangeType::Derived, previous, current)
    }

    fn transition(action: ChangeType, previous: Entity, current: Entity) -> Self {
        Self {
            action,
            previous: vec![previous],
            current: Some(current),
        }
    }

    /// Attach another provenance entity (e.g. a merge source).
    ///
    /// Fails for `Add`, which by definition has no previous entity.
    pub fn with_previous(mut self, entity: Entity) -> Result<Self> {
        if self.action == ChangeType::Add {
            return Err(HistoryError::malformed(format!(
                "cannot attach previous entity {entity} to an add"
            )));
        }
        self.previous.push(entity);
        Ok(self)
    }

    pub fn action(&self) -> ChangeType {
        self.action
    }

    pub fn previous(&self) -> &[Entity] {
        &self.previous
    }

    pub fn first_previous(&self) -> Option<&Entity> {
        self.previous.first()
    }

    pub fn current(&self) -> Option<&Entity> {
        self.current.as_ref()
    }

    /// Reclassify between actions that share the same shape
    pub(crate) fn reclassify(&mut self, action: ChangeType) {
        debug_assert!(self.action.is_transfer() && action.is_transfer());
        self.action = action;
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.action, self.previous.first(), self.current.as_ref()) {
            (ChangeType::Add, _, Some(cur)) => {
                write!(f, "Added {} (current rev: {})", cur.path(), cur.revision())
            }
            (ChangeType::Remove, Some(prev), _) => {
                write!(f, "Removed {} (last rev: {})", prev.path(), prev.revision())
            }
            (ChangeType::Modify, Some(prev), Some(cur)) => write!(
                f,
                "Modified {} ({} ==> {})",
                cur.path(),
                prev.revision(),
                cur.revision()
            ),
            (ChangeType::Move, Some(prev), Some(cur)) => write!(f, "Moved {prev} ==> {cur}"),
            (ChangeType::Copy, Some(prev), Some(cur)) => write!(f, "Copied {prev} ==> {cur}"),
            (ChangeType::Derived, Some(prev), Some(cur)) => write!(f, "Derived {cur} from {prev}"),
            (action, _, _) => write!(f, "{action}"),
        }
    }
}

/// Whether a changeset has been through reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileState {
    #[default]
    Raw,
    Optimized,
}

/// All changes belonging to one revision/commit, plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub identifier: Revision,
    pub author: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    changes: Vec<Change>,
    #[serde(default)]
    state: ReconcileState,
}

impl ChangeSet {
    pub fn new(identifier: impl Into<Revision>, changes: Vec<Change>) -> Self {
        Self {
            identifier: identifier.into(),
            author: None,
            message: None,
            timestamp: None,
            tags: Vec::new(),
            changes,
            state: ReconcileState::Raw,
        }
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn is_optimized(&self) -> bool {
        self.state == ReconcileState::Optimized
    }

    /// First line of the message
    pub fn summary(&self) -> Option<&str> {
        self.message.as_deref().and_then(|m| m.lines().next())
    }

    /// Number of changes with the given action
    pub fn count(&self, action: ChangeType) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// Replace the change list with its reconciled form
    pub(crate) fn into_optimized(mut self, changes: Vec<Change>) -> Self {
        self.changes = changes;
        self.state = ReconcileState::Optimized;
        self
    }
}
