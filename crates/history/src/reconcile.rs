//! Reconciliation of raw backend signals into richer change semantics.
//!
//! Backends report at most add/remove/modify/copy. Two inferences run over a
//! raw changeset, in order:
//!
//! 1. **Move**: a copy whose source path is removed in the same changeset is
//!    a move. Path equality only, no content access.
//! 2. **Derived**: a move or copy whose bytes differ from its source was
//!    modified before commit. Requires one content round-trip per side.
//!
//! Both scans are greedy and order-dependent; they work on indices into the
//! input list so the result is reproducible.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{HistoryError, Result};
use crate::traits::ContentSource;
use crate::types::{Change, ChangeSet, ChangeType, Entity};

/// Tuning for the content-comparison step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Worker threads used for content comparison. `1` compares inline.
    pub workers: usize,
    /// Aborts pending content fetches; aborted fetches surface as errors
    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            cancel: None,
        }
    }
}

impl ReconcileOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl ChangeSet {
    /// Reconcile with default options
    pub fn optimize<S: ContentSource + ?Sized>(self, source: &S) -> Result<ChangeSet> {
        optimize(self, source, &ReconcileOptions::default())
    }
}

/// Run move and derived inference over a raw changeset.
///
/// An already optimized changeset is returned unchanged. A content fetch
/// failure aborts the whole pass with [`HistoryError::ContentFetch`] and no
/// further content is fetched.
///
/// Every move or copy is compared, directories included. A source that
/// cannot read a directory (SVN `cat` on a branch or tag copy) fails the
/// pass; callers reconciling such revisions should skip `optimize` or use
/// a source that renders directories.
pub fn optimize<S: ContentSource + ?Sized>(
    changeset: ChangeSet,
    source: &S,
    options: &ReconcileOptions,
) -> Result<ChangeSet> {
    if changeset.is_optimized() {
        debug!(changeset = %changeset.identifier, "changeset already optimized, skipping");
        return Ok(changeset);
    }

    let identifier = changeset.identifier.clone();
    let raw = changeset.changes().to_vec();
    let raw_len = raw.len();

    let mut changes = infer_moves(raw);
    let moves = raw_len - changes.len();
    let derived = infer_derived(&mut changes, source, options)?;

    debug!(
        changeset = %identifier,
        consumed_removes = moves,
        derived,
        "reconciled changeset"
    );
    Ok(changeset.into_optimized(changes))
}

/// Promote copies whose source path is also removed to moves, dropping the
/// matched removes.
///
/// Each copy consumes the first matching remove. Several copies of the same
/// source all match that same remove, so one source may fan out to several
/// moves.
fn infer_moves(mut changes: Vec<Change>) -> Vec<Change> {
    let mut copies = Vec::new();
    let mut removes = Vec::new();
    for (index, change) in changes.iter().enumerate() {
        match change.action() {
            ChangeType::Copy => copies.push(index),
            ChangeType::Remove => removes.push(index),
            _ => {}
        }
    }

    let mut consumed = vec![false; changes.len()];
    let mut promoted = Vec::new();
    for &copy in &copies {
        let Some(source_path) = changes[copy].first_previous().map(Entity::path) else {
            continue;
        };
        let matched = removes
            .iter()
            .copied()
            .find(|&remove| {
                changes[remove].first_previous().map(Entity::path) == Some(source_path)
            });
        if let Some(remove) = matched {
            trace!(path = source_path, "copy with removed source becomes move");
            promoted.push(copy);
            consumed[remove] = true;
        }
    }

    for index in promoted {
        changes[index].reclassify(ChangeType::Move);
    }

    changes
        .into_iter()
        .zip(consumed)
        .filter_map(|(change, consumed)| (!consumed).then_some(change))
        .collect()
}

/// Reclassify moves and copies whose content differs from their source.
/// Returns the number of changes marked derived.
fn infer_derived<S: ContentSource + ?Sized>(
    changes: &mut [Change],
    source: &S,
    options: &ReconcileOptions,
) -> Result<usize> {
    let candidates: Vec<usize> = changes
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c.action(), ChangeType::Move | ChangeType::Copy))
        .map(|(index, _)| index)
        .collect();

    let outcomes = compare_all(changes, &candidates, source, options)?;

    let mut derived = 0;
    for (index, differs) in candidates.into_iter().zip(outcomes) {
        if differs {
            changes[index].reclassify(ChangeType::Derived);
            derived += 1;
        }
    }
    Ok(derived)
}

/// Compare every candidate, returning outcomes in candidate order no matter
/// which worker finished first.
///
/// The first failure stops all further fetches. With several workers the
/// reported error is the first in input order among the candidates that
/// were actually compared.
fn compare_all<S: ContentSource + ?Sized>(
    changes: &[Change],
    candidates: &[usize],
    source: &S,
    options: &ReconcileOptions,
) -> Result<Vec<bool>> {
    let cancel = options.cancel.as_ref();
    let workers = options.workers.clamp(1, candidates.len().max(1));

    if workers == 1 {
        return candidates
            .iter()
            .map(|&index| content_differs(&changes[index], source, cancel))
            .collect();
    }

    let aborted = AtomicBool::new(false);
    let chunk_size = candidates.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .chunks(chunk_size)
            .map(|chunk| {
                let aborted = &aborted;
                scope.spawn(move || compare_chunk(changes, chunk, source, cancel, aborted))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut first_error = None;
        for handle in handles {
            let chunk = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            match chunk {
                Ok(Some(chunk)) => outcomes.extend(chunk),
                Ok(None) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    })
}

/// Compare one worker's share of candidates. Returns `Ok(None)` when another
/// worker failed first.
fn compare_chunk<S: ContentSource + ?Sized>(
    changes: &[Change],
    chunk: &[usize],
    source: &S,
    cancel: Option<&CancellationToken>,
    aborted: &AtomicBool,
) -> Result<Option<Vec<bool>>> {
    let mut outcomes = Vec::with_capacity(chunk.len());
    for &index in chunk {
        if aborted.load(Ordering::Acquire) {
            return Ok(None);
        }
        match content_differs(&changes[index], source, cancel) {
            Ok(differs) => outcomes.push(differs),
            Err(err) => {
                aborted.store(true, Ordering::Release);
                return Err(err);
            }
        }
    }
    Ok(Some(outcomes))
}

fn content_differs<S: ContentSource + ?Sized>(
    change: &Change,
    source: &S,
    cancel: Option<&CancellationToken>,
) -> Result<bool> {
    let (Some(previous), Some(current)) = (change.first_previous(), change.current()) else {
        return Err(HistoryError::malformed(format!(
            "{} change without both sides",
            change.action()
        )));
    };

    let before = fetch(previous, source, cancel)?;
    let after = fetch(current, source, cancel)?;
    Ok(before != after)
}

fn fetch<S: ContentSource + ?Sized>(
    entity: &Entity,
    source: &S,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<u8>> {
    let ensure_live = || match cancel {
        Some(token) if token.is_cancelled() => Err(HistoryError::Cancelled),
        _ => Ok(()),
    };

    ensure_live()
        .and_then(|_| entity.read(source))
        .and_then(|bytes| ensure_live().map(|_| bytes))
        .map_err(|e| HistoryError::content_fetch(entity.path(), entity.revision(), e))
}
