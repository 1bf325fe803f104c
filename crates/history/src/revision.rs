//! Predecessor computation for each revision-addressing scheme.
//!
//! These are pure functions; adapters call them while mapping log records.
//!
//! - branch-tree (CVS): dotted-decimal arithmetic, see [`cvs_predecessor`]
//! - global-sequence (SVN): decrement, see [`svn_predecessor`]
//! - DAG (Git) and flat-status (Mercurial): the first reported parent,
//!   see [`first_parent`]

use crate::error::{HistoryError, Result};
use crate::types::Revision;

/// Predecessor of a CVS dotted-decimal revision, or `None` for the first
/// revision on the trunk.
///
/// See <http://www.astro.princeton.edu/~rhl/cvs-branches.html> for the
/// numbering scheme. `1.1` → none, `1.5` → `1.4`, `1.3.0.2` (branch point
/// marker) → `1.3`, `1.3.2.4` → `1.3.2.3`. Any other branch revision
/// only has its last component decremented, so `1.3.2.1` → `1.3.2.0`.
pub fn cvs_predecessor(revision: &str) -> Result<Option<String>> {
    let mut components = parse_dotted(revision)?;

    if let [major, minor] = components[..] {
        return Ok(match minor {
            0 | 1 => None,
            _ => Some(format!("{major}.{}", minor - 1)),
        });
    }

    let n = components.len();
    if n % 2 == 1 {
        // Odd-length numbers name branches, not revisions.
        return Err(HistoryError::RevisionArithmetic(revision.to_string()));
    }
    let (second_last, last) = (components[n - 2], components[n - 1]);
    if second_last == 0 && last == 2 {
        // Start of a branch: the predecessor lives on the parent line.
        components.truncate(n - 2);
    } else if last == 0 {
        return Err(HistoryError::RevisionArithmetic(revision.to_string()));
    } else {
        components[n - 1] -= 1;
    }

    Ok(Some(join_dotted(&components)))
}

/// Predecessor of an SVN repository revision
pub fn svn_predecessor(revision: u64) -> Result<u64> {
    revision
        .checked_sub(1)
        .ok_or_else(|| HistoryError::RevisionArithmetic(revision.to_string()))
}

/// Predecessor in schemes where the backend reports parents directly.
///
/// Only the first parent is considered; merge parents beyond it are not
/// diffed.
pub fn first_parent(parents: &[Revision]) -> Option<Revision> {
    parents.first().cloned()
}

fn parse_dotted(revision: &str) -> Result<Vec<u64>> {
    let components = revision
        .split('.')
        .map(|c| c.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| HistoryError::RevisionArithmetic(revision.to_string()))?;

    if components.len() < 2 {
        return Err(HistoryError::RevisionArithmetic(revision.to_string()));
    }
    Ok(components)
}

fn join_dotted(components: &[u64]) -> String {
    components
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
