//! Backend adapters, one per version-control system.
//!
//! Each adapter maps its backend's tokenized log records onto the canonical
//! model and resolves historical content. CVS, Subversion and Mercurial
//! adapters obtain records from a caller-supplied client; the Git adapter
//! reads the repository through libgit2.

pub mod cvs;
#[cfg(feature = "git")]
pub mod git;
pub mod hg;
pub mod svn;
