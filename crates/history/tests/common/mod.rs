//! In-memory clients standing in for the `cvs`, `svn` and `hg` executables.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use vcs_history::{
    BackendType, CvsClient, CvsLogEntry, HgClient, HgLogRecord, HgStatusEntry, HistoryError,
    Result, SvnClient, SvnLogEntry, SvnPathRecord,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("vcs_history=trace")
        .with_test_writer()
        .try_init();
}

fn missing(backend: BackendType, path: &str, revision: &str) -> HistoryError {
    HistoryError::backend(backend, format!("{path}: no such file at {revision}"))
}

// ============================================================================
// Subversion
// ============================================================================

#[derive(Default)]
pub struct MemorySvn {
    pub entries: Vec<SvnLogEntry>,
    pub files: HashMap<(String, u64), Vec<u8>>,
    pub reads: AtomicUsize,
}

impl MemorySvn {
    pub fn commit(mut self, revision: u64, paths: Vec<SvnPathRecord>) -> Self {
        self.entries.push(SvnLogEntry {
            revision,
            author: Some("svn-user".to_string()),
            message: Some(format!("r{revision}")),
            paths,
            ..Default::default()
        });
        self
    }

    pub fn file(mut self, path: &str, revision: u64, content: &str) -> Self {
        self.files
            .insert((path.to_string(), revision), content.as_bytes().to_vec());
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

pub fn svn_path(action: &str, path: &str) -> SvnPathRecord {
    SvnPathRecord {
        action: action.to_string(),
        path: path.to_string(),
        ..Default::default()
    }
}

pub fn svn_copy(path: &str, from: &str, from_rev: u64) -> SvnPathRecord {
    SvnPathRecord {
        copyfrom_path: Some(from.to_string()),
        copyfrom_rev: Some(from_rev),
        ..svn_path("A", path)
    }
}

impl SvnClient for MemorySvn {
    fn log(&self, revision: Option<u64>) -> Result<SvnLogEntry> {
        let found = match revision {
            Some(rev) => self.entries.iter().find(|e| e.revision == rev),
            None => self.entries.last(),
        };
        found.cloned().ok_or_else(|| {
            HistoryError::backend(BackendType::Subversion, "svn: E160006: No such revision")
        })
    }

    fn log_all(&self) -> Result<Vec<SvnLogEntry>> {
        Ok(self.entries.clone())
    }

    fn cat(&self, path: &str, revision: u64) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(&(path.to_string(), revision))
            .cloned()
            .ok_or_else(|| missing(BackendType::Subversion, path, &revision.to_string()))
    }

    fn proplist(&self, _path: &str, _revision: Option<u64>) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }
}

// ============================================================================
// Mercurial
// ============================================================================

#[derive(Default)]
pub struct MemoryHg {
    pub log: Vec<HgLogRecord>,
    pub status: HashMap<u64, Vec<HgStatusEntry>>,
    pub files: HashMap<(String, String), Vec<u8>>,
}

impl MemoryHg {
    pub fn commit(mut self, rev: u64, status: Vec<HgStatusEntry>) -> Self {
        self.log.push(HgLogRecord {
            rev,
            node: format!("{rev:040x}"),
            desc: Some(format!("changeset {rev}")),
            ..Default::default()
        });
        self.status.insert(rev, status);
        self
    }

    pub fn file(mut self, path: &str, rev: u64, content: &str) -> Self {
        self.files
            .insert((path.to_string(), rev.to_string()), content.as_bytes().to_vec());
        self
    }

    fn find(&self, revision: &str) -> Result<&HgLogRecord> {
        self.log
            .iter()
            .find(|r| r.node == revision || r.rev.to_string() == revision)
            .ok_or_else(|| {
                HistoryError::backend(
                    BackendType::Mercurial,
                    format!("abort: unknown revision '{revision}'"),
                )
            })
    }
}

impl HgClient for MemoryHg {
    fn log(&self, revision: Option<&str>) -> Result<HgLogRecord> {
        match revision {
            Some(revision) => self.find(revision).cloned(),
            None => self
                .log
                .last()
                .cloned()
                .ok_or_else(|| HistoryError::backend(BackendType::Mercurial, "empty repository")),
        }
    }

    fn log_all(&self) -> Result<Vec<HgLogRecord>> {
        Ok(self.log.clone())
    }

    fn status(&self, revision: &str) -> Result<Vec<HgStatusEntry>> {
        let rev = self.find(revision)?.rev;
        Ok(self.status.get(&rev).cloned().unwrap_or_default())
    }

    fn parents(&self, revision: &str) -> Result<Vec<HgLogRecord>> {
        let rev = self.find(revision)?.rev;
        Ok(self
            .log
            .iter()
            .filter(|r| Some(r.rev) == rev.checked_sub(1))
            .cloned()
            .collect())
    }

    fn cat(&self, path: &str, revision: &str) -> Result<Vec<u8>> {
        self.files
            .get(&(path.to_string(), revision.to_string()))
            .cloned()
            .ok_or_else(|| missing(BackendType::Mercurial, path, revision))
    }
}

// ============================================================================
// CVS
// ============================================================================

#[derive(Default)]
pub struct MemoryCvs {
    pub entries: Vec<CvsLogEntry>,
    pub reads: AtomicUsize,
}

impl CvsClient for MemoryCvs {
    fn log(&self, _revision: &str) -> Result<CvsLogEntry> {
        self.entries
            .last()
            .cloned()
            .ok_or_else(|| HistoryError::backend(BackendType::Cvs, "cvs log: nothing known"))
    }

    fn log_all(&self) -> Result<Vec<CvsLogEntry>> {
        Ok(self.entries.clone())
    }

    fn checkout(&self, path: &str, revision: &str) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(missing(BackendType::Cvs, path, revision))
    }
}
