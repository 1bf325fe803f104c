//! Example: print the reconciled history of a Git repository
//!
//! Run with: cargo run --example walk_history --features git -- /path/to/repo

use std::collections::BTreeMap;
use std::path::PathBuf;
use vcs_history::{
    ChangeType, HistoryBackend, HistoryConfig, HistoryFactory, ReconcileOptions,
};

/// Per-action totals over a whole history
#[derive(Default)]
pub struct HistoryStats {
    changesets: usize,
    actions: BTreeMap<String, usize>,
}

impl HistoryStats {
    fn record(&mut self, action: ChangeType) {
        *self.actions.entry(action.to_string()).or_default() += 1;
    }
}

/// Walk every changeset, reconcile it and print its changes
pub fn walk(
    history: &dyn HistoryBackend,
    options: &ReconcileOptions,
) -> Result<HistoryStats, Box<dyn std::error::Error>> {
    let mut stats = HistoryStats::default();

    for changeset in history.walk_history()? {
        let changeset = vcs_history::optimize(changeset?, history, options)?;
        stats.changesets += 1;

        println!(
            "{} {}",
            changeset.identifier,
            changeset.summary().unwrap_or("(no message)")
        );
        for change in changeset.changes() {
            stats.record(change.action());
            println!("    {change}");
        }
    }

    Ok(stats)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = HistoryConfig {
        backend_type: HistoryFactory::detect(&path)?,
        path,
        reconcile: ReconcileOptions::default().with_workers(4),
    };
    let history = HistoryFactory::create(&config)?;
    println!("{}\n", history.description());

    let stats = walk(history.as_ref(), &config.reconcile)?;

    println!("\n{} changesets", stats.changesets);
    for (action, count) in &stats.actions {
        println!("  {action}: {count}");
    }

    Ok(())
}
