//! Statistics from the ledger database
//!
//! Backs `--stats`: ledger size per source, skip totals and recent runs.

use crate::ledger::{DeduplicationLedger, RunRecord, SqliteLedger};
use crate::state::SkipKind;
use crate::FurrowError;
use std::collections::BTreeMap;

/// Runs shown by [`print_statistics`]
const RECENT_RUNS: usize = 10;

/// Ledger statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// URLs in the ledger across all sources
    pub total_entries: u64,

    /// Ledger entries per source, largest first
    pub entries_by_source: Vec<(String, u64)>,

    /// Skipped candidates over all recorded runs
    pub skips_by_kind: BTreeMap<SkipKind, u64>,

    /// Most recent runs first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from the ledger
pub fn load_statistics(ledger: &SqliteLedger) -> Result<CrawlStatistics, FurrowError> {
    Ok(CrawlStatistics {
        total_entries: ledger.len()? as u64,
        entries_by_source: ledger.count_entries_by_source()?,
        skips_by_kind: ledger.count_skips_by_kind()?,
        recent_runs: ledger.get_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Furrow Ledger Statistics ===\n");

    println!("Ledger:");
    println!("  Articles archived: {}", stats.total_entries);
    for (source, count) in &stats.entries_by_source {
        println!("  {}: {}", source, count);
    }
    println!();

    if !stats.skips_by_kind.is_empty() {
        let total: u64 = stats.skips_by_kind.values().sum();
        println!("Skipped Candidates ({}):", total);
        for (kind, count) in &stats.skips_by_kind {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if stats.recent_runs.is_empty() {
        println!("No runs recorded.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        println!(
            "  #{} {} (worker {}) {} - {}: {} accepted, {} skipped, stop: {}",
            run.id,
            run.source_name,
            run.worker_id,
            run.started_at,
            run.status,
            run.accepted,
            run.skipped,
            run.stop_reason.as_deref().unwrap_or("-")
        );
    }
}
