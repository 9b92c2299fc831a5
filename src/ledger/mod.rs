//! Deduplication ledger
//!
//! This module tracks which article URLs have already been turned into
//! records, so that re-runs and resumed runs only fetch what is new:
//! - [`DeduplicationLedger`]: the contains/record interface the crawler uses
//! - [`SqliteLedger`]: durable ledger plus run history and skip log
//! - [`MemoryLedger`]: in-process ledger, optionally seeded from TXT archives

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::{scan_archive_urls, MemoryLedger};
pub use sqlite::{RunRecord, SkipRecord, SqliteLedger};
pub use traits::{DeduplicationLedger, LedgerError, LedgerResult};

use std::path::Path;

/// Opens or creates the ledger database at `path`
pub fn open_ledger(path: &Path) -> LedgerResult<SqliteLedger> {
    SqliteLedger::new(path)
}
