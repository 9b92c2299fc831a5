use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The set of URLs that have already been resolved into records
///
/// Entries are only ever added after a record was accepted and handed to the
/// output, so dropping a run at any point leaves the ledger consistent.
pub trait DeduplicationLedger {
    /// Returns true if `url` was accepted by this or an earlier run
    fn contains(&self, url: &str) -> LedgerResult<bool>;

    /// Marks `url` as resolved; recording a known URL is a no-op
    fn record(&mut self, url: &str, source_name: &str) -> LedgerResult<()>;

    /// Number of resolved URLs
    fn len(&self) -> LedgerResult<usize>;

    fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T: DeduplicationLedger + ?Sized> DeduplicationLedger for &mut T {
    fn contains(&self, url: &str) -> LedgerResult<bool> {
        (**self).contains(url)
    }

    fn record(&mut self, url: &str, source_name: &str) -> LedgerResult<()> {
        (**self).record(url, source_name)
    }

    fn len(&self) -> LedgerResult<usize> {
        (**self).len()
    }
}
