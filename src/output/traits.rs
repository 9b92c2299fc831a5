//! Output traits and run summary types

use crate::crawler::{ArticleRecord, CrawlResult};
use crate::state::{SkipKind, SkippedCandidate};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives accepted records in discovery order
pub trait RecordSink {
    /// Persists one record; an error aborts the run
    fn emit(&mut self, record: &ArticleRecord) -> OutputResult<()>;

    /// Flushes anything buffered
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

impl RecordSink for Vec<ArticleRecord> {
    fn emit(&mut self, record: &ArticleRecord) -> OutputResult<()> {
        self.push(record.clone());
        Ok(())
    }
}

impl<T: RecordSink + ?Sized> RecordSink for &mut T {
    fn emit(&mut self, record: &ArticleRecord) -> OutputResult<()> {
        (**self).emit(record)
    }

    fn finish(&mut self) -> OutputResult<()> {
        (**self).finish()
    }
}

/// Per-run report handed to the operator
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub source_name: String,
    pub run_id: Option<i64>,
    pub worker_id: u32,
    pub pages_visited: u32,
    pub candidates_found: usize,
    pub accepted: usize,
    pub skipped_by_reason: BTreeMap<SkipKind, usize>,
    pub stop_reason: Option<String>,
    pub cutoff_reached: bool,
    pub limit_reached: bool,
    pub skipped: Vec<SkippedCandidate>,
}

impl RunSummary {
    pub fn from_result(
        source_name: &str,
        run_id: Option<i64>,
        worker_id: u32,
        result: &CrawlResult,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            run_id,
            worker_id,
            pages_visited: result.cursor.pages_visited,
            candidates_found: result.cursor.candidates_seen,
            accepted: result.accepted.len(),
            skipped_by_reason: result.skipped_by_reason(),
            stop_reason: result.cursor.stop_reason.map(|r| r.to_string()),
            cutoff_reached: result.cursor.cutoff_reached,
            limit_reached: result.cursor.limit_reached,
            skipped: result.skipped.clone(),
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_by_reason.values().sum()
    }

    /// Skips an operator should look at: fetch failures and markup mismatches
    pub fn actionable_skips(&self) -> usize {
        self.skipped_by_reason
            .iter()
            .filter(|(kind, _)| kind.is_transient() || kind.is_data_quality())
            .map(|(_, count)| count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SkipReason, StopReason};

    #[test]
    fn test_summary_from_result() {
        let mut result = CrawlResult::default();
        result.cursor.candidates_seen = 4;
        result.cursor.pages_visited = 1;
        result.skipped = vec![
            SkippedCandidate::new("https://example.com/a/", SkipReason::AlreadyProcessed),
            SkippedCandidate::new(
                "https://example.com/b/",
                SkipReason::UnparseableDate {
                    text: "soon".to_string(),
                },
            ),
            SkippedCandidate::new("https://example.com/c/", SkipReason::AlreadyProcessed),
        ];
        result.cursor.finish(StopReason::LimitReached);

        let summary = RunSummary::from_result("demo", Some(7), 1, &result);

        assert_eq!(summary.candidates_found, 4);
        assert_eq!(summary.total_skipped(), 3);
        assert_eq!(summary.actionable_skips(), 1);
        assert_eq!(
            summary.skipped_by_reason.get(&SkipKind::AlreadyProcessed),
            Some(&2)
        );
        assert_eq!(summary.stop_reason.as_deref(), Some("limit_reached"));
        assert!(summary.limit_reached);
    }
}
