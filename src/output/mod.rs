//! Output module for persisting records and reporting runs
//!
//! This module handles:
//! - The [`RecordSink`] interface accepted records are written through
//! - The TXT + CSV-fragment archive ([`ArchiveWriter`])
//! - Merging fragments from partitioned workers ([`merge_fragments`])
//! - Markdown run summaries and ledger statistics

mod archive;
mod markdown;
mod merge;
pub mod stats;
mod traits;

pub use archive::{
    articles_dir, format_txt, fragments_dir, sanitize_filename, ArchiveWriter, CsvRow,
};
pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use merge::{merge_fragments, MergeReport};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{OutputError, OutputResult, RecordSink, RunSummary};
