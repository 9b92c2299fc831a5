//! Crawler module: candidate discovery and the archive crawl loop
//!
//! This module contains the core crawling logic, including:
//! - Paginated candidate discovery over a listing ([`CandidateDiscoverer`])
//! - The per-candidate fetch/extract/validate loop ([`ArchiveCrawler`])
//! - Wiring a configured source to both ([`run_source`])

mod archive;
mod discoverer;
mod runner;

pub use archive::{
    listing_unrecognized, ArchiveCrawler, ArticleRecord, CrawlLimits, CrawlResult, CutoffPolicy,
};
pub use discoverer::{CandidateDiscoverer, PaginationPolicy, StopPredicate};
pub use runner::{run_source, RunOptions, SourceRun};

pub use crate::config::{ListingOrder, PaginationMode};

use crate::state::DiscoveryEnd;
use crate::url::normalize_url;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;

/// A discovered, not yet validated reference to an article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRef {
    pub source_id: String,
    /// Normalized absolute URL; the dedup key
    pub url: String,
    /// Position in discovery order, starting at 1
    pub discovered_at_sequence: u64,
    /// Listing page the candidate was found on
    pub page_number: u32,
    /// Date printed next to the link on the listing, if any
    pub listing_date: Option<NaiveDate>,
}

impl CandidateRef {
    pub fn new(source_id: impl Into<String>, url: impl Into<String>, sequence: u64) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
            discovered_at_sequence: sequence,
            page_number: 1,
            listing_date: None,
        }
    }

    pub fn with_listing_date(mut self, date: NaiveDate) -> Self {
        self.listing_date = Some(date);
        self
    }
}

/// A finite, lazily produced sequence of candidates
#[async_trait]
pub trait CandidateSource: Send {
    /// Next candidate in discovery order, `None` once exhausted
    async fn next_candidate(&mut self) -> Option<CandidateRef>;

    /// Listing pages fetched so far
    fn pages_visited(&self) -> u32;

    /// Links extracted from listing pages so far, yielded or not
    fn links_found(&self) -> usize;

    /// Why the source stopped early; `None` if it simply ran out
    fn end_reason(&self) -> Option<DiscoveryEnd>;
}

/// A candidate source over a fixed list, e.g. a URL file or a test fixture
#[derive(Debug, Clone, Default)]
pub struct FixedCandidates {
    queue: VecDeque<CandidateRef>,
}

impl FixedCandidates {
    pub fn new(candidates: Vec<CandidateRef>) -> Self {
        Self {
            queue: candidates.into(),
        }
    }

    /// Builds candidates from raw URLs; unparseable ones are dropped
    pub fn from_urls<I, S>(source_id: &str, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let queue = urls
            .into_iter()
            .filter_map(|u| normalize_url(u.as_ref()).ok())
            .enumerate()
            .map(|(i, url)| CandidateRef::new(source_id, url.to_string(), i as u64 + 1))
            .collect();
        Self { queue }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl CandidateSource for FixedCandidates {
    async fn next_candidate(&mut self) -> Option<CandidateRef> {
        self.queue.pop_front()
    }

    fn pages_visited(&self) -> u32 {
        0
    }

    fn links_found(&self) -> usize {
        0
    }

    fn end_reason(&self) -> Option<DiscoveryEnd> {
        None
    }
}
