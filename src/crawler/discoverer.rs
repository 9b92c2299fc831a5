//! Paginated candidate discovery
//!
//! Listing pages are fetched lazily: a page is only requested once every
//! candidate from the previous one has been consumed, so a crawl that stops
//! early never pays for listing pages it does not need.

use crate::config::{PaginationMode, SourceConfig};
use crate::crawler::{CandidateRef, CandidateSource};
use crate::dates::DateNormalizer;
use crate::extract::ExtractionRules;
use crate::fetch::{FetchFailureKind, FetchPolicy, FetchPort};
use crate::state::DiscoveryEnd;
use crate::url::{listing_page_url, normalize_url, resolve_candidate};
use crate::UrlError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Predicate that ends discovery before the candidate it is given
pub type StopPredicate = Box<dyn Fn(&CandidateRef) -> bool + Send + Sync>;

/// Bounds and stop conditions for one discovery pass
pub struct PaginationPolicy {
    pub mode: PaginationMode,
    /// Relative path of page N, `{n}` replaced by the number
    pub page_path_template: String,
    /// First page to fetch; pages before it belong to another worker
    pub start_page: u32,
    /// Last page this worker owns, inclusive
    pub end_page: Option<u32>,
    pub max_pages: Option<u32>,
    pub max_candidates: Option<usize>,
    pub stop_predicate: Option<StopPredicate>,
}

impl PaginationPolicy {
    /// Policy taken from a source's configuration, starting at page 1
    pub fn from_source(source: &SourceConfig) -> Self {
        Self {
            mode: source.pagination,
            page_path_template: source.page_path_template.clone(),
            start_page: 1,
            end_page: None,
            max_pages: source.max_pages,
            max_candidates: source.max_candidates,
            stop_predicate: None,
        }
    }

    /// Restricts discovery to pages `start..=end`
    pub fn with_page_range(mut self, start: u32, end: Option<u32>) -> Self {
        self.start_page = start.max(1);
        self.end_page = end;
        self
    }

    pub fn with_stop_predicate(mut self, predicate: StopPredicate) -> Self {
        self.stop_predicate = Some(predicate);
        self
    }

    /// Stops at the first candidate whose listing date is before `cutoff`
    ///
    /// Candidates without a listing date never trigger it.
    pub fn stop_before(self, cutoff: NaiveDate) -> Self {
        self.with_stop_predicate(Box::new(move |candidate: &CandidateRef| {
            candidate.listing_date.map_or(false, |date| date < cutoff)
        }))
    }
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            mode: PaginationMode::default(),
            page_path_template: "page/{n}/".to_string(),
            start_page: 1,
            end_page: None,
            max_pages: None,
            max_candidates: None,
            stop_predicate: None,
        }
    }
}

impl fmt::Debug for PaginationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationPolicy")
            .field("mode", &self.mode)
            .field("page_path_template", &self.page_path_template)
            .field("start_page", &self.start_page)
            .field("end_page", &self.end_page)
            .field("max_pages", &self.max_pages)
            .field("max_candidates", &self.max_candidates)
            .field("stop_predicate", &self.stop_predicate.is_some())
            .finish()
    }
}

/// Walks a paginated listing and yields candidates in discovery order
///
/// Discovery ends, with the matching [`DiscoveryEnd`], when:
/// - a page yields no candidate that was not already seen in this pass
/// - there is no next page (next-link mode)
/// - `max_pages`, `max_candidates` or the end of the page range is reached
/// - the stop predicate fires
/// - a listing page fails after the fetcher's own retries
///
/// A 4xx answer on any page but the first is read as the end of the listing.
/// A failed listing page always ends discovery; later pages are never
/// fetched past a gap.
pub struct CandidateDiscoverer<'a, F, R> {
    source_id: String,
    listing_url: Url,
    fetcher: &'a F,
    rules: &'a R,
    fetch_policy: FetchPolicy,
    policy: PaginationPolicy,
    listing_dates: Option<DateNormalizer>,

    buffer: VecDeque<CandidateRef>,
    seen: HashSet<String>,
    next_page: Option<(u32, String)>,
    pages_visited: u32,
    links_found: usize,
    yielded: usize,
    sequence: u64,
    /// End to report once the buffer is drained
    pending_end: Option<DiscoveryEnd>,
    end: Option<DiscoveryEnd>,
}

impl<'a, F, R> CandidateDiscoverer<'a, F, R>
where
    F: FetchPort,
    R: ExtractionRules,
{
    pub fn new(
        source_id: impl Into<String>,
        listing_url: &str,
        fetcher: &'a F,
        rules: &'a R,
        fetch_policy: FetchPolicy,
        policy: PaginationPolicy,
    ) -> Result<Self, UrlError> {
        let listing_url = normalize_url(listing_url)?;
        let start = policy.start_page.max(1);

        let first = listing_page_url(&listing_url, &policy.page_path_template, start)
            .ok_or_else(|| {
                UrlError::Malformed(format!(
                    "cannot build page {} from {}",
                    start, policy.page_path_template
                ))
            })?;

        let pending_end = match policy.end_page {
            Some(end) if end < start => Some(DiscoveryEnd::PageRangeEnd),
            _ => None,
        };

        Ok(Self {
            source_id: source_id.into(),
            listing_url,
            fetcher,
            rules,
            fetch_policy,
            policy,
            listing_dates: None,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            next_page: if pending_end.is_some() {
                None
            } else {
                Some((start, first))
            },
            pages_visited: 0,
            links_found: 0,
            yielded: 0,
            sequence: 0,
            pending_end,
            end: None,
        })
    }

    /// Parses dates shown in the listing with `normalizer`
    pub fn with_listing_dates(mut self, normalizer: DateNormalizer) -> Self {
        self.listing_dates = Some(normalizer);
        self
    }

    /// Candidates yielded so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    async fn load_next_page(&mut self) {
        let Some((page, url)) = self.next_page.take() else {
            self.pending_end = Some(DiscoveryEnd::NoNextPage);
            return;
        };

        debug!("Fetching listing page {} ({})", page, url);
        let fetched = match self.fetcher.fetch(&url, &self.fetch_policy).await {
            Ok(fetched) => fetched,
            // Past the last page most sites answer 404
            Err(failure) if failure.kind == FetchFailureKind::Rejected && self.pages_visited > 0 => {
                info!(
                    "{}: listing page {} rejected ({}); treating it as the last page",
                    self.source_id, page, failure
                );
                self.pending_end = Some(DiscoveryEnd::NoNextPage);
                return;
            }
            Err(failure) => {
                warn!(
                    page,
                    error = %failure,
                    "Listing page failed for {}; ending discovery", self.source_id
                );
                self.pending_end = Some(DiscoveryEnd::ListingFetchFailed {
                    page,
                    kind: failure.kind,
                });
                return;
            }
        };
        self.pages_visited += 1;

        let base = Url::parse(&fetched.final_url).unwrap_or_else(|_| self.listing_url.clone());
        let entries = self.rules.extract_candidates(&fetched.body);
        let found = entries.len();
        self.links_found += found;

        let mut fresh = 0;
        for entry in entries {
            let Some(url) = resolve_candidate(&entry.url, &base) else {
                continue;
            };
            if !self.seen.insert(url.clone()) {
                continue;
            }

            let listing_date = match (self.listing_dates, entry.date_text.as_deref()) {
                (Some(normalizer), Some(text)) => normalizer.parse(text).ok(),
                _ => None,
            };

            self.sequence += 1;
            fresh += 1;
            self.buffer.push_back(CandidateRef {
                source_id: self.source_id.clone(),
                url,
                discovered_at_sequence: self.sequence,
                page_number: page,
                listing_date,
            });
        }

        info!(
            "{}: listing page {} had {} links, {} new",
            self.source_id, page, found, fresh
        );

        if fresh == 0 {
            self.pending_end = Some(DiscoveryEnd::NoNewCandidates);
            return;
        }

        self.pending_end = self.plan_next_page(page, &fetched.body, &base);
    }

    /// Sets up the following page, or returns why there is none
    fn plan_next_page(&mut self, page: u32, body: &str, base: &Url) -> Option<DiscoveryEnd> {
        if let Some(max) = self.policy.max_pages {
            if self.pages_visited >= max {
                return Some(DiscoveryEnd::MaxPages);
            }
        }

        let next = page + 1;
        if let Some(end) = self.policy.end_page {
            if next > end {
                return Some(DiscoveryEnd::PageRangeEnd);
            }
        }

        let explicit = || {
            self.rules
                .next_page(body)
                .and_then(|href| resolve_candidate(&href, base))
        };
        let templated = || listing_page_url(&self.listing_url, &self.policy.page_path_template, next);

        let url = match self.policy.mode {
            PaginationMode::NextLink => explicit(),
            PaginationMode::PageNumber => templated(),
            PaginationMode::Auto => explicit().or_else(templated),
        };

        match url {
            Some(url) => {
                self.next_page = Some((next, url));
                None
            }
            None => Some(DiscoveryEnd::NoNextPage),
        }
    }
}

#[async_trait]
impl<'a, F, R> CandidateSource for CandidateDiscoverer<'a, F, R>
where
    F: FetchPort,
    R: ExtractionRules,
{
    async fn next_candidate(&mut self) -> Option<CandidateRef> {
        loop {
            if self.end.is_some() {
                return None;
            }

            if let Some(max) = self.policy.max_candidates {
                if self.yielded >= max {
                    self.end = Some(DiscoveryEnd::MaxCandidates);
                    return None;
                }
            }

            if let Some(candidate) = self.buffer.pop_front() {
                let stop = self
                    .policy
                    .stop_predicate
                    .as_ref()
                    .map_or(false, |predicate| predicate(&candidate));
                if stop {
                    debug!("Stop predicate fired at {}", candidate.url);
                    self.buffer.clear();
                    self.end = Some(DiscoveryEnd::StopPredicate);
                    return None;
                }

                self.yielded += 1;
                return Some(candidate);
            }

            if let Some(end) = self.pending_end.take() {
                self.end = Some(end);
                return None;
            }

            self.load_next_page().await;
        }
    }

    fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    fn links_found(&self) -> usize {
        self.links_found
    }

    /// `None` only while discovery is still running
    fn end_reason(&self) -> Option<DiscoveryEnd> {
        self.end
    }
}
