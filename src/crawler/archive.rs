//! The archive crawl loop
//!
//! [`ArchiveCrawler::run`] takes candidates in discovery order and turns each
//! into either an accepted [`ArticleRecord`] or a [`SkipReason`], until one
//! stop condition ends the run.

use crate::config::ListingOrder;
use crate::crawler::{CandidateRef, CandidateSource};
use crate::dates::DateNormalizer;
use crate::extract::ExtractionRules;
use crate::fetch::{FetchPolicy, FetchPort};
use crate::ledger::DeduplicationLedger;
use crate::output::RecordSink;
use crate::state::{
    CrawlCursor, DiscoveryEnd, SkipKind, SkipReason, SkippedCandidate, StopReason,
};
use crate::FurrowError;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A validated article, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub url: String,
    pub canonical_date: Option<NaiveDate>,
    pub title: String,
    pub author: Option<String>,
    pub tags: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
    pub source_name: String,
}

impl ArticleRecord {
    /// Body length in characters
    pub fn body_char_count(&self) -> usize {
        self.body.chars().count()
    }
}

/// Oldest acceptable date and how far the listing order can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CutoffPolicy {
    pub cutoff_date: Option<NaiveDate>,
    pub ordering: ListingOrder,
}

impl CutoffPolicy {
    pub fn new(cutoff_date: Option<NaiveDate>, ordering: ListingOrder) -> Self {
        Self {
            cutoff_date,
            ordering,
        }
    }

    /// No cutoff at all
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_older(&self, date: NaiveDate) -> bool {
        self.cutoff_date.map_or(false, |cutoff| date < cutoff)
    }

    /// True when an old item ends the run rather than being filtered
    pub fn stops_run(&self) -> bool {
        self.ordering == ListingOrder::ReverseChronological
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlLimits {
    pub max_items: Option<usize>,
}

impl CrawlLimits {
    pub fn new(max_items: Option<usize>) -> Self {
        Self { max_items }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub accepted: Vec<ArticleRecord>,
    pub skipped: Vec<SkippedCandidate>,
    pub cursor: CrawlCursor,
}

impl CrawlResult {
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.cursor.stop_reason
    }

    pub fn skipped_by_reason(&self) -> BTreeMap<SkipKind, usize> {
        let mut counts = BTreeMap::new();
        for skip in &self.skipped {
            *counts.entry(skip.reason.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// One-line outcome for logs
    pub fn summary(&self) -> String {
        format!(
            "{} accepted, {} skipped, {} candidates over {} pages, stop: {}",
            self.accepted.len(),
            self.skipped.len(),
            self.cursor.candidates_seen,
            self.cursor.pages_visited,
            self.cursor
                .stop_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}

/// True when a run should be reported as an unrecognized listing
///
/// That is a run that fetched listing pages, extracted not a single link
/// from them, and had nothing in the ledger for this source beforehand. A
/// resumed run finding nothing new is a success, and so is a listing whose
/// newest entry is already past the cutoff. A listing that could not be
/// fetched at all is reported by its own stop reason.
pub fn listing_unrecognized(result: &CrawlResult, ledger_was_empty: bool) -> bool {
    ledger_was_empty
        && result.cursor.links_found == 0
        && result.cursor.pages_visited > 0
        && !result
            .cursor
            .stop_reason
            .map_or(false, |r| r.is_listing_failure())
}

/// Outcome of evaluating one candidate
enum Verdict {
    Accept(ArticleRecord),
    Skip(SkipReason),
    /// Dated before the cutoff
    Old(NaiveDate),
}

/// Drives candidates through fetch, extraction and validation
///
/// The fetcher and the ledger are usually borrowed (`&F`, `&mut L`) so the
/// caller can share the fetcher with a [`CandidateDiscoverer`](crate::crawler::CandidateDiscoverer)
/// and close the run in the ledger afterwards.
pub struct ArchiveCrawler<F, L> {
    fetcher: F,
    ledger: L,
    normalizer: DateNormalizer,
    fetch_policy: FetchPolicy,
    min_text_length: usize,
    cancel: Arc<AtomicBool>,
}

impl<F, L> ArchiveCrawler<F, L>
where
    F: FetchPort,
    L: DeduplicationLedger,
{
    pub fn new(fetcher: F, ledger: L, normalizer: DateNormalizer, fetch_policy: FetchPolicy) -> Self {
        Self {
            fetcher,
            ledger,
            normalizer,
            fetch_policy,
            min_text_length: 0,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Minimum body length for pages carrying media markers
    pub fn with_min_text_length(mut self, min_text_length: usize) -> Self {
        self.min_text_length = min_text_length;
        self
    }

    /// Flag checked between candidates; setting it ends the run as `Cancelled`
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Runs until the candidates run out or a stop condition is met
    ///
    /// Accepted records are handed to `sink` before their URL is written to
    /// the ledger. Ledger and sink failures abort the run; everything about a
    /// single candidate becomes a skip.
    pub async fn run<C, R, S>(
        &mut self,
        candidates: &mut C,
        rules: &R,
        cutoff: &CutoffPolicy,
        limits: &CrawlLimits,
        sink: &mut S,
    ) -> Result<CrawlResult, FurrowError>
    where
        C: CandidateSource + ?Sized,
        R: ExtractionRules + ?Sized,
        S: RecordSink + ?Sized,
    {
        let mut cursor = CrawlCursor::new();
        let mut accepted = Vec::new();
        let mut skipped = Vec::new();
        let mut attempted: HashSet<String> = HashSet::new();

        let stop = loop {
            if self.cancel.load(Ordering::SeqCst) {
                info!("Cancellation requested; stopping between candidates");
                break StopReason::Cancelled;
            }

            if let Some(max) = limits.max_items {
                if cursor.candidates_accepted >= max {
                    break StopReason::LimitReached;
                }
            }

            let Some(candidate) = candidates.next_candidate().await else {
                cursor.pages_visited = candidates.pages_visited();
                cursor.links_found = candidates.links_found();
                break match candidates.end_reason() {
                    None | Some(DiscoveryEnd::NoNextPage | DiscoveryEnd::NoNewCandidates) => {
                        StopReason::NoMoreCandidates
                    }
                    Some(DiscoveryEnd::StopPredicate) => StopReason::CutoffReached,
                    Some(end) => StopReason::DiscoveryHalted(end),
                };
            };
            cursor.candidates_seen += 1;
            cursor.pages_visited = candidates.pages_visited();
            cursor.links_found = candidates.links_found();

            let url = candidate.url.clone();
            if self.ledger.contains(&url)? || !attempted.insert(url.clone()) {
                debug!("Already processed: {}", url);
                skipped.push(SkippedCandidate::new(url, SkipReason::AlreadyProcessed));
                continue;
            }

            match self.evaluate(&candidate, rules, cutoff).await {
                Verdict::Accept(record) => {
                    sink.emit(&record)?;
                    self.ledger.record(&record.url, &record.source_name)?;
                    cursor.candidates_accepted += 1;
                    info!(
                        "Accepted [{}] {} ({})",
                        cursor.candidates_accepted,
                        record.title,
                        record
                            .canonical_date
                            .map(|d| d.to_string())
                            .unwrap_or_default()
                    );
                    accepted.push(record);
                }
                Verdict::Skip(reason) => {
                    warn!("Skipped {}: {}", url, reason);
                    skipped.push(SkippedCandidate::new(url, reason));
                }
                Verdict::Old(date) => {
                    cursor.cutoff_reached = true;
                    if cutoff.stops_run() {
                        info!("{} is dated {}, before the cutoff; stopping", url, date);
                        break StopReason::CutoffReached;
                    }
                    debug!("{} is dated {}, before the cutoff; skipping", url, date);
                    skipped.push(SkippedCandidate::new(
                        url,
                        SkipReason::OlderThanCutoff { date },
                    ));
                }
            }
        };

        cursor.finish(stop);

        let result = CrawlResult {
            accepted,
            skipped,
            cursor,
        };
        info!("Run finished: {}", result.summary());
        Ok(result)
    }

    async fn evaluate<R>(&self, candidate: &CandidateRef, rules: &R, cutoff: &CutoffPolicy) -> Verdict
    where
        R: ExtractionRules + ?Sized,
    {
        // A dated listing entry is judged before its page is fetched
        if let Some(date) = candidate.listing_date {
            if cutoff.is_older(date) {
                return Verdict::Old(date);
            }
        }

        debug!("Fetching {}", candidate.url);
        let page = match self.fetcher.fetch(&candidate.url, &self.fetch_policy).await {
            Ok(page) => page,
            Err(failure) => {
                return Verdict::Skip(SkipReason::FetchFailed {
                    kind: failure.kind,
                    message: failure.message,
                })
            }
        };

        let article = rules.extract_article(&page.body);

        let date = match article.date_text.as_deref() {
            Some(text) => match self.normalizer.parse(text) {
                Ok(date) => date,
                Err(_) => {
                    return Verdict::Skip(SkipReason::UnparseableDate {
                        text: text.to_string(),
                    })
                }
            },
            None => match candidate.listing_date {
                Some(date) => date,
                None => return Verdict::Skip(SkipReason::MissingMandatoryField { field: "date" }),
            },
        };

        if cutoff.is_older(date) {
            return Verdict::Old(date);
        }

        let Some(title) = article.title.filter(|t| !t.trim().is_empty()) else {
            return Verdict::Skip(SkipReason::MissingMandatoryField { field: "title" });
        };

        let chars = article.body_text.chars().count();
        if article.has_media_markers && chars < self.min_text_length {
            return Verdict::Skip(SkipReason::InsufficientText {
                chars,
                minimum: self.min_text_length,
            });
        }
        if chars == 0 {
            return Verdict::Skip(SkipReason::MissingMandatoryField { field: "body" });
        }

        Verdict::Accept(ArticleRecord {
            url: candidate.url.clone(),
            canonical_date: Some(date),
            title,
            author: article.author,
            tags: article.tags.into_iter().collect(),
            categories: article.categories.into_iter().collect(),
            body: article.body_text,
            fetched_at: Utc::now(),
            source_name: candidate.source_id.clone(),
        })
    }
}
