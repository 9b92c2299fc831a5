//! Runs one configured source end to end
//!
//! [`run_source`] compiles the source's selectors, builds a discoverer over
//! its listing, drives the [`ArchiveCrawler`] into a sink and keeps the run
//! row in the ledger database up to date.

use crate::config::{CrawlerConfig, SourceConfig};
use crate::crawler::{
    listing_unrecognized, ArchiveCrawler, CandidateDiscoverer, CrawlLimits, CrawlResult,
    CutoffPolicy, PaginationPolicy,
};
use crate::dates::DateNormalizer;
use crate::extract::SelectorRules;
use crate::fetch::{FetchPolicy, FetchPort};
use crate::ledger::SqliteLedger;
use crate::output::{RecordSink, RunSummary};
use crate::state::{CrawlCursor, RunStatus};
use crate::FurrowError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-invocation settings layered over a source's configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Identifies this worker when several split one listing
    pub worker_id: u32,
    pub start_page: u32,
    pub end_page: Option<u32>,
    /// Overrides the source's `max-items`
    pub max_items: Option<usize>,
    /// Fingerprint of the configuration file, stored on the run row
    pub config_hash: String,
    pub cancel: Arc<AtomicBool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            worker_id: 0,
            start_page: 1,
            end_page: None,
            max_items: None,
            config_hash: String::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A finished run of one source
#[derive(Debug, Clone)]
pub struct SourceRun {
    pub run_id: i64,
    pub source_name: String,
    pub worker_id: u32,
    pub status: RunStatus,
    pub result: CrawlResult,
}

impl SourceRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_result(
            &self.source_name,
            Some(self.run_id),
            self.worker_id,
            &self.result,
        )
    }
}

/// Crawls `source` into `sink`, recording the run in `ledger`
///
/// Returns [`FurrowError::ListingUnrecognized`] when the listing was fetched
/// but yielded nothing on a source with no earlier records; the run row is
/// closed as `failed` in that case.
pub async fn run_source<F, S>(
    crawler_config: &CrawlerConfig,
    source: &SourceConfig,
    options: &RunOptions,
    fetcher: &F,
    ledger: &mut SqliteLedger,
    sink: &mut S,
) -> Result<SourceRun, FurrowError>
where
    F: FetchPort,
    S: RecordSink + ?Sized,
{
    let rules = SelectorRules::from_config(&source.selectors)?;
    let normalizer = DateNormalizer::new(source.date_locale);
    let fetch_policy = FetchPolicy::from_config(crawler_config);
    let cutoff = CutoffPolicy::new(source.cutoff, source.ordering);
    let limits = CrawlLimits::new(options.max_items.or(source.max_items));

    let mut pagination = PaginationPolicy::from_source(source)
        .with_page_range(options.start_page, options.end_page);
    if let (Some(date), true) = (source.cutoff, cutoff.stops_run()) {
        pagination = pagination.stop_before(date);
    }

    let mut discoverer = CandidateDiscoverer::new(
        source.name.as_str(),
        &source.listing_url,
        fetcher,
        &rules,
        fetch_policy,
        pagination,
    )?
    .with_listing_dates(normalizer);

    let ledger_was_empty = ledger.count_for_source(&source.name)? == 0;
    let run_id = ledger.begin_run(&source.name, options.worker_id, &options.config_hash)?;
    info!(
        "Run {} started for {} (worker {}, pages {}..{})",
        run_id,
        source.name,
        options.worker_id,
        options.start_page,
        options
            .end_page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "end".to_string())
    );

    let outcome = {
        let mut crawler = ArchiveCrawler::new(fetcher, &mut *ledger, normalizer, fetch_policy)
            .with_min_text_length(source.min_text_length)
            .with_cancel_flag(Arc::clone(&options.cancel));
        crawler
            .run(&mut discoverer, &rules, &cutoff, &limits, &mut *sink)
            .await
    };

    let result = match outcome.and_then(|result| {
        sink.finish()?;
        Ok(result)
    }) {
        Ok(result) => result,
        Err(e) => {
            error!("Run {} for {} aborted: {}", run_id, source.name, e);
            abandon_run(ledger, run_id);
            return Err(e);
        }
    };

    let unrecognized = listing_unrecognized(&result, ledger_was_empty);
    let status = if unrecognized {
        RunStatus::Failed
    } else {
        result
            .cursor
            .stop_reason
            .map_or(RunStatus::Completed, |reason| {
                RunStatus::from_stop_reason(&reason)
            })
    };

    ledger.finish_run(run_id, status, &result.cursor, &result.skipped)?;
    info!("{}: {} ({})", source.name, result.summary(), status);

    if unrecognized {
        error!(
            "{}: listing at {} yielded no candidates on a fresh ledger",
            source.name, source.listing_url
        );
        return Err(FurrowError::ListingUnrecognized {
            source_name: source.name.clone(),
            url: source.listing_url.clone(),
        });
    }

    Ok(SourceRun {
        run_id,
        source_name: source.name.clone(),
        worker_id: options.worker_id,
        status,
        result,
    })
}

/// Closes a run row as failed without losing the original error
fn abandon_run(ledger: &mut SqliteLedger, run_id: i64) {
    if let Err(e) = ledger.finish_run(run_id, RunStatus::Failed, &CrawlCursor::new(), &[]) {
        warn!("Could not close run {}: {}", run_id, e);
    }
}
