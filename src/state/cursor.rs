use crate::fetch::FetchFailureKind;
use std::fmt;

/// Why candidate discovery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryEnd {
    /// A listing page produced nothing that had not been seen already
    NoNewCandidates,
    /// Next-link pagination found no "next" control
    NoNextPage,
    /// `max_pages` listing pages were visited
    MaxPages,
    /// `max_candidates` candidates were yielded
    MaxCandidates,
    /// The worker's assigned page range is done
    PageRangeEnd,
    /// The stop predicate fired on a listing-level date
    StopPredicate,
    /// A listing page failed after all retries
    ListingFetchFailed { page: u32, kind: FetchFailureKind },
}

impl DiscoveryEnd {
    pub fn to_db_string(&self) -> String {
        match self {
            Self::NoNewCandidates => "no_new_candidates".to_string(),
            Self::NoNextPage => "no_next_page".to_string(),
            Self::MaxPages => "max_pages".to_string(),
            Self::MaxCandidates => "max_candidates".to_string(),
            Self::PageRangeEnd => "page_range_end".to_string(),
            Self::StopPredicate => "stop_predicate".to_string(),
            Self::ListingFetchFailed { page, kind } => {
                format!("listing_fetch_failed(page={}, {})", page, kind)
            }
        }
    }
}

impl fmt::Display for DiscoveryEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

/// The single condition that ended a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The listing ran out and every candidate was processed
    NoMoreCandidates,
    /// `max_items` records were accepted
    LimitReached,
    /// An item older than the cutoff was reached on a newest-first listing
    CutoffReached,
    /// Discovery hit a bound (pages, candidates, page range) or a listing failure
    DiscoveryHalted(DiscoveryEnd),
    /// Stopped between candidates by the operator
    Cancelled,
}

impl StopReason {
    /// Returns true if the run ended because of a listing fetch failure
    pub fn is_listing_failure(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryHalted(DiscoveryEnd::ListingFetchFailed { .. })
        )
    }

    pub fn to_db_string(&self) -> String {
        match self {
            Self::NoMoreCandidates => "no_more_candidates".to_string(),
            Self::LimitReached => "limit_reached".to_string(),
            Self::CutoffReached => "cutoff_reached".to_string(),
            Self::DiscoveryHalted(end) => format!("discovery_halted:{}", end),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

/// Run-time progress of one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlCursor {
    pub pages_visited: u32,
    /// Links the listing pages showed, before dedup and the stop checks
    pub links_found: usize,
    pub candidates_seen: usize,
    pub candidates_accepted: usize,
    pub cutoff_reached: bool,
    pub limit_reached: bool,
    /// Set exactly once, when the run ends
    pub stop_reason: Option<StopReason>,
}

impl CrawlCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the stop reason and the flags that go with it
    pub fn finish(&mut self, reason: StopReason) {
        match reason {
            StopReason::LimitReached => self.limit_reached = true,
            StopReason::CutoffReached => self.cutoff_reached = true,
            _ => {}
        }
        self.stop_reason = Some(reason);
    }
}

/// Lifecycle of a run row in the ledger database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Completed,
    /// Cancelled by the operator, or the process died mid-run
    Interrupted,
    /// Ended with an error that needs an operator
    Failed,
}

impl RunStatus {
    /// Maps a finished run's stop reason to a status
    pub fn from_stop_reason(reason: &StopReason) -> Self {
        match reason {
            StopReason::Cancelled => Self::Interrupted,
            r if r.is_listing_failure() => Self::Failed,
            _ => Self::Completed,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_sets_flags() {
        let mut cursor = CrawlCursor::new();
        cursor.finish(StopReason::LimitReached);
        assert!(cursor.limit_reached);
        assert!(!cursor.cutoff_reached);
        assert_eq!(cursor.stop_reason, Some(StopReason::LimitReached));

        let mut cursor = CrawlCursor::new();
        cursor.finish(StopReason::CutoffReached);
        assert!(cursor.cutoff_reached);
    }

    #[test]
    fn test_stop_reason_strings() {
        assert_eq!(StopReason::NoMoreCandidates.to_string(), "no_more_candidates");
        assert_eq!(
            StopReason::DiscoveryHalted(DiscoveryEnd::NoNextPage).to_string(),
            "discovery_halted:no_next_page"
        );
        assert_eq!(
            StopReason::DiscoveryHalted(DiscoveryEnd::ListingFetchFailed {
                page: 3,
                kind: FetchFailureKind::Blocked
            })
            .to_string(),
            "discovery_halted:listing_fetch_failed(page=3, blocked)"
        );
    }

    #[test]
    fn test_run_status() {
        for status in [
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::from_db_string(status.to_db_string()), Some(status));
        }

        assert_eq!(
            RunStatus::from_stop_reason(&StopReason::Cancelled),
            RunStatus::Interrupted
        );
        assert_eq!(
            RunStatus::from_stop_reason(&StopReason::DiscoveryHalted(
                DiscoveryEnd::ListingFetchFailed {
                    page: 1,
                    kind: FetchFailureKind::Timeout
                }
            )),
            RunStatus::Failed
        );
        assert_eq!(
            RunStatus::from_stop_reason(&StopReason::CutoffReached),
            RunStatus::Completed
        );
    }
}
