//! Page fetching
//!
//! The crawler only ever talks to a [`FetchPort`]. Two implementations ship
//! with the crate:
//!
//! - [`HttpFetcher`]: plain HTTP via reqwest, with status classification and
//!   challenge-page detection
//! - [`PoliteFetcher`]: a wrapper adding bounded retries, exponential backoff
//!   with jitter, a longer pause for blocked fetches and a delay between
//!   requests
//!
//! All politeness lives here; the crawl loop never sleeps on its own.

mod http;
mod polite;
mod traits;

pub use http::{build_http_client, HttpFetcher};
pub use polite::{PoliteFetcher, RetryPolicy};
pub use traits::FetchPort;

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Body fragments that mark an anti-bot interstitial instead of real content
pub const DEFAULT_CHALLENGE_MARKERS: &[&str] =
    &["cf-browser-verification", "challenge-running", "Just a moment"];

/// Load condition a rendering fetcher should wait for
///
/// [`HttpFetcher`] has no renderer and treats every variant as `Load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitUntil {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Per-request contract the crawler hands to a [`FetchPort`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &crate::config::CrawlerConfig) -> Self {
        Self {
            wait_until: config.wait_until,
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::Load,
            timeout: Duration::from_secs(90),
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,
    /// URL after redirects; relative links resolve against this
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// Why a fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchFailureKind {
    /// The request did not finish within the policy timeout
    Timeout,
    /// Rate limited or served a challenge page
    Blocked,
    /// Connection problems and server-side errors
    NetworkError,
    /// The server answered definitively (404, 410, other 4xx); retrying cannot help
    Rejected,
}

impl FetchFailureKind {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Blocked => "blocked",
            Self::NetworkError => "network_error",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "timeout" => Some(Self::Timeout),
            "blocked" => Some(Self::Blocked),
            "network_error" => Some(Self::NetworkError),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A fetch that did not produce a usable page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchFailure {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Returns true if `body` contains any challenge marker
pub fn is_challenge_page<S: AsRef<str>>(body: &str, markers: &[S]) -> bool {
    markers.iter().any(|m| body.contains(m.as_ref()))
}
