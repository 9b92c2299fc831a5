//! Date normalization for scraped publication dates
//!
//! Publishers print dates in many shapes ("January 15, 2026", "15 Jan 2026",
//! "2026-01-15T09:30:00-05:00", "Tuesday 15 January 2026"). Everything the
//! crawler compares against a cutoff goes through one [`DateNormalizer`].

mod normalizer;

pub use normalizer::{parse_date, DateNormalizer};

use serde::Deserialize;
use thiserror::Error;

/// Reading order for all-numeric dates such as `03/04/2026`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateLocale {
    /// Month first (`MM/DD/YYYY`)
    #[default]
    Us,
    /// Day first (`DD/MM/YYYY`)
    Uk,
}

/// Errors produced when a date string cannot be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("Date text is empty")]
    Empty,

    #[error("Unrecognized date format: '{0}'")]
    Unrecognized(String),

    #[error("Year out of range in '{0}'")]
    YearOutOfRange(String),
}
