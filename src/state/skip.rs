/// Skip reasons for candidates that did not become records
///
/// Every candidate that is not accepted is attributed to exactly one of these.
use crate::fetch::FetchFailureKind;
use chrono::NaiveDate;
use std::fmt;

/// Why a single candidate was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    // ===== Duplicate =====
    /// URL is already in the ledger, or was attempted earlier in this run
    AlreadyProcessed,

    // ===== Transient =====
    /// The item page could not be fetched after all retries
    FetchFailed {
        kind: FetchFailureKind,
        message: String,
    },

    // ===== Data quality =====
    /// A date was present but no supported format matched
    UnparseableDate { text: String },

    /// Title or date could not be found on the page
    MissingMandatoryField { field: &'static str },

    /// Media page whose text is below the configured minimum
    InsufficientText { chars: usize, minimum: usize },

    // ===== Filtered =====
    /// Older than the cutoff on a listing that is not newest-first
    OlderThanCutoff { date: NaiveDate },
}

impl SkipReason {
    pub fn kind(&self) -> SkipKind {
        match self {
            Self::AlreadyProcessed => SkipKind::AlreadyProcessed,
            Self::FetchFailed { .. } => SkipKind::FetchFailed,
            Self::UnparseableDate { .. } => SkipKind::UnparseableDate,
            Self::MissingMandatoryField { .. } => SkipKind::MissingMandatoryField,
            Self::InsufficientText { .. } => SkipKind::InsufficientText,
            Self::OlderThanCutoff { .. } => SkipKind::OlderThanCutoff,
        }
    }

    /// Human-readable detail stored next to the kind, if there is any
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::AlreadyProcessed => None,
            Self::FetchFailed { kind, message } => Some(format!("{}: {}", kind, message)),
            Self::UnparseableDate { text } => Some(format!("date text '{}'", text)),
            Self::MissingMandatoryField { field } => Some(format!("missing {}", field)),
            Self::InsufficientText { chars, minimum } => {
                Some(format!("{} chars, minimum {}", chars, minimum))
            }
            Self::OlderThanCutoff { date } => Some(format!("dated {}", date)),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{} ({})", self.kind(), detail),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Fieldless discriminant of [`SkipReason`], used as the summary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipKind {
    AlreadyProcessed,
    FetchFailed,
    UnparseableDate,
    MissingMandatoryField,
    InsufficientText,
    OlderThanCutoff,
}

impl SkipKind {
    /// Returns true for skips that a later run may resolve by itself
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailed)
    }

    /// Returns true for skips caused by markup the rules could not handle
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            Self::UnparseableDate | Self::MissingMandatoryField | Self::InsufficientText
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::AlreadyProcessed => "already_processed",
            Self::FetchFailed => "fetch_failed",
            Self::UnparseableDate => "unparseable_date",
            Self::MissingMandatoryField => "missing_mandatory_field",
            Self::InsufficientText => "insufficient_text",
            Self::OlderThanCutoff => "older_than_cutoff",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "already_processed" => Some(Self::AlreadyProcessed),
            "fetch_failed" => Some(Self::FetchFailed),
            "unparseable_date" => Some(Self::UnparseableDate),
            "missing_mandatory_field" => Some(Self::MissingMandatoryField),
            "insufficient_text" => Some(Self::InsufficientText),
            "older_than_cutoff" => Some(Self::OlderThanCutoff),
            _ => None,
        }
    }

    pub fn all_kinds() -> Vec<Self> {
        vec![
            Self::AlreadyProcessed,
            Self::FetchFailed,
            Self::UnparseableDate,
            Self::MissingMandatoryField,
            Self::InsufficientText,
            Self::OlderThanCutoff,
        ]
    }
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A candidate URL together with why it was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub url: String,
    pub reason: SkipReason,
}

impl SkippedCandidate {
    pub fn new(url: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }
}
