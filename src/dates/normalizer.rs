use crate::dates::{DateLocale, DateParseError};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Timestamp layouts carrying an explicit offset, tried after RFC 3339
const OFFSET_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Timestamp layouts without an offset
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Calendar-date layouts in priority order
///
/// `%B` also accepts the three-letter abbreviation when parsing, so
/// "Jan 15, 2026" and "January 15, 2026" share an entry.
const NAMED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%B %d %Y", "%d %B %Y", "%d %B, %Y"];

const US_NUMERIC_FORMATS: &[&str] = &["%m/%d/%Y", "%d/%m/%Y"];
const UK_NUMERIC_FORMATS: &[&str] = &["%d/%m/%Y", "%m/%d/%Y"];

const WEEKDAYS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "mon",
    "tue",
    "tues",
    "wed",
    "thu",
    "thur",
    "thurs",
    "fri",
    "sat",
    "sun",
];

const LABELS: &[&str] = &["published on", "posted on", "updated on", "published", "posted", "updated", "date"];

/// Parses human-readable publication dates into calendar dates
///
/// # Priority Order
///
/// 1. RFC 3339 timestamps (`2026-01-15T10:00:00Z`, `...+01:00`)
/// 2. ISO-8601 timestamps with a `+HHMM` offset
/// 3. ISO-8601 timestamps without an offset
/// 4. `YYYY-MM-DD`
/// 5. `Month D, YYYY` / `Mon D, YYYY`
/// 6. `Month D YYYY`
/// 7. `D Month YYYY` / `D Mon YYYY`
/// 8. Numeric `MM/DD/YYYY`, or `DD/MM/YYYY` first under [`DateLocale::Uk`]
///
/// Timestamps resolve to the calendar date in their own offset. Years must
/// have four digits. Inputs that name only a month and year are rejected
/// rather than pinned to the first of the month.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    locale: DateLocale,
}

impl DateNormalizer {
    pub fn new(locale: DateLocale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> DateLocale {
        self.locale
    }

    /// Parses `text` into a calendar date
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use furrow::dates::DateNormalizer;
    ///
    /// let dates = DateNormalizer::default();
    /// let expected = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    /// assert_eq!(dates.parse("January 15, 2026").unwrap(), expected);
    /// assert_eq!(dates.parse("Thursday 15 January 2026").unwrap(), expected);
    /// assert!(dates.parse("January 2026").is_err());
    /// ```
    pub fn parse(&self, text: &str) -> Result<NaiveDate, DateParseError> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(DateParseError::Empty);
        }

        let cleaned = clean(raw);
        if cleaned.is_empty() {
            return Err(DateParseError::Empty);
        }

        let mut saw_bad_year = false;

        if let Some(date) = self.try_all(&cleaned, &mut saw_bad_year) {
            return Ok(date);
        }

        // "15 January 2026 | 10:30 GMT" style: retry on the leading date tokens
        let tokens: Vec<&str> = cleaned.split(' ').collect();
        if tokens.len() > 3 {
            let leading = tokens[..3].join(" ");
            if let Some(date) = self.try_all(&leading, &mut saw_bad_year) {
                return Ok(date);
            }
        }

        // chrono reads "January 2026" as day 20 of year 26; that is a
        // missing day, not a short year
        if saw_bad_year && !has_full_year(&cleaned) {
            Err(DateParseError::YearOutOfRange(raw.to_string()))
        } else {
            Err(DateParseError::Unrecognized(raw.to_string()))
        }
    }

    fn try_all(&self, text: &str, saw_bad_year: &mut bool) -> Option<NaiveDate> {
        let mut accept = |date: NaiveDate| {
            if (1000..=9999).contains(&date.year()) {
                Some(date)
            } else {
                *saw_bad_year = true;
                None
            }
        };

        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            if let Some(date) = accept(ts.date_naive()) {
                return Some(date);
            }
        }

        for format in OFFSET_TIMESTAMP_FORMATS {
            if let Ok(ts) = DateTime::parse_from_str(text, format) {
                if let Some(date) = accept(ts.date_naive()) {
                    return Some(date);
                }
            }
        }

        for format in NAIVE_TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
                if let Some(date) = accept(ts.date()) {
                    return Some(date);
                }
            }
        }

        let numeric = match self.locale {
            DateLocale::Us => US_NUMERIC_FORMATS,
            DateLocale::Uk => UK_NUMERIC_FORMATS,
        };

        for format in NAMED_DATE_FORMATS.iter().chain(numeric.iter()) {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                if let Some(date) = accept(date) {
                    return Some(date);
                }
            }
        }

        None
    }
}

/// Parses with a one-off normalizer; `None` means US ordering
pub fn parse_date(text: &str, locale: Option<DateLocale>) -> Result<NaiveDate, DateParseError> {
    DateNormalizer::new(locale.unwrap_or_default()).parse(text)
}

/// Strips labels, weekdays, ordinals and stray punctuation from date text
fn clean(text: &str) -> String {
    let mut rest = text.trim().to_string();

    let lowered = rest.to_lowercase();
    for label in LABELS {
        if let Some(stripped) = lowered.strip_prefix(label) {
            if stripped.starts_with(':') || stripped.starts_with(' ') {
                if let Some(tail) = rest.get(label.len()..) {
                    rest = tail
                        .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
                        .to_string();
                }
                break;
            }
        }
    }

    let mut tokens: Vec<String> = rest.split_whitespace().map(clean_token).collect();

    if let Some(first) = tokens.first() {
        let bare = first.trim_end_matches(',').to_lowercase();
        if tokens.len() > 1 && WEEKDAYS.contains(&bare.as_str()) {
            tokens.remove(0);
        }
    }

    tokens.join(" ")
}

/// Normalizes a single whitespace-delimited token
fn clean_token(token: &str) -> String {
    let (core, comma) = match token.strip_suffix(',') {
        Some(core) => (core, ","),
        None => (token, ""),
    };

    // "Jan." -> "Jan"
    let core = if core.len() > 1
        && core.ends_with('.')
        && core[..core.len() - 1].chars().all(|c| c.is_ascii_alphabetic())
    {
        &core[..core.len() - 1]
    } else {
        core
    };

    if core.eq_ignore_ascii_case("sept") {
        return format!("Sep{}", comma);
    }

    // "15th" -> "15"
    let lower = core.to_ascii_lowercase();
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(number) = lower.strip_suffix(suffix) {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return format!("{}{}", number, comma);
            }
        }
    }

    format!("{}{}", core, comma)
}

/// True when the text carries a run of exactly four digits
fn has_full_year(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_digit())
        .any(|run| run.len() == 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_every_supported_format_yields_same_date() {
        let dates = DateNormalizer::default();
        for text in [
            "January 15, 2026",
            "Jan 15, 2026",
            "January 15 2026",
            "15 January 2026",
            "15 Jan 2026",
            "2026-01-15",
            "01/15/2026",
            "2026-01-15T10:00:00Z",
            "2026-01-15T10:00:00+00:00",
            "2026-01-15T10:00:00.123-05:00",
            "2026-01-15T10:00:00+0000",
            "2026-01-15T10:00:00",
            "2026-01-15 10:00:00",
        ] {
            assert_eq!(dates.parse(text), Ok(jan15()), "input {:?}", text);
        }
    }

    #[test]
    fn test_weekday_prefix() {
        let dates = DateNormalizer::new(DateLocale::Uk);
        assert_eq!(dates.parse("Thursday 15 January 2026"), Ok(jan15()));
        assert_eq!(dates.parse("Thu, Jan 15, 2026"), Ok(jan15()));
    }

    #[test]
    fn test_ordinals_and_labels() {
        let dates = DateNormalizer::default();
        assert_eq!(dates.parse("January 15th, 2026"), Ok(jan15()));
        assert_eq!(dates.parse("Published: 15th January 2026"), Ok(jan15()));
        assert_eq!(dates.parse("Posted on Jan. 15, 2026"), Ok(jan15()));
    }

    #[test]
    fn test_sept_abbreviation() {
        let dates = DateNormalizer::default();
        assert_eq!(
            dates.parse("Sept 3, 2025"),
            Ok(NaiveDate::from_ymd_opt(2025, 9, 3).unwrap())
        );
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let dates = DateNormalizer::default();
        assert_eq!(dates.parse("  January\n   15,\t2026 "), Ok(jan15()));
    }

    #[test]
    fn test_locale_controls_numeric_order() {
        let us = DateNormalizer::new(DateLocale::Us);
        let uk = DateNormalizer::new(DateLocale::Uk);

        assert_eq!(
            us.parse("03/04/2026"),
            Ok(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap())
        );
        assert_eq!(
            uk.parse("03/04/2026"),
            Ok(NaiveDate::from_ymd_opt(2026, 4, 3).unwrap())
        );
        // Only one reading is valid, whichever locale is preferred
        assert_eq!(us.parse("15/01/2026"), Ok(jan15()));
    }

    #[test]
    fn test_timestamp_keeps_its_own_offset_date() {
        let dates = DateNormalizer::default();
        assert_eq!(
            dates.parse("2026-01-15T23:30:00-06:00"),
            Ok(jan15()),
        );
    }

    #[test]
    fn test_trailing_time_is_ignored() {
        let dates = DateNormalizer::default();
        assert_eq!(dates.parse("15 January 2026 | 10:30 GMT"), Ok(jan15()));
    }

    #[test]
    fn test_partial_dates_rejected() {
        let dates = DateNormalizer::default();
        for text in ["2026", "January 2026", "Jan 15", "15/01"] {
            assert!(
                matches!(dates.parse(text), Err(DateParseError::Unrecognized(_))),
                "input {:?}",
                text
            );
        }
    }

    #[test]
    fn test_two_digit_year_rejected() {
        let dates = DateNormalizer::default();
        assert_eq!(
            dates.parse("01/15/26"),
            Err(DateParseError::YearOutOfRange("01/15/26".to_string()))
        );
        assert!(dates.parse("January 15, 26").is_err());
    }

    #[test]
    fn test_empty_input() {
        let dates = DateNormalizer::default();
        assert_eq!(dates.parse("   "), Err(DateParseError::Empty));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_date("yesterday afternoon", None).is_err());
        assert!(parse_date("31 February 2026", None).is_err());
    }
}
