//! Turning fetched HTML into candidates and article fields
//!
//! Per-source knowledge lives behind [`ExtractionRules`]; the crawler never
//! inspects markup itself. [`SelectorRules`] is the configuration-driven
//! implementation built from a `[source.selectors]` table.

mod selectors;
mod traits;

pub use selectors::SelectorRules;
pub use traits::{ExtractedArticle, ExtractionRules, ListingEntry};

/// Cuts `body` at the first occurrence of any boilerplate marker
///
/// # Examples
///
/// ```
/// use furrow::extract::trim_boilerplate;
///
/// let body = "Wheat closed higher.\n\nNewsletter Sign Up\nGet the latest...";
/// assert_eq!(
///     trim_boilerplate(body, &["Newsletter Sign Up".to_string()]),
///     "Wheat closed higher."
/// );
/// ```
pub fn trim_boilerplate(body: &str, markers: &[String]) -> String {
    let cut = markers
        .iter()
        .filter(|m| !m.is_empty())
        .filter_map(|m| body.find(m.as_str()))
        .min()
        .unwrap_or(body.len());

    body[..cut].trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_uses_earliest_marker() {
        let markers = vec!["Related Stories".to_string(), "Share this".to_string()];
        let body = "Cattle on feed fell.\nShare this\nRelated Stories\n...";
        assert_eq!(trim_boilerplate(body, &markers), "Cattle on feed fell.");
    }

    #[test]
    fn test_trim_without_markers() {
        assert_eq!(trim_boilerplate("Plain body  ", &[]), "Plain body");
        assert_eq!(
            trim_boilerplate("Plain body", &[String::new()]),
            "Plain body"
        );
    }
}
