//! URL handling module for Furrow
//!
//! Candidate links arrive as raw `href` values scraped from listing pages.
//! This module turns them into absolute, normalized URLs that serve as the
//! deduplication key throughout the crawl.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Resolves a scraped `href` against the page it was found on
///
/// Returns `None` for links that can never be article candidates:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - anything that does not resolve to an http(s) URL
///
/// # Examples
///
/// ```
/// use furrow::url::resolve_candidate;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/markets/page/2/").unwrap();
/// assert_eq!(
///     resolve_candidate("/markets/wheat-rally/", &base).as_deref(),
///     Some("https://example.com/markets/wheat-rally/")
/// );
/// assert_eq!(resolve_candidate("mailto:desk@example.com", &base), None);
/// ```
pub fn resolve_candidate(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base.join(href).ok()?;
    normalize_url(absolute.as_str())
        .ok()
        .map(|url| url.to_string())
}

/// Builds the URL of listing page `page` from the first listing URL
///
/// Page 1 is the listing URL itself; later pages append the template with
/// `{n}` replaced, e.g. `https://site/markets/` + `page/{n}/` gives
/// `https://site/markets/page/3/`.
pub fn listing_page_url(listing: &Url, template: &str, page: u32) -> Option<String> {
    if page <= 1 {
        return Some(listing.to_string());
    }

    let mut base = listing.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let relative = template.replace("{n}", &page.to_string());
    base.join(&relative).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.example.com/crops-markets/").unwrap()
    }

    #[test]
    fn test_resolve_relative_link() {
        let resolved = resolve_candidate("corn-outlook/", &base());
        assert_eq!(
            resolved.as_deref(),
            Some("https://www.example.com/crops-markets/corn-outlook/")
        );
    }

    #[test]
    fn test_resolve_absolute_link() {
        let resolved = resolve_candidate("https://other.example.org/a?utm_source=x", &base());
        assert_eq!(resolved.as_deref(), Some("https://other.example.org/a"));
    }

    #[test]
    fn test_resolve_skips_special_links() {
        for href in [
            "",
            "   ",
            "#comments",
            "javascript:void(0)",
            "JavaScript:alert(1)",
            "mailto:x@example.com",
            "tel:+15551234",
            "data:text/html,hi",
            "ftp://example.com/file",
        ] {
            assert_eq!(resolve_candidate(href, &base()), None, "href {:?}", href);
        }
    }

    #[test]
    fn test_listing_page_one_is_listing_url() {
        let url = listing_page_url(&base(), "page/{n}/", 1).unwrap();
        assert_eq!(url, "https://www.example.com/crops-markets/");
    }

    #[test]
    fn test_listing_page_template() {
        let url = listing_page_url(&base(), "page/{n}/", 7).unwrap();
        assert_eq!(url, "https://www.example.com/crops-markets/page/7/");
    }

    #[test]
    fn test_listing_page_without_trailing_slash() {
        let listing = Url::parse("https://example.com/news").unwrap();
        let url = listing_page_url(&listing, "page/{n}/", 2).unwrap();
        assert_eq!(url, "https://example.com/news/page/2/");
    }

    #[test]
    fn test_listing_page_query_template() {
        let listing = Url::parse("https://example.com/reports/").unwrap();
        let url = listing_page_url(&listing, "?page={n}", 3).unwrap();
        assert_eq!(url, "https://example.com/reports/?page=3");
    }
}
