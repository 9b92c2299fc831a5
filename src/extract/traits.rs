/// One entry found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Raw `href`, possibly relative
    pub url: String,
    /// Date shown next to the entry, when the listing has one
    pub date_text: Option<String>,
}

impl ListingEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            date_text: None,
        }
    }

    pub fn with_date(mut self, date_text: impl Into<String>) -> Self {
        self.date_text = Some(date_text.into());
        self
    }
}

/// Raw fields pulled from an article page, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date_text: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    /// Body text with boilerplate already trimmed
    pub body_text: String,
    /// True if the page carries video/audio/gallery markers
    pub has_media_markers: bool,
}

/// Per-source mapping from page content to candidates and article fields
///
/// Implementations are pure: same input, same output, no I/O.
pub trait ExtractionRules: Send + Sync {
    /// Lists the article links on a listing page, in page order
    fn extract_candidates(&self, listing_html: &str) -> Vec<ListingEntry>;

    /// Returns the raw `href` of the explicit "next page" control, if any
    fn next_page(&self, listing_html: &str) -> Option<String>;

    /// Extracts article fields from an item page
    fn extract_article(&self, item_html: &str) -> ExtractedArticle;
}

impl<T: ExtractionRules + ?Sized> ExtractionRules for &T {
    fn extract_candidates(&self, listing_html: &str) -> Vec<ListingEntry> {
        (**self).extract_candidates(listing_html)
    }

    fn next_page(&self, listing_html: &str) -> Option<String> {
        (**self).next_page(listing_html)
    }

    fn extract_article(&self, item_html: &str) -> ExtractedArticle {
        (**self).extract_article(item_html)
    }
}
