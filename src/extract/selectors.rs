//! CSS-selector driven extraction rules
//!
//! Every source in the configuration gets one [`SelectorRules`], compiled
//! once at startup and shared by the discoverer and the crawl loop.

use crate::config::SelectorConfig;
use crate::extract::{trim_boilerplate, ExtractedArticle, ExtractionRules, ListingEntry};
use crate::FurrowError;
use scraper::{ElementRef, Html, Selector};

/// Compiled selectors for one source
#[derive(Debug, Clone)]
pub struct SelectorRules {
    listing_item: Option<Selector>,
    listing_link: Selector,
    listing_date: Option<Selector>,
    listing_date_attribute: Option<String>,
    next_page: Option<Selector>,
    title: Selector,
    author: Option<Selector>,
    date: Selector,
    date_attribute: Option<String>,
    tags: Option<Selector>,
    categories: Option<Selector>,
    body: Selector,
    media_markers: Vec<Selector>,
    boilerplate_markers: Vec<String>,
    anchor: Selector,
}

impl SelectorRules {
    /// Compiles every selector in `config`
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorRules)` - All selectors compiled
    /// * `Err(FurrowError::Selector)` - The first selector that failed to parse
    pub fn from_config(config: &SelectorConfig) -> Result<Self, FurrowError> {
        Ok(Self {
            listing_item: compile_optional(&config.listing_item)?,
            listing_link: compile(&config.listing_link)?,
            listing_date: compile_optional(&config.listing_date)?,
            listing_date_attribute: config.listing_date_attribute.clone(),
            next_page: compile_optional(&config.next_page)?,
            title: compile(&config.title)?,
            author: compile_optional(&config.author)?,
            date: compile(&config.date)?,
            date_attribute: config.date_attribute.clone(),
            tags: compile_optional(&config.tags)?,
            categories: compile_optional(&config.categories)?,
            body: compile(&config.body)?,
            media_markers: config
                .media_markers
                .iter()
                .map(|css| compile(css))
                .collect::<Result<Vec<_>, _>>()?,
            boilerplate_markers: config.boilerplate_markers.clone(),
            anchor: compile("a[href]")?,
        })
    }

    fn entry_from_item(&self, item: ElementRef<'_>) -> Option<ListingEntry> {
        let href = item
            .select(&self.listing_link)
            .find_map(|a| a.value().attr("href"))
            .or_else(|| item.value().attr("href"))?;

        let date_text = self.listing_date.as_ref().and_then(|sel| {
            item.select(sel)
                .next()
                .and_then(|el| value_or_text(el, self.listing_date_attribute.as_deref()))
        });

        Some(ListingEntry {
            url: href.trim().to_string(),
            date_text,
        })
    }
}

impl ExtractionRules for SelectorRules {
    fn extract_candidates(&self, listing_html: &str) -> Vec<ListingEntry> {
        let document = Html::parse_document(listing_html);

        match &self.listing_item {
            Some(item_selector) => document
                .select(item_selector)
                .filter_map(|item| self.entry_from_item(item))
                .collect(),
            None => document
                .select(&self.listing_link)
                .filter_map(|a| a.value().attr("href"))
                .map(|href| ListingEntry::new(href.trim()))
                .collect(),
        }
    }

    fn next_page(&self, listing_html: &str) -> Option<String> {
        let selector = self.next_page.as_ref()?;
        let document = Html::parse_document(listing_html);

        document.select(selector).find_map(|el| {
            el.value()
                .attr("href")
                .or_else(|| {
                    el.select(&self.anchor)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                })
                .map(|href| href.trim().to_string())
                .filter(|href| !href.is_empty())
        })
    }

    fn extract_article(&self, item_html: &str) -> ExtractedArticle {
        let document = Html::parse_document(item_html);

        let title = first_text(&document, &self.title);
        let author = self
            .author
            .as_ref()
            .and_then(|sel| first_text(&document, sel))
            .map(|a| strip_byline(&a));

        let date_text = document
            .select(&self.date)
            .find_map(|el| value_or_text(el, self.date_attribute.as_deref()));

        let tags = self
            .tags
            .as_ref()
            .map(|sel| all_texts(&document, sel))
            .unwrap_or_default();
        let categories = self
            .categories
            .as_ref()
            .map(|sel| all_texts(&document, sel))
            .unwrap_or_default();

        let paragraphs: Vec<String> = document
            .select(&self.body)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        let body_text = trim_boilerplate(&paragraphs.join("\n\n"), &self.boilerplate_markers);

        let has_media_markers = self
            .media_markers
            .iter()
            .any(|sel| document.select(sel).next().is_some());

        ExtractedArticle {
            title,
            author,
            date_text,
            tags,
            categories,
            body_text,
            has_media_markers,
        }
    }
}

fn compile(css: &str) -> Result<Selector, FurrowError> {
    Selector::parse(css).map_err(|e| FurrowError::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

fn compile_optional(css: &Option<String>) -> Result<Option<Selector>, FurrowError> {
    css.as_deref().map(compile).transpose()
}

/// Collapsed text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Texts of every match, empty and repeated values dropped
fn all_texts(document: &Html, selector: &Selector) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for text in document.select(selector).map(element_text) {
        if !text.is_empty() && !values.contains(&text) {
            values.push(text);
        }
    }
    values
}

/// Attribute value when configured and present, else the element text
fn value_or_text(element: ElementRef<'_>, attribute: Option<&str>) -> Option<String> {
    let from_attr = attribute
        .and_then(|name| element.value().attr(name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    from_attr.or_else(|| Some(element_text(element)).filter(|t| !t.is_empty()))
}

fn strip_byline(author: &str) -> String {
    let trimmed = author.trim();
    match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("by ") => trimmed[3..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}
