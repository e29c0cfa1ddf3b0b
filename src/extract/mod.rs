//! HTML extraction for listing, detail and specification pages

mod detail;
mod links;
mod listing;

pub use links::{clean_url, is_redirector, LinkPolicy};
pub use listing::Item;

use crate::output::{ProductFullInfo, ProductPreview};
use scraper::{ElementRef, Selector};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The listing container is absent; usually a block page in disguise
    #[error("listing container `{0}` not found")]
    MissingContainer(String),

    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Turns fetched pages into product fields
pub trait PageExtractor: Send + Sync {
    /// Splits a listing page into its items, in page order
    fn parse_listing(&self, html: &str, page: u32) -> Result<Vec<Item>, ExtractionError>;

    /// Reads the preview fields of one item; missing markup leaves fields absent
    fn parse_preview(&self, item: &Item) -> ProductPreview;

    fn parse_full_info(&self, detail_html: &str, spec_html: &str) -> ProductFullInfo;
}

/// CSS selectors used by [`MarketExtractor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub listing_container: String,
    pub listing_item: String,
    pub thumbnail: String,
    pub rating: String,
    pub min_price: String,
    pub max_price: String,
    pub title_link: String,
    pub category_link: String,
    pub short_description: String,
    pub gallery_image: String,
    pub spec_row: String,
    pub spec_name: String,
    pub spec_value: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            listing_container: "div.filter-applied-results".to_string(),
            listing_item: "div.snippet-card".to_string(),
            thumbnail: "img.image".to_string(),
            rating: "div.rating".to_string(),
            min_price: "div.price".to_string(),
            max_price: "span.price".to_string(),
            title_link: "a.snippet-card__header-link".to_string(),
            category_link: "a.snippet-card__subheader-link".to_string(),
            short_description: "ul.snippet-card__desc li".to_string(),
            gallery_image: "div.product-gallery img".to_string(),
            spec_row: "dl.product-spec".to_string(),
            spec_name: "dt.product-spec__name".to_string(),
            spec_value: "dd.product-spec__value".to_string(),
        }
    }
}

/// Selectors compiled once per extractor
#[derive(Debug)]
pub(crate) struct CompiledSelectors {
    pub(crate) listing_container_css: String,
    pub(crate) listing_container: Selector,
    pub(crate) listing_item: Selector,
    pub(crate) thumbnail: Selector,
    pub(crate) rating: Selector,
    pub(crate) min_price: Selector,
    pub(crate) max_price: Selector,
    pub(crate) title_link: Selector,
    pub(crate) category_link: Selector,
    pub(crate) short_description: Selector,
    pub(crate) gallery_image: Selector,
    pub(crate) spec_row: Selector,
    pub(crate) spec_name: Selector,
    pub(crate) spec_value: Selector,
}

impl CompiledSelectors {
    fn compile(selectors: &Selectors) -> Result<Self, ExtractionError> {
        Ok(Self {
            listing_container_css: selectors.listing_container.clone(),
            listing_container: compile(&selectors.listing_container)?,
            listing_item: compile(&selectors.listing_item)?,
            thumbnail: compile(&selectors.thumbnail)?,
            rating: compile(&selectors.rating)?,
            min_price: compile(&selectors.min_price)?,
            max_price: compile(&selectors.max_price)?,
            title_link: compile(&selectors.title_link)?,
            category_link: compile(&selectors.category_link)?,
            short_description: compile(&selectors.short_description)?,
            gallery_image: compile(&selectors.gallery_image)?,
            spec_row: compile(&selectors.spec_row)?,
            spec_name: compile(&selectors.spec_name)?,
            spec_value: compile(&selectors.spec_value)?,
        })
    }
}

fn compile(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Whitespace-normalized text of the first match, None if missing or blank
pub(crate) fn text_of(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = root.select(selector).next()?;
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// Extractor for the market site's listing and product pages
#[derive(Debug)]
pub struct MarketExtractor {
    selectors: CompiledSelectors,
    links: LinkPolicy,
}

impl MarketExtractor {
    pub fn new(base_url: Url, redirector_marker: &str) -> Result<Self, ExtractionError> {
        Self::with_selectors(base_url, redirector_marker, &Selectors::default())
    }

    pub fn with_selectors(
        base_url: Url,
        redirector_marker: &str,
        selectors: &Selectors,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            selectors: CompiledSelectors::compile(selectors)?,
            links: LinkPolicy::new(base_url, redirector_marker),
        })
    }

    pub fn links(&self) -> &LinkPolicy {
        &self.links
    }
}

impl PageExtractor for MarketExtractor {
    fn parse_listing(&self, html: &str, page: u32) -> Result<Vec<Item>, ExtractionError> {
        listing::parse_listing(&self.selectors, html, page)
    }

    fn parse_preview(&self, item: &Item) -> ProductPreview {
        listing::parse_preview(&self.selectors, &self.links, item)
    }

    fn parse_full_info(&self, detail_html: &str, spec_html: &str) -> ProductFullInfo {
        detail::parse_full_info(&self.selectors, &self.links, detail_html, spec_html)
    }
}
