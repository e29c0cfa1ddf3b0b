use crate::extract::links::LinkPolicy;
use crate::extract::{text_of, CompiledSelectors, ExtractionError};
use crate::output::ProductPreview;
use scraper::Html;

/// One listing entry, scoped to the page that produced it
///
/// The entry's markup is kept as an owned fragment so items can outlive the
/// parsed page document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    page: u32,
    position: usize,
    html: String,
}

impl Item {
    pub fn new(page: u32, position: usize, html: impl Into<String>) -> Self {
        Self {
            page,
            position,
            html: html.into(),
        }
    }

    /// Listing page number this item was found on
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Zero-based position on that page
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Splits a listing page into items, in page order
///
/// A page without the listing container fails with `MissingContainer`. A
/// container with no items is a valid empty page.
pub(crate) fn parse_listing(
    selectors: &CompiledSelectors,
    html: &str,
    page: u32,
) -> Result<Vec<Item>, ExtractionError> {
    let document = Html::parse_document(html);

    let container = document
        .select(&selectors.listing_container)
        .next()
        .ok_or_else(|| ExtractionError::MissingContainer(selectors.listing_container_css.clone()))?;

    Ok(container
        .select(&selectors.listing_item)
        .enumerate()
        .map(|(position, element)| Item::new(page, position, element.html()))
        .collect())
}

pub(crate) fn parse_preview(
    selectors: &CompiledSelectors,
    links: &LinkPolicy,
    item: &Item,
) -> ProductPreview {
    let fragment = Html::parse_fragment(item.html());
    let root = fragment.root_element();

    let thumbnail_url = root
        .select(&selectors.thumbnail)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| links.resolve(src));

    let title = root.select(&selectors.title_link).next();
    let name = title
        .map(|link| link.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let product_url = title
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| links.resolve_clean(href));

    let category_link = root.select(&selectors.category_link).next();
    let category = category_link.and_then(|link| {
        let text = link.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    });
    let category_url = category_link
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| links.resolve_clean(href));

    let description: Vec<String> = root
        .select(&selectors.short_description)
        .filter_map(|line| {
            let text = line.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(text)
        })
        .collect();

    ProductPreview {
        thumbnail_url,
        rating: text_of(root, &selectors.rating).and_then(|text| parse_rating(&text)),
        min_price: text_of(root, &selectors.min_price).and_then(|text| parse_price(&text)),
        max_price: text_of(root, &selectors.max_price).and_then(|text| parse_price(&text)),
        name,
        product_url,
        category,
        category_url,
        short_description: (!description.is_empty()).then_some(description),
    }
}

/// Reads a rating such as `4.5` or `4,5`
fn parse_rating(text: &str) -> Option<f64> {
    text.split_whitespace()
        .find_map(|token| token.replace(',', ".").parse::<f64>().ok())
        .filter(|rating| rating.is_finite())
}

/// Reads the first digit group of a price, ignoring group separators
///
/// `"от 89 990 ₽"` reads as `89990`.
fn parse_price(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || c.is_whitespace())
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
