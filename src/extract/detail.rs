use crate::extract::links::LinkPolicy;
use crate::extract::{text_of, CompiledSelectors};
use crate::output::ProductFullInfo;
use scraper::Html;

/// Collects gallery images and specification rows from a product's pages
///
/// The detail page is read first, then the spec page, so a name that appears
/// on both takes the spec page's value.
pub(crate) fn parse_full_info(
    selectors: &CompiledSelectors,
    links: &LinkPolicy,
    detail_html: &str,
    spec_html: &str,
) -> ProductFullInfo {
    let mut info = ProductFullInfo::default();

    for html in [detail_html, spec_html] {
        let document = Html::parse_document(html);

        for img in document.select(&selectors.gallery_image) {
            let src = img
                .value()
                .attr("data-original")
                .or_else(|| img.value().attr("src"));
            if let Some(url) = src.and_then(|src| links.resolve(src)) {
                if !info.original_images.contains(&url) {
                    info.original_images.push(url);
                }
            }
        }

        for row in document.select(&selectors.spec_row) {
            let name = text_of(row, &selectors.spec_name);
            let value = text_of(row, &selectors.spec_value);
            if let (Some(name), Some(value)) = (name, value) {
                info.specs.insert(name, value);
            }
        }
    }

    tracing::trace!(
        "Full info: {} images, {} spec entries",
        info.original_images.len(),
        info.specs.len()
    );
    info
}
