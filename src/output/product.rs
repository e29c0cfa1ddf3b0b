use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields taken from one listing entry
///
/// Every optional field is absent when its markup is missing; no field's
/// absence affects the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPreview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<Vec<String>>,
}

/// Fields taken from a product's detail and specification pages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFullInfo {
    #[serde(default)]
    pub original_images: Vec<String>,

    /// Specification name → value; a later duplicate name overwrites
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
}

/// One harvested product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub preview: ProductPreview,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_info: Option<ProductFullInfo>,
}

impl Product {
    pub fn new(preview: ProductPreview, full_info: Option<ProductFullInfo>) -> Self {
        Self { preview, full_info }
    }
}
