//! Output module: product records, the product sink and run statistics
//!
//! This module handles:
//! - The serialized product model
//! - Accumulating products and persisting the JSON snapshot
//! - Recording run statistics

mod product;
mod sink;
pub mod stats;

pub use product::{Product, ProductFullInfo, ProductPreview};
pub use sink::ProductSink;
pub use stats::{print_statistics, RunStats};
