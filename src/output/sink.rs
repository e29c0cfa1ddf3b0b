//! In-memory product accumulation with whole-snapshot persistence

use crate::output::Product;
use crate::Result;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Ordered collection of harvested products
///
/// Products are kept in append order. Nothing reaches disk until
/// [`ProductSink::persist`] is called, which writes the full sequence as one
/// JSON document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSink {
    products: Vec<Product>,
}

impl ProductSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, product: Product) {
        self.products.push(product);
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Writes the snapshot to `path`, replacing any previous file
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed over `path`, so readers see either the old snapshot or the new
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written,
    /// or if the rename fails.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &self.products)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::info!(
            "Persisted {} products to {}",
            self.products.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a snapshot written by [`ProductSink::persist`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let products: Vec<Product> = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self { products })
    }
}

impl From<Vec<Product>> for ProductSink {
    fn from(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ProductFullInfo, ProductPreview};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn product(name: &str, rating: Option<f64>) -> Product {
        let mut specs = BTreeMap::new();
        specs.insert("Вес".to_string(), "1.29 кг".to_string());

        Product::new(
            ProductPreview {
                name: name.to_string(),
                rating,
                min_price: Some(89_990),
                product_url: Some(format!("https://market.test/product/{}", name)),
                short_description: Some(vec!["13.3\"".to_string()]),
                ..Default::default()
            },
            Some(ProductFullInfo {
                original_images: vec!["https://img.market.test/1.jpg".to_string()],
                specs,
            }),
        )
    }

    #[test]
    fn test_append_preserves_order() {
        let mut sink = ProductSink::new();
        assert!(sink.is_empty());

        sink.append(product("a", None));
        sink.append(product("b", Some(4.0)));
        sink.append(product("c", None));

        let names: Vec<_> = sink.products().iter().map(|p| p.preview.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");

        let mut sink = ProductSink::new();
        sink.append(product("a", Some(4.5)));
        sink.append(Product::new(
            ProductPreview {
                name: "bare".to_string(),
                ..Default::default()
            },
            None,
        ));

        sink.persist(&path).unwrap();
        let loaded = ProductSink::load(&path).unwrap();

        assert_eq!(loaded, sink);
    }

    #[test]
    fn test_persist_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");

        let first: ProductSink = vec![product("a", None), product("b", None)].into();
        first.persist(&path).unwrap();

        let second: ProductSink = vec![product("c", None)].into();
        second.persist(&path).unwrap();

        assert_eq!(ProductSink::load(&path).unwrap(), second);

        // Only the snapshot itself remains in the directory
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(ProductSink::load(&dir.path().join("absent.json")).is_err());
    }
}
