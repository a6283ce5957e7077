//! Catalog indexer.
//!
//! Turns scanner output into the ordered product list:
//!
//! 1. folder names matching `<PREFIX>NNN` (case-insensitive) are sellable and
//!    carry `number = NNN`; anything else gets `number = 0`
//! 2. image files are sorted by name and given a retrieval URL
//! 3. every product gets the unit price
//! 4. sellable products come first, newest (highest number) first; the rest
//!    follow in ascending name order

use std::cmp::{Ordering, Reverse};
use std::collections::HashSet;

use chrono::Utc;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{
    Catalog, CatalogConfig, CatalogStats, FileEntry, FolderEntry, PricingConfig, Product,
    ProductImage,
};

/// Builds catalog snapshots from folder listings.
#[derive(Debug, Clone)]
pub struct CatalogIndexer {
    pattern: Regex,
    prefix: String,
    image_extensions: HashSet<String>,
    artifact_extension: String,
    unit_price: u32,
}

impl CatalogIndexer {
    pub fn new(catalog: &CatalogConfig, pricing: &PricingConfig) -> Result<Self> {
        let prefix = catalog.folder_prefix.trim().to_string();
        let pattern = Regex::new(&format!(r"(?i)^{}(\d{{3}})$", regex::escape(&prefix)))
            .map_err(|e| AppError::config(format!("Invalid folder prefix {prefix:?}: {e}")))?;

        Ok(Self {
            pattern,
            prefix,
            image_extensions: catalog
                .image_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            artifact_extension: catalog.artifact_extension.to_lowercase(),
            unit_price: pricing.unit_price,
        })
    }

    /// Three-digit suffix of a valid folder name.
    pub fn folder_number(&self, name: &str) -> Option<u32> {
        self.pattern
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn is_valid_name(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// `KF194` → `KF 194`; other names are returned unchanged.
    pub fn display_name(&self, name: &str) -> String {
        match self.pattern.captures(name).and_then(|caps| caps.get(1)) {
            Some(digits) => format!("{} {}", self.prefix.to_uppercase(), digits.as_str()),
            None => name.to_string(),
        }
    }

    /// Price of a product. Constant for now; the folder is the hook for
    /// per-product pricing.
    pub fn price_for(&self, _folder: &FolderEntry) -> u32 {
        self.unit_price
    }

    pub fn is_image(&self, file: &FileEntry) -> bool {
        self.image_extensions.contains(&file.kind)
    }

    pub fn is_artifact(&self, file: &FileEntry) -> bool {
        file.kind == self.artifact_extension
    }

    /// Build one product from a folder.
    pub fn product(&self, folder: &FolderEntry) -> Product {
        let mut images: Vec<ProductImage> = folder
            .files
            .iter()
            .filter(|f| self.is_image(f))
            .map(|f| ProductImage {
                name: f.name.clone(),
                kind: f.kind.clone(),
                url: image_url(&folder.name, &f.name),
            })
            .collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));

        Product {
            id: folder.name.clone(),
            display_name: self.display_name(&folder.name),
            number: self.folder_number(&folder.name).unwrap_or(0),
            sellable: self.is_valid_name(&folder.name),
            price: self.price_for(folder),
            images,
        }
    }

    /// Build an ordered catalog snapshot.
    pub fn build(&self, folders: &[FolderEntry]) -> Catalog {
        let mut products: Vec<Product> = folders.iter().map(|f| self.product(f)).collect();
        sort_products(&mut products);

        let stats = CatalogStats {
            total_folders: folders.len(),
            total_files: folders.iter().map(|f| f.files.len()).sum(),
            total_images: folders
                .iter()
                .flat_map(|f| f.files.iter())
                .filter(|f| self.is_image(f))
                .count(),
        };

        Catalog {
            products,
            stats,
            scanned_at: Utc::now(),
        }
    }
}

/// Catalog order: valid names before the rest, numbers descending, then names.
pub fn sort_products(products: &mut [Product]) {
    products.sort_by(compare_products);
}

fn compare_products(a: &Product, b: &Product) -> Ordering {
    let key = |p: &Product| (!p.sellable, Reverse(p.number));
    key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
}

/// Retrieval URL of a file inside a product folder.
pub fn image_url(folder: &str, file: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("folder", folder)
        .append_pair("file", file)
        .finish();
    format!("/api/view-file?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexer() -> CatalogIndexer {
        CatalogIndexer::new(&CatalogConfig::default(), &PricingConfig::default()).unwrap()
    }

    fn folder(name: &str, files: &[&str]) -> FolderEntry {
        FolderEntry {
            name: name.to_string(),
            files: files
                .iter()
                .map(|f| FileEntry {
                    name: f.to_string(),
                    kind: crate::utils::file_extension(f),
                    size: 1,
                    modified: None,
                })
                .collect(),
        }
    }

    fn ids(catalog: &Catalog) -> Vec<&str> {
        catalog.products.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_folder_number() {
        let idx = indexer();
        assert_eq!(idx.folder_number("KF194"), Some(194));
        assert_eq!(idx.folder_number("kf007"), Some(7));
        assert_eq!(idx.folder_number("KF1945"), None);
        assert_eq!(idx.folder_number("KF19"), None);
        assert_eq!(idx.folder_number("XKF194"), None);
        assert_eq!(idx.folder_number("misc"), None);
    }

    #[test]
    fn test_display_name() {
        let idx = indexer();
        assert_eq!(idx.display_name("KF194"), "KF 194");
        assert_eq!(idx.display_name("kf007"), "KF 007");
        assert_eq!(idx.display_name("misc"), "misc");
    }

    #[test]
    fn test_catalog_order_scenario() {
        let folders = vec![
            folder("KF003", &[]),
            folder("KF001", &[]),
            folder("KF010", &[]),
            folder("misc", &[]),
        ];

        let catalog = indexer().build(&folders);
        assert_eq!(ids(&catalog), vec!["KF010", "KF003", "KF001", "misc"]);
        assert!(!catalog.products[3].sellable);
        assert_eq!(catalog.products[3].number, 0);
    }

    #[test]
    fn test_invalid_names_always_sort_last() {
        let folders = vec![
            folder("zeta", &[]),
            folder("KF002", &[]),
            folder("alpha", &[]),
            folder("KF100", &[]),
            folder("KF12", &[]),
        ];

        let catalog = indexer().build(&folders);
        assert_eq!(
            ids(&catalog),
            vec!["KF100", "KF002", "KF12", "alpha", "zeta"]
        );
    }

    #[test]
    fn test_zero_numbered_folder_sorts_with_valid_names() {
        let folders = vec![folder("KF000", &[]), folder("AAA", &[]), folder("KF001", &[])];

        let catalog = indexer().build(&folders);
        assert_eq!(ids(&catalog), vec!["KF001", "KF000", "AAA"]);
        assert!(catalog.products[1].sellable);
        assert!(!catalog.products[2].sellable);
    }

    #[test]
    fn test_images_filtered_and_sorted() {
        let folders = vec![folder(
            "KF005",
            &["c.webp", "face.apk", "a.png", "description.txt", "B.jpg"],
        )];

        let catalog = indexer().build(&folders);
        let product = &catalog.products[0];
        let names: Vec<_> = product.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["B.jpg", "a.png", "c.webp"]);
        assert_eq!(
            product.images[1].url,
            "/api/view-file?folder=KF005&file=a.png"
        );
        assert_eq!(product.price, 150);

        assert_eq!(catalog.stats.total_folders, 1);
        assert_eq!(catalog.stats.total_files, 5);
        assert_eq!(catalog.stats.total_images, 3);
    }

    #[test]
    fn test_image_url_is_encoded() {
        assert_eq!(
            image_url("KF001", "my preview&1.png"),
            "/api/view-file?folder=KF001&file=my+preview%261.png"
        );
    }

    #[test]
    fn test_empty_image_set_is_valid() {
        let catalog = indexer().build(&[folder("KF001", &["face.apk"])]);
        assert!(catalog.products[0].images.is_empty());
        assert!(catalog.products[0].sellable);
    }
}
