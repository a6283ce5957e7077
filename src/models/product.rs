//! Catalog data structures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A file found directly inside a product folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// File name including extension
    pub name: String,

    /// Lowercased extension without the dot, empty if none
    #[serde(rename = "type")]
    pub kind: String,

    /// Size in bytes
    pub size: u64,

    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
}

/// One immediate subdirectory of the catalog root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub files: Vec<FileEntry>,
}

/// An image reference of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductImage {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Retrieval URL keyed by folder and file name
    pub url: String,
}

/// A catalog entry derived from one product folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Folder name, the unique product identifier
    pub id: String,

    /// Human-readable name (`KF194` → `KF 194`)
    pub display_name: String,

    /// Three-digit suffix, 0 when the folder name is not valid
    pub number: u32,

    /// Whether the folder name matches the product naming pattern
    pub sellable: bool,

    pub price: u32,

    /// Images ordered by file name
    pub images: Vec<ProductImage>,
}

/// Aggregate counts over a scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_folders: usize,
    pub total_files: usize,
    pub total_images: usize,
}

/// An immutable snapshot of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub products: Vec<Product>,
    pub stats: CatalogStats,
    pub scanned_at: DateTime<Utc>,
}

impl Catalog {
    /// Products whose folder name is valid, in catalog order.
    pub fn sellable(&self) -> Vec<&Product> {
        self.products.iter().filter(|p| p.sellable).collect()
    }

    /// Find a product by id (case-insensitive).
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Deliverable file of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub name: String,
    pub size: u64,
}

/// Product plus the data only shown on its detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,

    /// Contents of the description file, empty when missing
    pub description: String,

    pub artifact: Option<ArtifactInfo>,
}

/// The product promoted for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyOffer {
    pub date_key: NaiveDate,
    pub product: Product,

    /// Price after the daily discount
    pub offer_price: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, sellable: bool) -> Product {
        Product {
            id: id.to_string(),
            display_name: id.to_string(),
            number: 0,
            sellable,
            price: 150,
            images: Vec::new(),
        }
    }

    #[test]
    fn sellable_filters_invalid_folders() {
        let catalog = Catalog {
            products: vec![product("KF002", true), product("misc", false)],
            stats: CatalogStats::default(),
            scanned_at: Utc::now(),
        };

        let ids: Vec<_> = catalog.sellable().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["KF002"]);
    }

    #[test]
    fn find_ignores_case() {
        let catalog = Catalog {
            products: vec![product("KF002", true)],
            stats: CatalogStats::default(),
            scanned_at: Utc::now(),
        };

        assert!(catalog.find("kf002").is_some());
        assert!(catalog.find("KF003").is_none());
    }

    #[test]
    fn product_serializes_camel_case() {
        let json = serde_json::to_value(product("KF001", true)).unwrap();
        assert_eq!(json["displayName"], "KF001");
        assert!(json.get("display_name").is_none());
    }
}
