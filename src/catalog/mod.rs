//! Catalog derivation.
//!
//! The catalog store is the filesystem itself: one folder per product,
//! rescanned on every read. [`CatalogSource`] is the read-only repository
//! seam, so an indexed store can replace [`FolderCatalog`] without touching
//! the indexer or the daily offer rules.
//!
//! ## Folder Layout
//!
//! ```text
//! {root}/
//! ├── KF194/
//! │   ├── 01.png              # images, ordered by name
//! │   ├── 02.png
//! │   ├── description.txt     # product description
//! │   └── KF194.apk           # delivered artifact
//! └── misc/                   # invalid name: listed last, not sellable
//! ```

pub mod daily;
pub mod index;
pub mod scan;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    ArtifactInfo, Catalog, CatalogConfig, FolderEntry, PricingConfig, ProductDetail,
};
use crate::utils::{file_extension, is_safe_component};

pub use daily::{DailyOfferSelector, daily_index, daily_offer, offer_price};
pub use index::CatalogIndexer;

/// Read-only access to the product catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Take a fresh, ordered snapshot of the catalog.
    async fn snapshot(&self) -> Result<Catalog>;

    /// Product with description and artifact info.
    async fn detail(&self, product_id: &str) -> Result<Option<ProductDetail>>;

    /// Path of a publicly viewable file inside a product folder.
    async fn file_path(&self, folder: &str, file: &str) -> Result<Option<PathBuf>>;

    /// Path of the artifact delivered for a product.
    async fn artifact_path(&self, product_id: &str) -> Result<Option<PathBuf>>;
}

/// Catalog backed by the product folder tree.
#[derive(Debug, Clone)]
pub struct FolderCatalog {
    config: CatalogConfig,
    indexer: Arc<CatalogIndexer>,
}

impl FolderCatalog {
    pub fn new(config: &CatalogConfig, pricing: &PricingConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            indexer: Arc::new(CatalogIndexer::new(config, pricing)?),
        })
    }

    /// Scan the root off the async runtime, bounded by the scan timeout.
    async fn scan(&self) -> Result<Vec<FolderEntry>> {
        let root = self.config.root.clone();
        let timeout = Duration::from_secs(self.config.scan_timeout_secs);
        let task = tokio::task::spawn_blocking(move || scan::scan_root(&root));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(AppError::scan(self.root_label(), join)),
            Err(_) => Err(AppError::scan(
                self.root_label(),
                format!("scan exceeded {}s", timeout.as_secs()),
            )),
        }
    }

    /// List a single product folder off the async runtime.
    async fn scan_folder(&self, name: &str) -> Result<FolderEntry> {
        let path = self.config.root.join(name);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || FolderEntry {
            files: scan::list_files(&path),
            name,
        })
        .await
        .map_err(|e| AppError::scan(self.root_label(), e))
    }

    fn root_label(&self) -> String {
        self.config.root.display().to_string()
    }

    fn check_component(&self, name: &str) -> Result<()> {
        if is_safe_component(name) {
            Ok(())
        } else {
            Err(AppError::validation(format!("Invalid path component {name:?}")))
        }
    }

    async fn read_description(&self, folder: &str) -> Result<String> {
        let path = self.config.root.join(folder).join(&self.config.description_file);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                Ok(String::new())
            }
        }
    }
}

#[async_trait]
impl CatalogSource for FolderCatalog {
    async fn snapshot(&self) -> Result<Catalog> {
        let folders = self.scan().await?;
        let catalog = self.indexer.build(&folders);
        log::debug!(
            "Catalog scanned: {} folders, {} files, {} images",
            catalog.stats.total_folders,
            catalog.stats.total_files,
            catalog.stats.total_images
        );
        Ok(catalog)
    }

    async fn detail(&self, product_id: &str) -> Result<Option<ProductDetail>> {
        self.check_component(product_id)?;

        // Resolve the exact folder name; ids are matched case-insensitively.
        let catalog = self.snapshot().await?;
        let Some(product) = catalog.find(product_id).cloned() else {
            return Ok(None);
        };

        let folder = self.scan_folder(&product.id).await?;
        let artifact = folder
            .files
            .iter()
            .find(|f| self.indexer.is_artifact(f))
            .map(|f| ArtifactInfo {
                name: f.name.clone(),
                size: f.size,
            });
        let description = self.read_description(&product.id).await?;

        Ok(Some(ProductDetail {
            product,
            description,
            artifact,
        }))
    }

    async fn file_path(&self, folder: &str, file: &str) -> Result<Option<PathBuf>> {
        self.check_component(folder)?;
        self.check_component(file)?;

        // Artifacts are only reachable through a receiving link.
        if file_extension(file) == self.config.artifact_extension.to_lowercase() {
            log::warn!("Refusing direct access to artifact {}/{}", folder, file);
            return Ok(None);
        }

        let path = self.config.root.join(folder).join(file);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn artifact_path(&self, product_id: &str) -> Result<Option<PathBuf>> {
        self.check_component(product_id)?;

        let folder = self.scan_folder(product_id).await?;
        Ok(folder
            .files
            .iter()
            .find(|f| self.indexer.is_artifact(f))
            .map(|f| self.config.root.join(product_id).join(&f.name)))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use tempfile::TempDir;

    fn catalog_in(root: &std::path::Path) -> FolderCatalog {
        let config = CatalogConfig {
            root: root.to_path_buf(),
            ..CatalogConfig::default()
        };
        FolderCatalog::new(&config, &PricingConfig::default()).unwrap()
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("KF001")).unwrap();
        fs::write(root.join("KF001/02.png"), b"img2").unwrap();
        fs::write(root.join("KF001/01.png"), b"img1").unwrap();
        fs::write(root.join("KF001/description.txt"), b" Classic dial \n").unwrap();
        fs::write(root.join("KF001/KF001.apk"), b"apk-bytes").unwrap();
        fs::create_dir(root.join("KF010")).unwrap();
        fs::create_dir(root.join("misc")).unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_snapshot_order_and_stats() {
        let tmp = fixture();
        let catalog = catalog_in(tmp.path()).snapshot().await.unwrap();

        let ids: Vec<_> = catalog.products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["KF010", "KF001", "misc"]);
        assert_eq!(catalog.stats.total_folders, 3);
        assert_eq!(catalog.stats.total_files, 4);
        assert_eq!(catalog.stats.total_images, 2);
    }

    #[tokio::test]
    async fn test_detail_includes_description_and_artifact() {
        let tmp = fixture();
        let detail = catalog_in(tmp.path())
            .detail("kf001")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(detail.product.id, "KF001");
        assert_eq!(detail.description, "Classic dial");
        assert_eq!(
            detail.artifact,
            Some(ArtifactInfo {
                name: "KF001.apk".to_string(),
                size: 9
            })
        );
    }

    #[tokio::test]
    async fn test_detail_unknown_product() {
        let tmp = fixture();
        assert!(catalog_in(tmp.path()).detail("KF999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_path_rules() {
        let tmp = fixture();
        let catalog = catalog_in(tmp.path());

        assert!(catalog.file_path("KF001", "01.png").await.unwrap().is_some());
        assert!(catalog.file_path("KF001", "nope.png").await.unwrap().is_none());
        assert!(catalog.file_path("KF001", "KF001.apk").await.unwrap().is_none());
        assert!(catalog.file_path("..", "01.png").await.is_err());
        assert!(catalog.file_path("KF001", "../KF010").await.is_err());
    }

    #[tokio::test]
    async fn test_artifact_path() {
        let tmp = fixture();
        let catalog = catalog_in(tmp.path());

        let path = catalog.artifact_path("KF001").await.unwrap().unwrap();
        assert!(path.ends_with("KF001/KF001.apk"));
        assert!(catalog.artifact_path("KF010").await.unwrap().is_none());
        assert!(catalog.artifact_path("KF404").await.unwrap().is_none());
    }
}
