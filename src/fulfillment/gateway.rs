//! Download gateway.
//!
//! Resolves a receiving id to the artifact bound to its order. Unknown ids
//! and expired links are distinct outcomes so the buyer can be told which
//! one happened. Re-downloads inside the validity window are allowed.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::catalog::CatalogSource;
use crate::error::{AppError, Result};
use crate::models::{Order, ReceivingLink};
use crate::storage::OrderStore;

/// Outcome of a receiving id lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Valid { order: Order, link: ReceivingLink },
    NotFound,
    Expired { expired_at: DateTime<Utc> },
}

/// Outcome of a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready {
        order: Order,
        link: ReceivingLink,
        artifact: PathBuf,
    },
    NotFound,
    Expired {
        expired_at: DateTime<Utc>,
    },
}

pub struct DownloadGateway {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogSource>,
}

impl DownloadGateway {
    pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<dyn CatalogSource>) -> Self {
        Self { store, catalog }
    }

    /// Look up a receiving id as of `now`.
    pub async fn lookup_at(&self, receiving_id: &str, now: DateTime<Utc>) -> Result<Lookup> {
        let receiving_id = receiving_id.trim();
        if receiving_id.is_empty() {
            return Err(AppError::validation("receiving id is required"));
        }

        let Some((order, link)) = self.store.find_by_receiving(receiving_id).await? else {
            log::debug!("Unknown receiving id requested");
            return Ok(Lookup::NotFound);
        };

        if link.is_expired_at(now) {
            log::info!(
                "Expired receiving link used for order {} (expired {})",
                order.order_id,
                link.expires_at
            );
            return Ok(Lookup::Expired {
                expired_at: link.expires_at,
            });
        }

        Ok(Lookup::Valid { order, link })
    }

    pub async fn lookup(&self, receiving_id: &str) -> Result<Lookup> {
        self.lookup_at(receiving_id, Utc::now()).await
    }

    /// Resolve a receiving id to the artifact path as of `now`.
    pub async fn resolve_at(&self, receiving_id: &str, now: DateTime<Utc>) -> Result<Resolution> {
        let (order, link) = match self.lookup_at(receiving_id, now).await? {
            Lookup::Valid { order, link } => (order, link),
            Lookup::NotFound => return Ok(Resolution::NotFound),
            Lookup::Expired { expired_at } => return Ok(Resolution::Expired { expired_at }),
        };

        match self.catalog.artifact_path(&order.product_id).await? {
            Some(artifact) => Ok(Resolution::Ready {
                order,
                link,
                artifact,
            }),
            None => {
                log::error!(
                    "Order {} is paid but product {} has no artifact on disk",
                    order.order_id,
                    order.product_id
                );
                Err(AppError::not_found(format!(
                    "artifact for product {}",
                    order.product_id
                )))
            }
        }
    }

    pub async fn resolve(&self, receiving_id: &str) -> Result<Resolution> {
        self.resolve_at(receiving_id, Utc::now()).await
    }
}
