//! Local filesystem storage implementation.
//!
//! Keeps the whole order book in memory and writes it to `orders.json` after
//! every state change. Changes are applied to a copy of the book and only
//! committed once the file write succeeded, so a failed write leaves both the
//! file and the in-memory state untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{NewOrder, NotificationStatus, Order, ReceivingLink};
use crate::storage::book::OrdersData;
use crate::storage::{MintOutcome, OrderBook, OrderStore, Transition};

const ORDERS_KEY: &str = "orders.json";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    book: Mutex<OrderBook>,
}

impl LocalStorage {
    /// Open the store rooted at the given directory, loading existing orders.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let storage = Self {
            book: Mutex::new(OrderBook::new()),
            root_dir,
        };

        if let Some(data) = storage.read_json::<OrdersData>(ORDERS_KEY).await? {
            let book = OrderBook::from_data(data)?;
            log::info!(
                "Loaded {} orders from {}",
                book.len(),
                storage.path(ORDERS_KEY).display()
            );
            *storage.book.lock().await = book;
        }

        Ok(storage)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read JSON data, returning None if the file doesn't exist.
    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Apply a change to a copy of the book and commit it once persisted.
    ///
    /// `change` returns the value plus whether anything was modified;
    /// unmodified books are not rewritten.
    async fn update<T>(
        &self,
        change: impl FnOnce(&mut OrderBook) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut book = self.book.lock().await;
        let mut next = book.clone();
        let (value, changed) = change(&mut next)?;

        if changed {
            self.write_json(ORDERS_KEY, &next.to_data())
                .await
                .map_err(|e| AppError::storage(format!("failed to persist orders: {e}")))?;
            *book = next;
        }

        Ok(value)
    }
}

#[async_trait]
impl OrderStore for LocalStorage {
    async fn create_order(&self, draft: NewOrder) -> Result<Order> {
        self.update(|book| Ok((book.create(draft, Utc::now()), true)))
            .await
    }

    async fn get_order(&self, order_id: u64) -> Result<Option<Order>> {
        Ok(self.book.lock().await.get(order_id).cloned())
    }

    async fn mark_paid(&self, order_id: u64, paid_at: DateTime<Utc>) -> Result<Transition> {
        self.update(|book| {
            let transition = book.mark_paid(order_id, paid_at)?;
            let changed = matches!(transition, Transition::Applied(_));
            Ok((transition, changed))
        })
        .await
    }

    async fn mark_failed(&self, order_id: u64) -> Result<Transition> {
        self.update(|book| {
            let transition = book.mark_failed(order_id)?;
            let changed = matches!(transition, Transition::Applied(_));
            Ok((transition, changed))
        })
        .await
    }

    async fn mint_receiving_if_absent(&self, link: ReceivingLink) -> Result<MintOutcome> {
        self.update(|book| {
            let outcome = book.mint_if_absent(link)?;
            let changed = outcome.is_new();
            Ok((outcome, changed))
        })
        .await
    }

    async fn find_by_receiving(
        &self,
        receiving_id: &str,
    ) -> Result<Option<(Order, ReceivingLink)>> {
        Ok(self.book.lock().await.find_by_receiving(receiving_id))
    }

    async fn link_for_order(&self, order_id: u64) -> Result<Option<ReceivingLink>> {
        Ok(self.book.lock().await.link_for_order(order_id))
    }

    async fn set_notification(&self, order_id: u64, status: NotificationStatus) -> Result<Order> {
        self.update(|book| Ok((book.set_notification(order_id, status)?, true)))
            .await
    }

    async fn pending_notifications(&self) -> Result<Vec<Order>> {
        Ok(self.book.lock().await.pending_notifications())
    }

    async fn paid_without_link(&self) -> Result<Vec<Order>> {
        Ok(self.book.lock().await.paid_without_link())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::models::OrderStatus;

    fn draft() -> NewOrder {
        NewOrder {
            product_id: "KF194".to_string(),
            product_name: "KF 194".to_string(),
            customer_email: "buyer@example.com".to_string(),
            price: 120,
            is_daily: true,
        }
    }

    #[tokio::test]
    async fn test_orders_survive_reopen() {
        let tmp = TempDir::new().unwrap();

        let order_id = {
            let store = LocalStorage::open(tmp.path()).await.unwrap();
            let order = store.create_order(draft()).await.unwrap();
            store.mark_paid(order.order_id, Utc::now()).await.unwrap();
            let link =
                ReceivingLink::new("abc123", order.order_id, Utc::now(), Duration::days(30));
            store.mint_receiving_if_absent(link).await.unwrap();
            order.order_id
        };

        assert!(tmp.path().join("orders.json").exists());
        assert!(!tmp.path().join("orders.tmp").exists());

        let store = LocalStorage::open(tmp.path()).await.unwrap();
        let (order, link) = store.find_by_receiving("abc123").await.unwrap().unwrap();
        assert_eq!(order.order_id, order_id);
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.is_daily);
        assert_eq!(link.order_id, order_id);

        let next = store.create_order(draft()).await.unwrap();
        assert_eq!(next.order_id, order_id + 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::open(tmp.path()).await.unwrap();
        let order = store.create_order(draft()).await.unwrap();

        // Replace the data file with a directory so the rename fails.
        tokio::fs::remove_file(tmp.path().join("orders.json"))
            .await
            .unwrap();
        tokio::fs::create_dir(tmp.path().join("orders.json"))
            .await
            .unwrap();

        let err = store.mark_paid(order.order_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let stored = store.get_order(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unchanged_transition_does_not_fail_on_broken_disk() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStorage::open(tmp.path()).await.unwrap();
        let order = store.create_order(draft()).await.unwrap();
        store.mark_paid(order.order_id, Utc::now()).await.unwrap();

        tokio::fs::remove_file(tmp.path().join("orders.json"))
            .await
            .unwrap();
        tokio::fs::create_dir(tmp.path().join("orders.json"))
            .await
            .unwrap();

        let again = store.mark_paid(order.order_id, Utc::now()).await.unwrap();
        assert!(matches!(again, Transition::AlreadyInState(_)));
    }
}
