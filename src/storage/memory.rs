//! In-memory order store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{NewOrder, NotificationStatus, Order, ReceivingLink};
use crate::storage::{MintOutcome, OrderBook, OrderStore, Transition};

/// Volatile storage backend, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    book: Mutex<OrderBook>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStorage {
    async fn create_order(&self, draft: NewOrder) -> Result<Order> {
        Ok(self.book.lock().await.create(draft, Utc::now()))
    }

    async fn get_order(&self, order_id: u64) -> Result<Option<Order>> {
        Ok(self.book.lock().await.get(order_id).cloned())
    }

    async fn mark_paid(&self, order_id: u64, paid_at: DateTime<Utc>) -> Result<Transition> {
        self.book.lock().await.mark_paid(order_id, paid_at)
    }

    async fn mark_failed(&self, order_id: u64) -> Result<Transition> {
        self.book.lock().await.mark_failed(order_id)
    }

    async fn mint_receiving_if_absent(&self, link: ReceivingLink) -> Result<MintOutcome> {
        self.book.lock().await.mint_if_absent(link)
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
        self.book.lock().await.set_notification(order_id, status)
    }

    async fn pending_notifications(&self) -> Result<Vec<Order>> {
        Ok(self.book.lock().await.pending_notifications())
    }

    async fn paid_without_link(&self) -> Result<Vec<Order>> {
        Ok(self.book.lock().await.paid_without_link())
    }
}
