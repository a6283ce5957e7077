//! Order persistence.
//!
//! Orders and receiving links live in an abstract key-value store keyed by
//! order id and by receiving id. The store boundary enforces the two link
//! invariants:
//!
//! - at most one receiving link per order (`mint_receiving_if_absent`)
//! - receiving ids are unique across all orders
//!
//! Both backends share the transition rules in [`OrderBook`], so the
//! in-memory store used by tests behaves exactly like the file store.
//!
//! ## File Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Storefront configuration
//! └── orders.json           # Orders and receiving links
//! ```

pub mod book;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{NewOrder, NotificationStatus, Order, ReceivingLink};

// Re-export for convenience
pub use book::OrderBook;
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Result of a status transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The order moved to the requested state
    Applied(Order),
    /// The order was already in the requested state; nothing changed
    AlreadyInState(Order),
    /// The order is in another terminal state
    Rejected(Order),
}

/// Result of an atomic mint-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    /// The candidate link was stored
    Minted(ReceivingLink),
    /// The order already had a link; the candidate was discarded
    AlreadyMinted(ReceivingLink),
}

impl MintOutcome {
    pub fn link(&self) -> &ReceivingLink {
        match self {
            MintOutcome::Minted(l) | MintOutcome::AlreadyMinted(l) => l,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, MintOutcome::Minted(_))
    }
}

/// Trait for order storage backends.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store a new pending order under the next order id.
    async fn create_order(&self, draft: NewOrder) -> Result<Order>;

    async fn get_order(&self, order_id: u64) -> Result<Option<Order>>;

    /// Move a pending order to paid.
    async fn mark_paid(&self, order_id: u64, paid_at: DateTime<Utc>) -> Result<Transition>;

    /// Move a pending order to failed.
    async fn mark_failed(&self, order_id: u64) -> Result<Transition>;

    /// Bind `link` to its order unless the order already has one.
    ///
    /// Only paid orders can receive a link. The check and the write happen
    /// under one lock, so concurrent duplicate confirmations mint once.
    async fn mint_receiving_if_absent(&self, link: ReceivingLink) -> Result<MintOutcome>;

    /// Look up an order and its link by receiving id.
    async fn find_by_receiving(&self, receiving_id: &str)
    -> Result<Option<(Order, ReceivingLink)>>;

    async fn link_for_order(&self, order_id: u64) -> Result<Option<ReceivingLink>>;

    async fn set_notification(&self, order_id: u64, status: NotificationStatus) -> Result<Order>;

    /// Paid orders with a link whose notification has not been delivered.
    async fn pending_notifications(&self) -> Result<Vec<Order>>;

    /// Paid orders that never got a receiving link.
    async fn paid_without_link(&self) -> Result<Vec<Order>>;
}
