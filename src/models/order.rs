//! Order and receiving link data structures.

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

/// Payment status of an order.
///
/// `Paid` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// Delivery state of the buyer notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NotificationStatus {
    /// No chain has completed yet
    #[default]
    NotSent,

    /// A provider accepted the message
    Sent {
        provider: String,
        message_id: Option<String>,
        sent_at: DateTime<Utc>,
    },

    /// Every configured provider failed; awaiting retry or an operator
    Pending {
        chains: u32,
        last_error: String,
        updated_at: DateTime<Utc>,
    },
}

impl NotificationStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationStatus::Sent { .. })
    }

    /// Number of provider chains that ran without delivering.
    pub fn failed_chains(&self) -> u32 {
        match self {
            NotificationStatus::Pending { chains, .. } => *chains,
            _ => 0,
        }
    }
}

/// Input for a new pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_id: String,
    pub product_name: String,
    pub customer_email: String,
    pub price: u32,
    pub is_daily: bool,
}

/// A purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Server-assigned, increasing
    pub order_id: u64,
    pub product_id: String,
    pub product_name: String,
    pub customer_email: String,
    pub price: u32,

    /// Bought as the daily offer
    #[serde(default)]
    pub is_daily: bool,

    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,

    /// Set only on the transition to paid
    pub paid_at: Option<DateTime<Utc>>,

    /// Set once at fulfillment, never changed afterwards
    pub receiving_id: Option<String>,

    #[serde(default)]
    pub notification: NotificationStatus,
}

impl Order {
    /// Build a pending order from checkout input.
    pub fn new(order_id: u64, draft: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            product_id: draft.product_id,
            product_name: draft.product_name,
            customer_email: draft.customer_email,
            price: draft.price,
            is_daily: draft.is_daily,
            status: OrderStatus::Pending,
            created_at,
            paid_at: None,
            receiving_id: None,
            notification: NotificationStatus::NotSent,
        }
    }

    /// Paid time formatted in the server's local time zone.
    pub fn paid_at_local(&self) -> String {
        let at = self.paid_at.unwrap_or(self.created_at);
        at.with_timezone(&Local)
            .format("%d.%m.%Y, %H:%M:%S")
            .to_string()
    }

    /// Paid but without a minted receiving link.
    pub fn awaits_link(&self) -> bool {
        self.status == OrderStatus::Paid && self.receiving_id.is_none()
    }
}

/// The unguessable token authorizing one order's download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivingLink {
    pub receiving_id: String,
    pub order_id: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ReceivingLink {
    pub fn new(
        receiving_id: impl Into<String>,
        order_id: u64,
        created_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            receiving_id: receiving_id.into(),
            order_id,
            created_at,
            expires_at: created_at + validity,
        }
    }

    /// Valid up to and including `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Buyer-facing order view returned by receiving id lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: u64,
    pub product_id: String,
    pub product_name: String,
    pub customer_email: String,
    pub price: u32,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_daily: bool,
    pub expires_at: DateTime<Utc>,
}

impl OrderSummary {
    pub fn new(order: &Order, link: &ReceivingLink) -> Self {
        Self {
            order_id: order.order_id,
            product_id: order.product_id.clone(),
            product_name: order.product_name.clone(),
            customer_email: order.customer_email.clone(),
            price: order.price,
            status: order.status,
            paid_at: order.paid_at,
            is_daily: order.is_daily,
            expires_at: link.expires_at,
        }
    }
}
