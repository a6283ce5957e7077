//! In-process order state shared by the storage backends.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{NewOrder, NotificationStatus, Order, OrderStatus, ReceivingLink};
use crate::storage::{MintOutcome, Transition};

/// Serialized form of the order book (`orders.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersData {
    /// ISO 8601 timestamp of last write
    pub updated_at: DateTime<Utc>,
    /// Total order count
    pub count: usize,
    pub orders: Vec<Order>,
    #[serde(default)]
    pub links: Vec<ReceivingLink>,
}

/// Orders indexed by order id, links indexed by receiving id.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: BTreeMap<u64, Order>,
    links: HashMap<String, ReceivingLink>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a book from its serialized form, rejecting inconsistent data.
    pub fn from_data(data: OrdersData) -> Result<Self> {
        let mut book = Self::new();

        for order in data.orders {
            if book.orders.insert(order.order_id, order).is_some() {
                return Err(AppError::storage("duplicate order id in order file"));
            }
        }

        for link in data.links {
            let Some(order) = book.orders.get(&link.order_id) else {
                return Err(AppError::storage(format!(
                    "receiving link bound to unknown order {}",
                    link.order_id
                )));
            };
            if order.receiving_id.as_deref() != Some(link.receiving_id.as_str()) {
                return Err(AppError::storage(format!(
                    "receiving link does not match order {}",
                    link.order_id
                )));
            }
            if book.links.insert(link.receiving_id.clone(), link).is_some() {
                return Err(AppError::storage("duplicate receiving id in order file"));
            }
        }

        Ok(book)
    }

    pub fn to_data(&self) -> OrdersData {
        let mut links: Vec<ReceivingLink> = self.links.values().cloned().collect();
        links.sort_by_key(|l| l.order_id);

        OrdersData {
            updated_at: Utc::now(),
            count: self.orders.len(),
            orders: self.orders.values().cloned().collect(),
            links,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn next_id(&self) -> u64 {
        self.orders.keys().next_back().map_or(1, |id| id + 1)
    }

    pub fn create(&mut self, draft: NewOrder, now: DateTime<Utc>) -> Order {
        let order = Order::new(self.next_id(), draft, now);
        self.orders.insert(order.order_id, order.clone());
        order
    }

    pub fn get(&self, order_id: u64) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    fn get_mut(&mut self, order_id: u64) -> Result<&mut Order> {
        self.orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::not_found(format!("order {order_id}")))
    }

    pub fn mark_paid(&mut self, order_id: u64, paid_at: DateTime<Utc>) -> Result<Transition> {
        let order = self.get_mut(order_id)?;
        Ok(match order.status {
            OrderStatus::Pending => {
                order.status = OrderStatus::Paid;
                order.paid_at = Some(paid_at);
                Transition::Applied(order.clone())
            }
            OrderStatus::Paid => Transition::AlreadyInState(order.clone()),
            OrderStatus::Failed => Transition::Rejected(order.clone()),
        })
    }

    pub fn mark_failed(&mut self, order_id: u64) -> Result<Transition> {
        let order = self.get_mut(order_id)?;
        Ok(match order.status {
            OrderStatus::Pending => {
                order.status = OrderStatus::Failed;
                Transition::Applied(order.clone())
            }
            OrderStatus::Failed => Transition::AlreadyInState(order.clone()),
            OrderStatus::Paid => Transition::Rejected(order.clone()),
        })
    }

    pub fn mint_if_absent(&mut self, link: ReceivingLink) -> Result<MintOutcome> {
        let order_id = link.order_id;
        let order = self
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::not_found(format!("order {order_id}")))?;

        if order.status != OrderStatus::Paid {
            return Err(AppError::conflict(format!(
                "order {order_id} is {}, only paid orders receive a link",
                order.status.as_str()
            )));
        }

        if let Some(existing) = &order.receiving_id {
            return match self.links.get(existing) {
                Some(link) => Ok(MintOutcome::AlreadyMinted(link.clone())),
                None => Err(AppError::storage(format!(
                    "order {order_id} references a missing receiving link"
                ))),
            };
        }

        if self.links.contains_key(&link.receiving_id) {
            return Err(AppError::conflict("receiving id already in use"));
        }

        self.get_mut(order_id)?.receiving_id = Some(link.receiving_id.clone());
        self.links.insert(link.receiving_id.clone(), link.clone());
        Ok(MintOutcome::Minted(link))
    }

    pub fn find_by_receiving(&self, receiving_id: &str) -> Option<(Order, ReceivingLink)> {
        let link = self.links.get(receiving_id)?;
        let order = self.orders.get(&link.order_id)?;
        Some((order.clone(), link.clone()))
    }

    pub fn link_for_order(&self, order_id: u64) -> Option<ReceivingLink> {
        let receiving_id = self.orders.get(&order_id)?.receiving_id.as_ref()?;
        self.links.get(receiving_id).cloned()
    }

    pub fn set_notification(
        &mut self,
        order_id: u64,
        status: NotificationStatus,
    ) -> Result<Order> {
        let order = self.get_mut(order_id)?;
        order.notification = status;
        Ok(order.clone())
    }

    pub fn pending_notifications(&self) -> Vec<Order> {
        self.orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::Paid
                    && o.receiving_id.is_some()
                    && !o.notification.is_sent()
            })
            .cloned()
            .collect()
    }

    pub fn paid_without_link(&self) -> Vec<Order> {
        self.orders
            .values()
            .filter(|o| o.awaits_link())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn draft(email: &str) -> NewOrder {
        NewOrder {
            product_id: "KF001".to_string(),
            product_name: "KF 001".to_string(),
            customer_email: email.to_string(),
            price: 150,
            is_daily: false,
        }
    }

    fn link(id: &str, order_id: u64) -> ReceivingLink {
        ReceivingLink::new(id, order_id, Utc::now(), Duration::days(30))
    }

    #[test]
    fn test_ids_increase() {
        let mut book = OrderBook::new();
        let a = book.create(draft("a@example.com"), Utc::now());
        let b = book.create(draft("b@example.com"), Utc::now());
        assert_eq!(a.order_id, 1);
        assert_eq!(b.order_id, 2);
    }

    #[test]
    fn test_paid_and_failed_are_terminal() {
        let mut book = OrderBook::new();
        let paid = book.create(draft("a@example.com"), Utc::now()).order_id;
        let failed = book.create(draft("b@example.com"), Utc::now()).order_id;

        assert!(matches!(book.mark_paid(paid, Utc::now()).unwrap(), Transition::Applied(_)));
        assert!(matches!(
            book.mark_paid(paid, Utc::now()).unwrap(),
            Transition::AlreadyInState(_)
        ));
        assert!(matches!(book.mark_failed(paid).unwrap(), Transition::Rejected(_)));

        assert!(matches!(book.mark_failed(failed).unwrap(), Transition::Applied(_)));
        assert!(matches!(
            book.mark_paid(failed, Utc::now()).unwrap(),
            Transition::Rejected(_)
        ));
        assert!(book.get(failed).unwrap().paid_at.is_none());
    }

    #[test]
    fn test_paid_at_not_overwritten() {
        let mut book = OrderBook::new();
        let id = book.create(draft("a@example.com"), Utc::now()).order_id;
        let first = Utc::now();
        book.mark_paid(id, first).unwrap();
        book.mark_paid(id, first + Duration::hours(1)).unwrap();
        assert_eq!(book.get(id).unwrap().paid_at, Some(first));
    }

    #[test]
    fn test_mint_once_per_order() {
        let mut book = OrderBook::new();
        let id = book.create(draft("a@example.com"), Utc::now()).order_id;
        book.mark_paid(id, Utc::now()).unwrap();

        let first = book.mint_if_absent(link("r1", id)).unwrap();
        assert!(first.is_new());
        let second = book.mint_if_absent(link("r2", id)).unwrap();
        assert!(!second.is_new());
        assert_eq!(second.link().receiving_id, "r1");

        assert!(book.find_by_receiving("r2").is_none());
        assert_eq!(book.find_by_receiving("r1").unwrap().0.order_id, id);
    }

    #[test]
    fn test_mint_requires_paid() {
        let mut book = OrderBook::new();
        let id = book.create(draft("a@example.com"), Utc::now()).order_id;
        let err = book.mint_if_absent(link("r1", id)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(matches!(
            book.mint_if_absent(link("r1", 99)).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_receiving_ids_are_unique() {
        let mut book = OrderBook::new();
        let a = book.create(draft("a@example.com"), Utc::now()).order_id;
        let b = book.create(draft("b@example.com"), Utc::now()).order_id;
        book.mark_paid(a, Utc::now()).unwrap();
        book.mark_paid(b, Utc::now()).unwrap();

        book.mint_if_absent(link("same", a)).unwrap();
        let err = book.mint_if_absent(link("same", b)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(book.get(b).unwrap().receiving_id.is_none());
    }

    #[test]
    fn test_sweep_queries() {
        let mut book = OrderBook::new();
        let linked = book.create(draft("a@example.com"), Utc::now()).order_id;
        let unlinked = book.create(draft("b@example.com"), Utc::now()).order_id;
        book.create(draft("c@example.com"), Utc::now());
        book.mark_paid(linked, Utc::now()).unwrap();
        book.mark_paid(unlinked, Utc::now()).unwrap();
        book.mint_if_absent(link("r1", linked)).unwrap();

        let pending: Vec<_> = book.pending_notifications().iter().map(|o| o.order_id).collect();
        assert_eq!(pending, vec![linked]);
        let awaiting: Vec<_> = book.paid_without_link().iter().map(|o| o.order_id).collect();
        assert_eq!(awaiting, vec![unlinked]);

        book.set_notification(
            linked,
            NotificationStatus::Sent {
                provider: "resend".to_string(),
                message_id: None,
                sent_at: Utc::now(),
            },
        )
        .unwrap();
        assert!(book.pending_notifications().is_empty());
    }

    #[test]
    fn test_data_round_trip_checks_links() {
        let mut book = OrderBook::new();
        let id = book.create(draft("a@example.com"), Utc::now()).order_id;
        book.mark_paid(id, Utc::now()).unwrap();
        book.mint_if_absent(link("r1", id)).unwrap();

        let restored = OrderBook::from_data(book.to_data()).unwrap();
        assert_eq!(restored.link_for_order(id).unwrap().receiving_id, "r1");

        let mut broken = book.to_data();
        broken.links.push(link("r2", id));
        assert!(OrderBook::from_data(broken).is_err());
    }
}
