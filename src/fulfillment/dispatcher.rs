//! Fulfillment dispatcher.
//!
//! Drives an order from payment confirmation to a notified buyer:
//!
//! 1. mark the order paid (idempotent)
//! 2. mint the receiving link with an atomic mint-if-absent
//! 3. only for a freshly minted link, run the notification chain in the
//!    background
//!
//! A chain that exhausts every provider leaves the order paid with a
//! `pending` notification; [`Dispatcher::sweep`] retries those, as well as
//! paid orders whose link could not be stored.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{AppError, Result};
use crate::models::{Config, MAX_LINK_VALIDITY_DAYS, NotificationStatus, Order, ReceivingLink};
use crate::notify::FailoverNotifier;
use crate::storage::{MintOutcome, OrderStore, Transition};

/// Result of a payment confirmation.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub order: Order,
    pub link: ReceivingLink,
    /// False when the confirmation was a duplicate
    pub newly_minted: bool,
}

/// Counters of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub links_minted: usize,
    pub link_errors: usize,
    pub notifications_sent: usize,
    pub still_pending: usize,
    /// Orders that reached the chain limit and need an operator
    pub exhausted: usize,
}

/// Generate an unguessable receiving id: 32 random bytes, hex encoded.
pub fn new_receiving_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct Dispatcher {
    store: Arc<dyn OrderStore>,
    notifier: Arc<FailoverNotifier>,
    site_url: String,
    receiving_path: String,
    validity: Duration,
    max_chains: u32,
    in_flight: Mutex<HashSet<u64>>,
}

impl Dispatcher {
    pub fn new(config: &Config, store: Arc<dyn OrderStore>, notifier: Arc<FailoverNotifier>) -> Self {
        let path = config.fulfillment.receiving_path.trim_matches('/');
        Self {
            store,
            notifier,
            site_url: config.server.site_url.trim_end_matches('/').to_string(),
            receiving_path: format!("/{path}/"),
            validity: Duration::days(
                config
                    .fulfillment
                    .link_validity_days
                    .clamp(1, MAX_LINK_VALIDITY_DAYS),
            ),
            max_chains: config.fulfillment.max_notification_chains,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Buyer-facing URL of a receiving link.
    pub fn download_url(&self, receiving_id: &str) -> String {
        format!("{}{}{}", self.site_url, self.receiving_path, receiving_id)
    }

    /// Mark an order paid and make sure it has a receiving link.
    ///
    /// Safe to call any number of times for the same order: only the first
    /// successful call reports `newly_minted`.
    pub async fn confirm_payment(&self, order_id: u64) -> Result<Confirmation> {
        let order = match self.store.mark_paid(order_id, Utc::now()).await? {
            Transition::Applied(order) => {
                log::info!("Order {} marked paid", order_id);
                order
            }
            Transition::AlreadyInState(order) => {
                log::info!("Order {} was already paid; duplicate confirmation", order_id);
                order
            }
            Transition::Rejected(order) => {
                return Err(AppError::conflict(format!(
                    "order {} is {} and cannot be paid",
                    order_id,
                    order.status.as_str()
                )));
            }
        };

        let outcome = self.mint(order_id).await?;
        let newly_minted = outcome.is_new();
        let link = outcome.link().clone();

        // Re-read so the returned order carries the receiving id.
        let order = self.store.get_order(order_id).await?.unwrap_or(order);

        Ok(Confirmation {
            order,
            link,
            newly_minted,
        })
    }

    /// Confirm a payment and start the notification chain for a new link.
    pub async fn confirm_and_notify(self: &Arc<Self>, order_id: u64) -> Result<Confirmation> {
        let confirmation = self.confirm_payment(order_id).await?;
        if confirmation.newly_minted {
            self.spawn_notification(confirmation.order.clone(), confirmation.link.clone());
        }
        Ok(confirmation)
    }

    /// Move a pending order to failed.
    pub async fn mark_failed(&self, order_id: u64) -> Result<Order> {
        match self.store.mark_failed(order_id).await? {
            Transition::Applied(order) => {
                log::info!("Order {} marked failed", order_id);
                Ok(order)
            }
            Transition::AlreadyInState(order) => Ok(order),
            Transition::Rejected(order) => Err(AppError::conflict(format!(
                "order {} is {} and cannot fail",
                order_id,
                order.status.as_str()
            ))),
        }
    }

    async fn mint(&self, order_id: u64) -> Result<MintOutcome> {
        let candidate = ReceivingLink::new(new_receiving_id(), order_id, Utc::now(), self.validity);
        let outcome = self.store.mint_receiving_if_absent(candidate).await?;
        if outcome.is_new() {
            log::info!(
                "Receiving link minted for order {} (expires {})",
                order_id,
                outcome.link().expires_at
            );
        }
        Ok(outcome)
    }

    /// Run the notification chain on a background task.
    pub fn spawn_notification(
        self: &Arc<Self>,
        order: Order,
        link: ReceivingLink,
    ) -> tokio::task::JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.notify(&order, &link).await {
                log::error!(
                    "NOTIFICATION PENDING: order {} could not record its notification state: {}",
                    order.order_id,
                    e
                );
            }
        })
    }

    /// Run the notification chain once and record the result.
    ///
    /// Returns `None` when a chain for the same order is already running or
    /// the buyer has been notified in the meantime.
    pub async fn notify(
        &self,
        order: &Order,
        link: &ReceivingLink,
    ) -> Result<Option<NotificationStatus>> {
        let Some(_claim) = self.claim(order.order_id) else {
            log::debug!("Notification for order {} already in flight", order.order_id);
            return Ok(None);
        };

        // The caller's copy may predate a chain that finished since.
        let order = match self.store.get_order(order.order_id).await? {
            Some(current) if current.notification.is_sent() => {
                log::debug!("Order {} was already notified", current.order_id);
                return Ok(None);
            }
            Some(current) => current,
            None => return Err(AppError::not_found(format!("order {}", order.order_id))),
        };

        let url = self.download_url(&link.receiving_id);
        let report = self.notifier.deliver(&order, &url).await;

        let status = match report.delivered_by {
            Some(provider) => NotificationStatus::Sent {
                provider,
                message_id: report.message_id,
                sent_at: Utc::now(),
            },
            None => {
                let chains = order.notification.failed_chains() + 1;
                let last_error = report.last_error();
                log::error!(
                    "NOTIFICATION PENDING: order {} for {} was paid but no provider delivered \
                     the receiving link (chain {}/{}): {}",
                    order.order_id,
                    order.customer_email,
                    chains,
                    self.max_chains,
                    last_error
                );
                NotificationStatus::Pending {
                    chains,
                    last_error,
                    updated_at: Utc::now(),
                }
            }
        };

        self.store
            .set_notification(order.order_id, status.clone())
            .await?;
        Ok(Some(status))
    }

    /// Retry unfinished fulfillment work.
    ///
    /// Mints links for paid orders that lack one, then re-runs the chain for
    /// undelivered notifications below the chain limit.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for order in self.store.paid_without_link().await? {
            match self.mint(order.order_id).await {
                Ok(_) => report.links_minted += 1,
                Err(e) => {
                    log::error!("Sweep could not mint link for order {}: {}", order.order_id, e);
                    report.link_errors += 1;
                }
            }
        }

        for order in self.store.pending_notifications().await? {
            if order.notification.failed_chains() >= self.max_chains {
                report.exhausted += 1;
                continue;
            }

            let Some(link) = self.store.link_for_order(order.order_id).await? else {
                continue;
            };

            match self.notify(&order, &link).await? {
                Some(status) if status.is_sent() => report.notifications_sent += 1,
                Some(_) => report.still_pending += 1,
                None => {}
            }
        }

        if report.exhausted > 0 {
            log::warn!(
                "{} orders reached the notification limit and need manual delivery",
                report.exhausted
            );
        }
        log::info!("Sweep finished: {:?}", report);
        Ok(report)
    }

    fn claim(&self, order_id: u64) -> Option<InFlight<'_>> {
        let mut set = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.insert(order_id).then(|| InFlight {
            set: &self.in_flight,
            order_id,
        })
    }
}

/// Marks an order's notification chain as running until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<u64>>,
    order_id: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = match self.set.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.order_id);
    }
}
