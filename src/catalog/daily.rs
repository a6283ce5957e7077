//! Daily offer selection.
//!
//! The offer rotates deterministically through the sellable catalog:
//!
//! ```text
//! seed      = year * 10000 + month * 100 + day
//! baseIndex = seed mod N
//! index     = (baseIndex + dayOfYear) mod N      dayOfYear: Jan 1 = 0
//! ```
//!
//! The rule is a pure function of (date, catalog). [`DailyOfferSelector`]
//! can additionally pin the first selection of a day so that catalog changes
//! during the day do not move the offer.

use std::sync::Mutex;

use chrono::{Datelike, NaiveDate};

use crate::models::{DailyOffer, Product};

/// Index of the daily offer in a catalog of `len` entries.
pub fn daily_index(date: NaiveDate, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let n = len as i64;
    let seed = i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day());
    let base = seed.rem_euclid(n);
    let day_of_year = i64::from(date.ordinal0());

    Some(((base + day_of_year) % n) as usize)
}

/// Pick the daily entry of `items`, `None` when empty.
pub fn select<T>(date: NaiveDate, items: &[T]) -> Option<&T> {
    daily_index(date, items.len()).map(|i| &items[i])
}

/// Price of a product bought as the daily offer.
pub fn offer_price(unit_price: u32, discount_percent: u32) -> u32 {
    let discount = discount_percent.min(100);
    (u64::from(unit_price) * u64::from(100 - discount) / 100) as u32
}

/// Price a selected product as the offer of `date`.
pub fn daily_offer(date: NaiveDate, product: &Product, discount_percent: u32) -> DailyOffer {
    DailyOffer {
        date_key: date,
        offer_price: offer_price(product.price, discount_percent),
        product: product.clone(),
    }
}

/// Daily offer selection with optional same-day pinning.
#[derive(Debug, Default)]
pub struct DailyOfferSelector {
    pin: bool,
    pinned: Mutex<Option<(NaiveDate, String)>>,
}

impl DailyOfferSelector {
    pub fn new(pin: bool) -> Self {
        Self {
            pin,
            pinned: Mutex::new(None),
        }
    }

    /// Select today's offer from the sellable products.
    ///
    /// A pinned product is reused only while it is still in the catalog; an
    /// empty catalog always yields `None`.
    pub fn select<'a>(&self, date: NaiveDate, sellable: &[&'a Product]) -> Option<&'a Product> {
        if !self.pin {
            return select(date, sellable).copied();
        }

        let mut pinned = match self.pinned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if sellable.is_empty() {
            *pinned = None;
            return None;
        }

        if let Some((day, id)) = pinned.as_ref() {
            if *day == date {
                if let Some(product) = sellable.iter().find(|p| &p.id == id) {
                    return Some(*product);
                }
            }
        }

        let product = select(date, sellable).copied()?;
        *pinned = Some((date, product.id.clone()));
        Some(product)
    }
}
