//! Order placement under inventory leases.
//!
//! The checkout flow shows the calling pattern the lease manager expects:
//! lease every product in the order, check and decrement stock while the
//! leases are held, and release them on every exit path. Stock quantities
//! live behind [`StockLedger`]; the lease manager never sees them.

use crate::error::StockLockError;
use crate::lease::LeaseManager;
use crate::store::LeaseStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use thiserror::Error;

/// Inventory quantities for products.
pub trait StockLedger: Send + Sync {
    /// Units currently on hand.
    fn available(&self, product_id: i64) -> Result<u32, CheckoutError>;

    /// Remove `quantity` units. Only called while the product is leased.
    fn decrement(&self, product_id: i64, quantity: u32) -> Result<(), CheckoutError>;
}

/// Why an order was not placed.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Another checkout is holding a product; the shopper should try again.
    #[error("product {resource_id} is busy, please retry")]
    RetryLater { resource_id: i64 },

    /// Genuine stock shortage.
    #[error("product {product_id} has {available} left, {requested} requested")]
    OutOfStock {
        product_id: i64,
        requested: u32,
        available: u32,
    },

    /// The order names no product.
    #[error("order has no lines")]
    EmptyOrder,

    /// The stock ledger failed.
    #[error("stock ledger failure: {0}")]
    Ledger(String),

    /// Any other lease-manager failure.
    #[error(transparent)]
    Lease(StockLockError),
}

impl From<StockLockError> for CheckoutError {
    fn from(err: StockLockError) -> Self {
        match err {
            StockLockError::LeaseTimeout { resource_id, .. } => {
                CheckoutError::RetryLater { resource_id }
            }
            other => CheckoutError::Lease(other),
        }
    }
}

/// One product and quantity in an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: i64, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Places orders against a ledger, serialized per product by leases.
#[derive(Debug)]
pub struct CheckoutFlow<'a, S, L: ?Sized> {
    leases: &'a LeaseManager<S>,
    ledger: &'a L,
}

impl<'a, S: LeaseStore, L: StockLedger + ?Sized> CheckoutFlow<'a, S, L> {
    pub fn new(leases: &'a LeaseManager<S>, ledger: &'a L) -> Self {
        Self { leases, ledger }
    }

    /// Place an order, all lines or none.
    ///
    /// Lines for the same product are merged. Every product is leased before
    /// any stock is read; if any line is short nothing is decremented.
    pub fn place_order(&self, lines: &[OrderLine]) -> Result<(), CheckoutError> {
        let mut wanted: BTreeMap<i64, u32> = BTreeMap::new();
        for line in lines.iter().filter(|l| l.quantity > 0) {
            let entry = wanted.entry(line.product_id).or_default();
            *entry = entry.saturating_add(line.quantity);
        }
        if wanted.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let product_ids: Vec<String> = wanted.keys().map(|id| id.to_string()).collect();

        self.leases.with_leases(&product_ids, |_leases| {
            for (&product_id, &requested) in &wanted {
                let available = self.ledger.available(product_id)?;
                if available < requested {
                    return Err(CheckoutError::OutOfStock {
                        product_id,
                        requested,
                        available,
                    });
                }
            }

            for (&product_id, &quantity) in &wanted {
                self.ledger.decrement(product_id, quantity)?;
            }

            tracing::info!(products = wanted.len(), "order placed");
            Ok(())
        })
    }
}

/// In-process stock ledger.
///
/// `available` and `decrement` lock the table separately. Two checkouts of
/// the same product must be serialized by their leases.
#[derive(Debug, Default)]
pub struct MemoryStockLedger {
    stock: Mutex<HashMap<i64, u32>>,
}

impl MemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the on-hand quantity of a product.
    pub fn set_stock(&self, product_id: i64, quantity: u32) {
        self.stock
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(product_id, quantity);
    }
}

impl StockLedger for MemoryStockLedger {
    fn available(&self, product_id: i64) -> Result<u32, CheckoutError> {
        let stock = self
            .stock
            .lock()
            .map_err(|_| CheckoutError::Ledger("stock table poisoned".to_string()))?;
        Ok(stock.get(&product_id).copied().unwrap_or(0))
    }

    fn decrement(&self, product_id: i64, quantity: u32) -> Result<(), CheckoutError> {
        let mut stock = self
            .stock
            .lock()
            .map_err(|_| CheckoutError::Ledger("stock table poisoned".to_string()))?;
        let on_hand = stock.entry(product_id).or_insert(0);
        *on_hand = on_hand.checked_sub(quantity).ok_or_else(|| {
            CheckoutError::Ledger(format!(
                "stock for product {} would go negative",
                product_id
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeaseStore;
    use crate::test_support::{fast_settings, foreign_record};
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn leases() -> LeaseManager<MemoryLeaseStore> {
        LeaseManager::with_settings(MemoryLeaseStore::new(), fast_settings(3))
    }

    #[test]
    fn places_order_and_releases_leases() {
        let leases = leases();
        let ledger = MemoryStockLedger::new();
        ledger.set_stock(1, 5);
        ledger.set_stock(2, 1);

        CheckoutFlow::new(&leases, &ledger)
            .place_order(&[OrderLine::new(2, 1), OrderLine::new(1, 3)])
            .unwrap();

        assert_eq!(ledger.available(1).unwrap(), 2);
        assert_eq!(ledger.available(2).unwrap(), 0);
        assert!(leases.store().is_empty());
    }

    #[test]
    fn merges_lines_for_same_product() {
        let leases = leases();
        let ledger = MemoryStockLedger::new();
        ledger.set_stock(1, 3);

        let err = CheckoutFlow::new(&leases, &ledger)
            .place_order(&[OrderLine::new(1, 2), OrderLine::new(1, 2)])
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::OutOfStock {
                product_id: 1,
                requested: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn out_of_stock_changes_nothing() {
        let leases = leases();
        let ledger = MemoryStockLedger::new();
        ledger.set_stock(1, 5);
        ledger.set_stock(2, 0);

        let err = CheckoutFlow::new(&leases, &ledger)
            .place_order(&[OrderLine::new(1, 1), OrderLine::new(2, 1)])
            .unwrap_err();

        assert!(matches!(err, CheckoutError::OutOfStock { product_id: 2, .. }));
        assert_eq!(ledger.available(1).unwrap(), 5);
        assert!(leases.store().is_empty());
    }

    #[test]
    fn busy_product_is_retry_later_not_out_of_stock() {
        let leases = leases();
        leases.store().put(foreign_record(7, TimeDelta::minutes(1)));
        let ledger = MemoryStockLedger::new();
        ledger.set_stock(7, 10);

        let err = CheckoutFlow::new(&leases, &ledger)
            .place_order(&[OrderLine::new(7, 1)])
            .unwrap_err();

        assert!(matches!(err, CheckoutError::RetryLater { resource_id: 7 }));
        assert!(err.to_string().contains("please retry"));
        assert_eq!(ledger.available(7).unwrap(), 10);
    }

    #[test]
    fn empty_order_rejected() {
        let leases = leases();
        let ledger = MemoryStockLedger::new();

        let err = CheckoutFlow::new(&leases, &ledger)
            .place_order(&[OrderLine::new(1, 0)])
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyOrder));
    }

    /// Ledger that widens the read/write gap so unserialized checkouts would oversell.
    struct SlowLedger {
        inner: MemoryStockLedger,
        sold: AtomicUsize,
    }

    impl StockLedger for SlowLedger {
        fn available(&self, product_id: i64) -> Result<u32, CheckoutError> {
            let available = self.inner.available(product_id)?;
            std::thread::sleep(Duration::from_millis(2));
            Ok(available)
        }

        fn decrement(&self, product_id: i64, quantity: u32) -> Result<(), CheckoutError> {
            self.inner.decrement(product_id, quantity)?;
            self.sold.fetch_add(quantity as usize, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn concurrent_checkouts_never_oversell() {
        let leases = LeaseManager::with_settings(MemoryLeaseStore::new(), fast_settings(5_000));
        let ledger = SlowLedger {
            inner: MemoryStockLedger::new(),
            sold: AtomicUsize::new(0),
        };
        ledger.inner.set_stock(1, 5);
        ledger.inner.set_stock(2, 5);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let flow = CheckoutFlow::new(&leases, &ledger);
                scope.spawn(move || {
                    let lines = if i % 2 == 0 {
                        [OrderLine::new(1, 1), OrderLine::new(2, 1)]
                    } else {
                        [OrderLine::new(2, 1), OrderLine::new(1, 1)]
                    };
                    let _ = flow.place_order(&lines);
                });
            }
        });

        // Five units of each product; every order takes one of each
        assert_eq!(ledger.sold.load(Ordering::SeqCst), 10);
        assert_eq!(ledger.inner.available(1).unwrap(), 0);
        assert_eq!(ledger.inner.available(2).unwrap(), 0);
        assert!(leases.store().is_empty());
    }
}
