//! Stocklock: lease-based mutual exclusion for inventory mutations.
//!
//! Checkouts that touch the same products are serialized through leases held
//! in a shared [`store::LeaseStore`]. See [`lease`] for the model.
//!
//! ```no_run
//! use stocklock::lease::LeaseManager;
//! use stocklock::store::FileLeaseStore;
//!
//! let manager = LeaseManager::new(FileLeaseStore::new(".stocklock/leases"));
//! let order_result: Result<(), stocklock::error::StockLockError> =
//!     manager.with_leases(["42", "7"], |_leases| {
//!         // check and decrement stock for products 7 and 42 here
//!         Ok(())
//!     });
//! # order_result?;
//! # Ok::<(), stocklock::error::StockLockError>(())
//! ```

pub mod checkout;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod lease;
pub mod store;

#[cfg(test)]
mod test_support;
