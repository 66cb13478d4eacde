//! Inventory lease subsystem.
//!
//! Serializes checkout attempts against per-product inventory. Before mutating
//! stock, a checkout takes a lease on every product in the order; while it
//! holds them no other checkout can lease the same products.
//!
//! # Mutual Exclusion
//!
//! A lease is a record in a [`LeaseStore`](crate::store::LeaseStore) that
//! allows at most one record per resource id. Acquiring means inserting;
//! whoever's insert succeeds holds the lease. Nothing else is needed for
//! safety.
//!
//! # Expiry
//!
//! Every lease carries an `expires_at`. A holder that crashes without
//! releasing wedges its resources only until then: the next contender that
//! finds the record expired deletes it and retries. A lease that has not
//! expired is never displaced, however unresponsive its holder.
//!
//! # Batches
//!
//! Multi-product orders acquire in ascending resource id, whatever order the
//! caller listed them in. With one global order no two batches can each hold
//! a resource the other is waiting for. A batch either gets every lease or,
//! after rolling back what it took, none.
//!
//! # Release
//!
//! Release is best-effort and never fails. [`LeaseBatchGuard`] releases on
//! drop; [`LeaseManager::with_leases`] scopes a critical section.

mod acquirer;
mod admin;
mod batch;
mod guard;
mod record;
mod releaser;
mod types;


// Re-export public API
pub use acquirer::{acquire_lease, reclaim_if_expired};
pub use admin::{clear_lease, list_leases, sweep_expired};
pub use batch::{LeaseManager, normalize_resource_ids};
pub use guard::LeaseBatchGuard;
pub(crate) use record::get_owner_string;
pub use record::{LeaseRecord, LeaseState, RecordId, expiry_from_now, new_token};
pub use releaser::{release_batch, release_lease};
pub use types::{
    AcquiredLease, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TTL, LeaseInfo, LeaseSettings,
    TokenPolicy,
};
