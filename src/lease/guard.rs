//! RAII guard for a batch of leases.

use super::releaser::{release_batch, release_lease};
use super::types::{AcquiredLease, TokenPolicy};
use crate::error::StoreError;
use crate::store::LeaseStore;

/// Holds a batch of leases and releases them when dropped.
///
/// Release on drop is best-effort and never panics, so the guard is safe to
/// hold across code that may return early or unwind.
#[derive(Debug)]
pub struct LeaseBatchGuard<'a, S: LeaseStore + ?Sized> {
    store: &'a S,
    policy: TokenPolicy,
    leases: Vec<AcquiredLease>,
}

impl<'a, S: LeaseStore + ?Sized> LeaseBatchGuard<'a, S> {
    pub(super) fn new(store: &'a S, policy: TokenPolicy, leases: Vec<AcquiredLease>) -> Self {
        Self {
            store,
            policy,
            leases,
        }
    }

    /// The held leases, in acquisition order.
    pub fn leases(&self) -> &[AcquiredLease] {
        &self.leases
    }

    /// Resource ids covered by this guard, ascending.
    pub fn resource_ids(&self) -> Vec<i64> {
        self.leases.iter().map(|l| l.resource_id).collect()
    }

    /// Release now, reporting each lease that could not be deleted.
    ///
    /// Every lease is attempted even if an earlier one fails.
    pub fn release(mut self) -> Result<(), Vec<(i64, StoreError)>> {
        let leases = std::mem::take(&mut self.leases);
        let failures: Vec<(i64, StoreError)> = leases
            .iter()
            .filter_map(|lease| {
                release_lease(self.store, lease, self.policy)
                    .err()
                    .map(|e| (lease.resource_id, e))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

impl<S: LeaseStore + ?Sized> Drop for LeaseBatchGuard<'_, S> {
    fn drop(&mut self) {
        if !self.leases.is_empty() {
            release_batch(self.store, &self.leases, self.policy);
        }
    }
}
