//! Best-effort lease release.

use super::types::{AcquiredLease, TokenPolicy};
use crate::error::StoreError;
use crate::store::LeaseStore;

/// Delete the record behind one lease.
pub fn release_lease<S: LeaseStore + ?Sized>(
    store: &S,
    lease: &AcquiredLease,
    policy: TokenPolicy,
) -> Result<(), StoreError> {
    match policy {
        TokenPolicy::Unchecked => store.delete(&lease.record_id),
        TokenPolicy::Verified => store.delete_with_token(&lease.record_id, &lease.token),
    }
}

/// Release every lease in `leases`.
///
/// Never fails: this runs while a scope is already unwinding. A lease that
/// cannot be deleted is logged and left to expire, after which the next
/// contender reclaims it.
pub fn release_batch<S: LeaseStore + ?Sized>(
    store: &S,
    leases: &[AcquiredLease],
    policy: TokenPolicy,
) {
    for lease in leases {
        match release_lease(store, lease, policy) {
            Ok(()) => {
                tracing::debug!(resource_id = lease.resource_id, "lease released");
            }
            Err(StoreError::NotFound) => {
                tracing::debug!(
                    resource_id = lease.resource_id,
                    "lease was already gone at release"
                );
            }
            Err(e) => {
                tracing::warn!(
                    resource_id = lease.resource_id,
                    record_id = %lease.record_id,
                    error = %e,
                    "failed to release lease; it will expire"
                );
            }
        }
    }
}
